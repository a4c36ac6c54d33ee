use clap::Parser;
use std::path::PathBuf;

use ptl::deps::ClassSet;
use ptl::operand::InstrClass;
use ptl::pass::PassId;
use ptl::pipeline::{compute_provenance, run_pipeline, TimelineOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum EmitStage {
    Text,
    Json,
    Tasks,
    Lanes,
    Deps,
    BuildInfo,
}

impl EmitStage {
    /// Passes whose artifacts this output needs.
    fn targets(self) -> &'static [PassId] {
        match self {
            EmitStage::Text | EmitStage::Json => &[PassId::AllocateLanes, PassId::ResolveDeps],
            EmitStage::Tasks => &[PassId::BuildTasks],
            EmitStage::Lanes => &[PassId::AllocateLanes],
            EmitStage::Deps => &[PassId::ResolveDeps],
            EmitStage::BuildInfo => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum TrackClass {
    Arithmetic,
    IndexedLoad,
    Fma,
    Branch,
    Unclassified,
    All,
}

fn tracked_classes(track: &[TrackClass]) -> ClassSet {
    if track.is_empty() {
        return ClassSet::default();
    }
    let mut set = ClassSet::empty();
    for class in track {
        match class {
            TrackClass::Arithmetic => set.insert(InstrClass::Arithmetic),
            TrackClass::IndexedLoad => set.insert(InstrClass::IndexedLoad),
            TrackClass::Fma => set.insert(InstrClass::FusedMultiplyAccumulate),
            TrackClass::Branch => set.insert(InstrClass::ConditionalBranch),
            TrackClass::Unclassified => set.insert(InstrClass::Unclassified),
            TrackClass::All => return ClassSet::all(),
        };
    }
    set
}

#[derive(Parser, Debug)]
#[command(
    name = "ptl",
    version,
    about = "Pipeline timeline — rebuilds lane-packed execution timelines from retirement traces"
)]
struct Cli {
    /// Input trace (JSON array of retired-instruction rows)
    trace: PathBuf,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Text)]
    emit: EmitStage,

    /// Consumer class whose reads produce dependency edges (repeatable, default fma)
    #[arg(long, value_enum)]
    track: Vec<TrackClass>,

    /// Warn when rows are not in program-counter order
    #[arg(long, overrides_with = "no_check_order")]
    check_order: bool,

    /// Skip the program-counter order check
    #[arg(long, overrides_with = "check_order")]
    no_check_order: bool,

    /// Print phases and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let options = TimelineOptions {
        tracked: tracked_classes(&cli.track),
        check_order: if cli.check_order {
            true
        } else if cli.no_check_order {
            false
        } else {
            TimelineOptions::default().check_order
        },
        verbose: cli.verbose,
    };

    if cli.verbose {
        eprintln!("ptl: trace   = {}", cli.trace.display());
        eprintln!("ptl: emit    = {:?}", cli.emit);
        eprintln!("ptl: tracked = {}", options.tracked);
    }

    // ── Read and load trace ──
    let text = match std::fs::read_to_string(&cli.trace) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ptl: error: {}: {}", cli.trace.display(), e);
            std::process::exit(2);
        }
    };
    let provenance = compute_provenance(&text);

    if cli.emit == EmitStage::BuildInfo {
        print!("{}", ptl::emit::build_info_json(&provenance));
        return;
    }

    let mut records = match ptl::trace::load_trace(&text) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("ptl: error: {}: {}", cli.trace.display(), e);
            std::process::exit(2);
        }
    };
    // Already in pc order; this only reports whether every row had a pc.
    let sorted = ptl::trace::sort_by_pc(&mut records);

    if cli.verbose {
        eprintln!(
            "ptl: loaded {} rows ({})",
            records.len(),
            if sorted { "sorted by pc" } else { "file order" }
        );
    }

    // ── Run passes ──
    let result = run_pipeline(records, cli.emit.targets(), &options, |_, diags| {
        for diag in diags {
            eprintln!("ptl: {}", diag);
        }
    });
    let timeline = match result {
        Ok(t) => t,
        Err(e) => {
            eprintln!("ptl: error: {}", e);
            std::process::exit(1);
        }
    };

    // ── Emit ──
    match cli.emit {
        EmitStage::Text => print!("{}", timeline),
        EmitStage::Json => print!("{}", ptl::emit::to_json(&timeline, &provenance)),
        EmitStage::Tasks => {
            for task in &timeline.tasks {
                println!("{}", task);
            }
        }
        EmitStage::Lanes => {
            if let Some(summary) = &timeline.lanes {
                print!("{}", summary);
            }
        }
        EmitStage::Deps => {
            for edge in timeline.edges() {
                println!("{}", edge);
            }
        }
        EmitStage::BuildInfo => {}
    }
}
