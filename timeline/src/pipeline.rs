// pipeline.rs — Timeline state and pass orchestration
//
// Runs the minimal set of passes for the requested targets over one trace,
// verifies each pass's postconditions, and accumulates diagnostics.
//
// Preconditions: `records` are in program-counter order.
// Postconditions: artifacts for every required pass are populated, or an
//                 error naming the failing pass is returned.
// Failure modes: E0001 from task building; stage-cert failures (E0100/E0101).
// Side effects: calls `on_pass_complete` after each pass; prints per-pass
//               timing to stderr when `verbose` is set.

use std::fmt;
use std::time::{Duration, Instant};

use crate::deps::{resolve_dependencies, verify_dependencies, ClassSet, DependencyEdge};
use crate::diag::{codes, has_errors, DiagCode, Diagnostic};
use crate::lanes::{allocate_lanes, verify_lanes, LaneSummary};
use crate::pass::{descriptor, required_passes_for, PassId, StageCert, ALL_PASSES};
use crate::task::{build_tasks, Task};
use crate::trace::TraceRecord;

// ── Options ────────────────────────────────────────────────────────────────

/// Knobs for one timeline run.
#[derive(Debug, Clone)]
pub struct TimelineOptions {
    /// Consumer classes whose reads produce dependency edges.
    pub tracked: ClassSet,
    /// Warn (W0101) when row `pc` values decrease.
    pub check_order: bool,
    /// Print per-pass timing to stderr.
    pub verbose: bool,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        TimelineOptions {
            tracked: ClassSet::default(),
            check_order: cfg!(debug_assertions),
            verbose: false,
        }
    }
}

// ── Artifacts ──────────────────────────────────────────────────────────────

/// Everything the passes produced for one trace.
#[derive(Debug, Clone)]
pub struct Timeline {
    /// Tasks in program order; `tasks[i].id == TaskId(i)`.
    pub tasks: Vec<Task>,
    /// Set when lane allocation ran.
    pub lanes: Option<LaneSummary>,
    /// Set when dependency resolution ran.
    pub edges: Option<Vec<DependencyEdge>>,
    pub tracked: ClassSet,
    pub diagnostics: Vec<Diagnostic>,
}

impl Timeline {
    /// Dependency edges, or none if resolution did not run.
    pub fn edges(&self) -> &[DependencyEdge] {
        self.edges.as_deref().unwrap_or(&[])
    }
}

/// Provenance metadata for reproducible output.
///
/// `trace_hash`: SHA-256 of the raw trace text.
/// `tool_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub trace_hash: [u8; 32],
    pub tool_version: &'static str,
}

impl Provenance {
    /// Hex string of the trace hash (64 characters).
    pub fn trace_hash_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in &self.trace_hash {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
        }
        s
    }

    /// Serializable view used by the JSON emitters.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "trace_hash": self.trace_hash_hex(),
            "tool_version": self.tool_version,
        })
    }
}

/// Compute provenance from the raw trace text.
pub fn compute_provenance(trace_text: &str) -> Provenance {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(trace_text.as_bytes());
    let mut trace_hash = [0u8; 32];
    trace_hash.copy_from_slice(&hasher.finalize());

    Provenance {
        trace_hash,
        tool_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// A pass emitted error-level diagnostics.
#[derive(Debug)]
pub struct PipelineError {
    pub failing_pass: PassId,
    /// All diagnostics up to and including the failing pass.
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = self.diagnostics.iter().filter(|d| d.is_error()).count();
        write!(
            f,
            "{} failed with {} error(s)",
            descriptor(self.failing_pass).name,
            errors
        )
    }
}

impl std::error::Error for PipelineError {}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Turn a failed stage cert into one error diagnostic naming the obligations.
fn cert_diagnostics(cert: &impl StageCert, code: DiagCode, what: &str) -> Vec<Diagnostic> {
    if cert.all_pass() {
        return Vec::new();
    }
    let failed: Vec<&str> = cert
        .obligations()
        .into_iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| name)
        .collect();
    vec![Diagnostic::error(
        code,
        format!("{} verification failed: {}", what, failed.join(", ")),
    )]
}

/// Per-pass post-processing: callback, accumulate, verbose. Returns true if
/// the pass produced errors.
fn finish_pass(
    all_diags: &mut Vec<Diagnostic>,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    elapsed: Duration,
    verbose: bool,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> bool {
    on_pass_complete(pass_id, &diags);
    let is_err = has_errors(&diags);
    all_diags.extend(diags);
    if verbose {
        eprintln!(
            "ptl: {} complete, {:.1}ms",
            descriptor(pass_id).name,
            elapsed.as_secs_f64() * 1000.0
        );
    }
    is_err
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes producing every pass in `targets`.
///
/// Per-pass sequence: execute → verify → on_pass_complete → verbose → error check.
pub fn run_pipeline(
    records: Vec<TraceRecord>,
    targets: &[PassId],
    options: &TimelineOptions,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<Timeline, PipelineError> {
    let passes = required_passes_for(targets);
    let mut records = Some(records);
    let mut timeline = Timeline {
        tasks: Vec::new(),
        lanes: None,
        edges: None,
        tracked: options.tracked.clone(),
        diagnostics: Vec::new(),
    };

    for &pass_id in &passes {
        let t = Instant::now();
        let diags = match pass_id {
            PassId::BuildTasks => {
                let result = build_tasks(records.take().unwrap_or_default(), options.check_order);
                timeline.tasks = result.tasks;
                result.diagnostics
            }
            PassId::AllocateLanes => {
                let summary = allocate_lanes(&mut timeline.tasks);
                let cert = verify_lanes(&timeline.tasks, &summary);
                timeline.lanes = Some(summary);
                cert_diagnostics(&cert, codes::E0100, "lane")
            }
            PassId::ResolveDeps => {
                let edges = resolve_dependencies(&timeline.tasks, &options.tracked);
                let cert = verify_dependencies(&timeline.tasks, &edges, &options.tracked);
                timeline.edges = Some(edges);
                cert_diagnostics(&cert, codes::E0101, "dependency")
            }
        };
        let elapsed = t.elapsed();
        if finish_pass(
            &mut timeline.diagnostics,
            pass_id,
            diags,
            elapsed,
            options.verbose,
            &mut on_pass_complete,
        ) {
            return Err(PipelineError {
                failing_pass: pass_id,
                diagnostics: timeline.diagnostics,
            });
        }
    }

    Ok(timeline)
}

/// Run every pass: tasks, lanes, and dependency edges.
pub fn run_timeline(
    records: Vec<TraceRecord>,
    options: &TimelineOptions,
) -> Result<Timeline, PipelineError> {
    run_pipeline(records, &ALL_PASSES, options, |_, _| {})
}

// ── Tests ──────────────────────────────────────────────────────────────────
