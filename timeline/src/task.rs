// task.rs — Task construction from trace rows
//
// Wraps each trace row in a `Task`: parsed operands, instruction class and a
// stable program-order ID. Rows are never reordered.
//
// Preconditions: `records` are in program-counter order (not re-verified
//                unless `check_order` is set).
// Postconditions: `tasks[i].id == TaskId(i)`; every task has `lane == None`.
// Failure modes: rows with `end_cycle <= start_cycle` produce E0001 errors;
//                malformed operands produce W0100 warnings; decreasing `pc`
//                values produce W0101 warnings when `check_order` is set.
// Side effects: none.

use std::fmt;

use crate::diag::{codes, Diagnostic};
use crate::id::{IdAllocator, TaskId};
use crate::operand::{parse_operands, InstrClass, RegName};
use crate::trace::{Interval, TraceRecord, Unit};

/// A trace row annotated for timeline analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Program order; also the task's index in the task list.
    pub id: TaskId,
    pub record: TraceRecord,
    /// First word of the mnemonic text.
    pub opcode: String,
    pub class: InstrClass,
    pub destination: Option<RegName>,
    pub sources: Vec<RegName>,
    /// Display lane within the task's unit group, set by lane allocation.
    pub lane: Option<u32>,
}

impl Task {
    pub fn program_order(&self) -> u32 {
        self.id.0
    }

    pub fn unit(&self) -> Unit {
        self.record.unit
    }

    pub fn interval(&self) -> Interval {
        self.record.interval()
    }

    pub fn mnemonic(&self) -> &str {
        &self.record.mnemonic
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} [{}]",
            self.id,
            self.unit(),
            self.interval(),
            self.mnemonic(),
            self.class
        )?;
        if let Some(dest) = &self.destination {
            write!(f, " def={}", dest)?;
        }
        if !self.sources.is_empty() {
            let uses: Vec<&str> = self.sources.iter().map(RegName::as_str).collect();
            write!(f, " use={}", uses.join(","))?;
        }
        Ok(())
    }
}

/// Result of task construction.
#[derive(Debug)]
pub struct BuildResult {
    pub tasks: Vec<Task>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Build one task per row, in input order.
pub fn build_tasks(records: Vec<TraceRecord>, check_order: bool) -> BuildResult {
    let mut ids = IdAllocator::new();
    let mut tasks = Vec::with_capacity(records.len());
    let mut diagnostics = Vec::new();
    let mut last_pc: Option<u64> = None;

    for record in records {
        let id = ids.alloc_task();
        let row = id.index();

        if record.end_cycle <= record.start_cycle {
            diagnostics.push(
                Diagnostic::error(
                    codes::E0001,
                    format!(
                        "'{}' has an empty cycle interval {}",
                        record.mnemonic,
                        record.interval()
                    ),
                )
                .at_row(row)
                .with_hint("end cycle must be greater than start cycle"),
            );
        }

        if check_order {
            if let (Some(prev), Some(pc)) = (last_pc, record.pc) {
                if pc < prev {
                    diagnostics.push(
                        Diagnostic::warning(
                            codes::W0101,
                            format!("pc {:#x} follows pc {:#x}; rows are out of program order", pc, prev),
                        )
                        .at_row(row)
                        .with_hint("sort the trace by pc before analysis"),
                    );
                }
            }
            if record.pc.is_some() {
                last_pc = record.pc;
            }
        }

        let parsed = parse_operands(&record.mnemonic);
        for issue in &parsed.issues {
            diagnostics.push(
                Diagnostic::warning(
                    codes::W0100,
                    format!("'{}': {}", record.mnemonic, issue.message),
                )
                .at_row(row)
                .with_span(issue.span),
            );
        }

        tasks.push(Task {
            id,
            record,
            opcode: parsed.opcode,
            class: parsed.class,
            destination: parsed.destination,
            sources: parsed.sources,
            lane: None,
        });
    }

    BuildResult { tasks, diagnostics }
}

// ── Tests ───────────────────────────────────────────────────────────────────
