// emit.rs — Text report and render-contract output for a Timeline
//
// The render contract is what an external timeline renderer consumes: one
// row per task `(unit, lane, start_cycle, end_cycle, mnemonic,
// program_order)` plus the dependency edge list by task index. Layout,
// colors and image output belong to the renderer.
//
// Preconditions: `timeline` came from `run_pipeline`.
// Postconditions: output is deterministic for a given timeline.
// Failure modes: none (pure formatting).
// Side effects: none.

use std::fmt;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::diag::{DiagLevel, Diagnostic};
use crate::id::TaskId;
use crate::operand::InstrClass;
use crate::pipeline::{Provenance, Timeline};
use crate::task::Task;
use crate::trace::Unit;

// ── Render contract ─────────────────────────────────────────────────────────

/// One task as handed to a renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderRow<'a> {
    pub program_order: TaskId,
    pub unit: Unit,
    /// Absent when lane allocation did not run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane: Option<u32>,
    pub start_cycle: u64,
    pub end_cycle: u64,
    pub mnemonic: &'a str,
    pub class: InstrClass,
}

/// Render rows in program order.
pub fn render_rows(timeline: &Timeline) -> Vec<RenderRow<'_>> {
    timeline
        .tasks
        .iter()
        .map(|t| RenderRow {
            program_order: t.id,
            unit: t.unit(),
            lane: t.lane,
            start_cycle: t.record.start_cycle,
            end_cycle: t.record.end_cycle,
            mnemonic: t.mnemonic(),
            class: t.class,
        })
        .collect()
}

fn diagnostic_value(d: &Diagnostic) -> Value {
    json!({
        "level": match d.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        },
        "code": d.code.map(|c| c.0),
        "row": d.row,
        "span": d.span,
        "message": d.message,
        "hint": d.hint,
    })
}

/// The full render contract as a JSON document.
pub fn to_json(timeline: &Timeline, provenance: &Provenance) -> String {
    let lanes = timeline.lanes.as_ref().map(|summary| {
        summary
            .groups
            .iter()
            .map(|(unit, g)| {
                (
                    unit.name().to_string(),
                    json!({
                        "tasks": g.task_count,
                        "lanes": g.lane_count,
                        "peak_overlap": g.peak_overlap,
                    }),
                )
            })
            .collect::<Map<String, Value>>()
    });
    let tracked: Vec<&str> = timeline.tracked.iter().map(InstrClass::name).collect();
    let diagnostics: Vec<Value> = timeline.diagnostics.iter().map(diagnostic_value).collect();

    let doc = json!({
        "provenance": provenance.to_value(),
        "tracked": tracked,
        "lanes": lanes,
        "tasks": render_rows(timeline),
        "edges": timeline.edges,
        "diagnostics": diagnostics,
    });
    format!("{:#}\n", doc)
}

/// Provenance alone, for `--emit build-info`.
pub fn build_info_json(provenance: &Provenance) -> String {
    format!("{:#}\n", provenance.to_value())
}

// ── Text report ─────────────────────────────────────────────────────────────

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "timeline: {} tasks, tracking {}",
            self.tasks.len(),
            self.tracked
        )?;

        match &self.lanes {
            Some(summary) => {
                for (unit, stats) in &summary.groups {
                    writeln!(
                        f,
                        "[{}] {} tasks, {} lanes, peak overlap {}",
                        unit, stats.task_count, stats.lane_count, stats.peak_overlap
                    )?;
                    let mut members: Vec<&Task> =
                        self.tasks.iter().filter(|t| t.unit() == *unit).collect();
                    members.sort_by_key(|t| (t.lane, t.id));
                    for t in members {
                        let label = t.lane.map_or_else(|| "unlaned".to_string(), |l| unit.lane_label(l));
                        writeln!(f, "  {}: {} {} {}", label, t.id, t.interval(), t.mnemonic())?;
                    }
                }
            }
            None => {
                writeln!(f, "tasks:")?;
                for t in &self.tasks {
                    writeln!(f, "  {}", t)?;
                }
            }
        }

        if let Some(edges) = &self.edges {
            writeln!(f, "edges: {}", edges.len())?;
            for e in edges {
                let producer = self.tasks.get(e.producer.index()).map_or("?", Task::mnemonic);
                let consumer = self.tasks.get(e.consumer.index()).map_or("?", Task::mnemonic);
                writeln!(f, "  {}: {} -> {}", e, producer, consumer)?;
            }
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::PassId;
    use crate::pipeline::{compute_provenance, run_pipeline, run_timeline, TimelineOptions};
    use crate::trace::TraceRecord;

    fn options() -> TimelineOptions {
        TimelineOptions {
            check_order: false,
            ..TimelineOptions::default()
        }
    }

    fn scenario_b() -> Vec<TraceRecord> {
        vec![
            TraceRecord::new("addi a0,x,1", Unit::Scalar, 0, 1),
            TraceRecord::new("addi a0,y,2", Unit::Scalar, 1, 2),
            TraceRecord::new("vfmacc.vf a3,a0,a4", Unit::Vector, 2, 5),
        ]
    }

    #[test]
    fn rows_follow_program_order() {
        let timeline = run_timeline(scenario_b(), &options()).unwrap();
        let rows = render_rows(&timeline);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].program_order, TaskId(2));
        assert_eq!(rows[2].unit, Unit::Vector);
        assert_eq!(rows[2].lane, Some(0));
        assert_eq!((rows[2].start_cycle, rows[2].end_cycle), (2, 5));
        assert_eq!(rows[2].mnemonic, "vfmacc.vf a3,a0,a4");
    }

    #[test]
    fn json_document_shape() {
        let timeline = run_timeline(scenario_b(), &options()).unwrap();
        let text = to_json(&timeline, &compute_provenance("trace"));
        let doc: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(doc["tracked"], json!(["fused_multiply_accumulate"]));
        assert_eq!(doc["lanes"]["scalar"]["lanes"], 1);
        assert_eq!(doc["lanes"]["fp"]["tasks"], 0);
        assert_eq!(doc["tasks"][1]["lane"], 0);
        assert_eq!(doc["tasks"][1]["class"], "arithmetic");
        assert_eq!(
            doc["edges"],
            json!([{"producer": 1, "consumer": 2, "register": "a0"}])
        );
        assert_eq!(doc["diagnostics"], json!([]));
        assert_eq!(doc["provenance"]["trace_hash"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn json_without_lanes_omits_them() {
        let timeline = run_pipeline(scenario_b(), &[PassId::BuildTasks], &options(), |_, _| {})
            .unwrap();
        let doc: Value = serde_json::from_str(&to_json(&timeline, &compute_provenance(""))).unwrap();
        assert_eq!(doc["lanes"], Value::Null);
        assert_eq!(doc["edges"], Value::Null);
        assert!(doc["tasks"][0].get("lane").is_none());
    }

    #[test]
    fn diagnostics_in_json() {
        let records = vec![TraceRecord::new("beqz", Unit::Scalar, 0, 1)];
        let timeline = run_timeline(records, &options()).unwrap();
        let doc: Value = serde_json::from_str(&to_json(&timeline, &compute_provenance(""))).unwrap();
        let d = &doc["diagnostics"][0];
        assert_eq!(d["level"], "warning");
        assert_eq!(d["code"], "W0100");
        assert_eq!(d["row"], 0);
        assert_eq!(d["span"], json!({"start": 4, "end": 4}));
    }

    #[test]
    fn text_report_without_lanes_lists_tasks() {
        let timeline = run_pipeline(scenario_b(), &[PassId::BuildTasks], &options(), |_, _| {})
            .unwrap();
        let text = format!("{timeline}");
        assert!(text.starts_with("timeline: 3 tasks, tracking {fused_multiply_accumulate}\ntasks:\n"));
        assert!(text.contains("  #2 vector [2, 5) vfmacc.vf a3,a0,a4 [fused_multiply_accumulate] def=a3 use=a0,a4\n"));
        assert!(!text.contains("edges:"));
    }

    #[test]
    fn build_info_has_version() {
        let info = build_info_json(&compute_provenance("x"));
        let doc: Value = serde_json::from_str(&info).unwrap();
        assert_eq!(doc["tool_version"], env!("CARGO_PKG_VERSION"));
    }
}
