// deps.rs — Read-after-write dependency recovery
//
// Scans tasks in program order while tracking the last writer of every
// register, and records a producer→consumer edge whenever a task of a
// tracked class reads a register some earlier task wrote.
//
// Only read-after-write dependencies are reported. Write-after-write and
// write-after-read hazards are not, and neither are reads by classes outside
// the tracked set (those reads are still scanned, they just emit nothing).
//
// Preconditions: `tasks` are in program order with `tasks[i].id == TaskId(i)`.
// Postconditions: every edge has `producer < consumer` and a tracked-class
//                 consumer; edges are ordered by consumer, then operand order.
// Failure modes: none.
// Side effects: none.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::id::TaskId;
use crate::operand::{InstrClass, RegName};
use crate::task::Task;

// ── Public types ────────────────────────────────────────────────────────────

/// A true register dependency between two tasks, by task index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DependencyEdge {
    pub producer: TaskId,
    pub consumer: TaskId,
    /// The register carrying the value.
    pub register: RegName,
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.producer, self.consumer, self.register)
    }
}

/// The set of instruction classes whose reads produce edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSet(BTreeSet<InstrClass>);

impl ClassSet {
    pub fn empty() -> Self {
        ClassSet(BTreeSet::new())
    }

    pub fn all() -> Self {
        InstrClass::ALL.into_iter().collect()
    }

    pub fn contains(&self, class: InstrClass) -> bool {
        self.0.contains(&class)
    }

    pub fn insert(&mut self, class: InstrClass) -> bool {
        self.0.insert(class)
    }

    pub fn iter(&self) -> impl Iterator<Item = InstrClass> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fused multiply-accumulate consumers only.
impl Default for ClassSet {
    fn default() -> Self {
        [InstrClass::FusedMultiplyAccumulate].into_iter().collect()
    }
}

impl FromIterator<InstrClass> for ClassSet {
    fn from_iter<T: IntoIterator<Item = InstrClass>>(iter: T) -> Self {
        ClassSet(iter.into_iter().collect())
    }
}

impl fmt::Display for ClassSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(InstrClass::name).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

// ── Resolver ────────────────────────────────────────────────────────────────

/// Recover read-after-write edges for consumers in `tracked`.
pub fn resolve_dependencies(tasks: &[Task], tracked: &ClassSet) -> Vec<DependencyEdge> {
    let mut resolver = Resolver::new(tracked);
    for task in tasks {
        resolver.visit(task);
    }
    resolver.edges
}

/// Scan state for one resolution run.
struct Resolver<'a> {
    tracked: &'a ClassSet,
    /// Most recent writer of each register as of the scan position.
    last_writer: HashMap<RegName, TaskId>,
    edges: Vec<DependencyEdge>,
}

impl<'a> Resolver<'a> {
    fn new(tracked: &'a ClassSet) -> Self {
        Resolver {
            tracked,
            last_writer: HashMap::new(),
            edges: Vec::new(),
        }
    }

    fn visit(&mut self, task: &Task) {
        if self.tracked.contains(task.class) {
            for src in &task.sources {
                let Some(&producer) = self.last_writer.get(src) else {
                    continue;
                };
                if producer < task.id {
                    self.edges.push(DependencyEdge {
                        producer,
                        consumer: task.id,
                        register: src.clone(),
                    });
                }
            }
        }
        // Writes are recorded after reads: `add a0,a0,1` reads the old a0.
        if let Some(dest) = &task.destination {
            self.last_writer.insert(dest.clone(), task.id);
        }
    }
}

// ── Verification ────────────────────────────────────────────────────────────

/// Machine-checkable evidence for dependency postconditions.
#[derive(Debug, Clone)]
pub struct DepCert {
    /// Every producer precedes its consumer in program order.
    pub d1_producer_precedes: bool,
    /// Every consumer belongs to the tracked class set.
    pub d2_tracked_consumers: bool,
    /// Every edge register is written by the producer and read by the consumer.
    pub d3_register_flow: bool,
}

impl crate::pass::StageCert for DepCert {
    fn all_pass(&self) -> bool {
        self.d1_producer_precedes && self.d2_tracked_consumers && self.d3_register_flow
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("D1_producer_precedes", self.d1_producer_precedes),
            ("D2_tracked_consumers", self.d2_tracked_consumers),
            ("D3_register_flow", self.d3_register_flow),
        ]
    }
}

pub fn verify_dependencies(
    tasks: &[Task],
    edges: &[DependencyEdge],
    tracked: &ClassSet,
) -> DepCert {
    let d1 = edges.iter().all(|e| e.producer < e.consumer);
    let d2 = edges.iter().all(|e| {
        tasks
            .get(e.consumer.index())
            .is_some_and(|t| tracked.contains(t.class))
    });
    let d3 = edges.iter().all(|e| {
        let writes = tasks
            .get(e.producer.index())
            .is_some_and(|p| p.destination.as_ref() == Some(&e.register));
        let reads = tasks
            .get(e.consumer.index())
            .is_some_and(|c| c.sources.contains(&e.register));
        writes && reads
    });
    DepCert {
        d1_producer_precedes: d1,
        d2_tracked_consumers: d2,
        d3_register_flow: d3,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::StageCert;
    use crate::task::build_tasks;
    use crate::trace::{TraceRecord, Unit};

    fn tasks_of(rows: &[(&str, Unit)]) -> Vec<Task> {
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, (text, unit))| TraceRecord::new(*text, *unit, i as u64, i as u64 + 1))
            .collect();
        build_tasks(records, false).tasks
    }

    fn edge(producer: u32, consumer: u32, reg: &str) -> DependencyEdge {
        DependencyEdge {
            producer: TaskId(producer),
            consumer: TaskId(consumer),
            register: RegName::from(reg),
        }
    }

    #[test]
    fn last_writer_wins() {
        let tasks = tasks_of(&[
            ("addi a0,x,1", Unit::Scalar),
            ("addi a0,y,2", Unit::Scalar),
            ("vfmacc.vf a3,a0,a4", Unit::Vector),
        ]);
        let edges = resolve_dependencies(&tasks, &ClassSet::default());
        assert_eq!(edges, vec![edge(1, 2, "a0")]);
    }

    #[test]
    fn untracked_consumers_emit_nothing() {
        let tasks = tasks_of(&[
            ("addi a0,a1,1", Unit::Scalar),
            ("addi a2,a0,3", Unit::Scalar),
        ]);
        assert!(resolve_dependencies(&tasks, &ClassSet::default()).is_empty());

        let arith: ClassSet = [InstrClass::Arithmetic].into_iter().collect();
        assert_eq!(resolve_dependencies(&tasks, &arith), vec![edge(0, 1, "a0")]);
    }

    #[test]
    fn untracked_writers_still_produce() {
        let tasks = tasks_of(&[
            ("flw ft0, 0(a0)", Unit::Fp),
            ("vle32.v v8, (a1)", Unit::Vector),
            ("vfmacc.vf v0, ft0, v8", Unit::Vector),
        ]);
        let edges = resolve_dependencies(&tasks, &ClassSet::default());
        assert_eq!(edges, vec![edge(0, 2, "ft0"), edge(1, 2, "v8")]);
    }

    #[test]
    fn read_happens_before_own_write() {
        let tasks = tasks_of(&[
            ("vfmacc.vf v0, ft0, v8", Unit::Vector),
            ("vfmacc.vf v8, ft0, v8", Unit::Vector),
        ]);
        // Task 1 reads the v8 nobody wrote yet, then writes v8 itself.
        assert!(resolve_dependencies(&tasks, &ClassSet::default()).is_empty());
    }

    #[test]
    fn accumulator_chain_is_not_reported() {
        // The implicit read of vd is not an explicit source.
        let tasks = tasks_of(&[
            ("vfmacc.vf v0, ft0, v8", Unit::Vector),
            ("vfmacc.vf v0, ft1, v9", Unit::Vector),
        ]);
        assert!(resolve_dependencies(&tasks, &ClassSet::default()).is_empty());
    }

    #[test]
    fn branches_define_nothing() {
        let tasks = tasks_of(&[
            ("bne a0, a1, loop", Unit::Scalar),
            ("addi a1,a1,4", Unit::Scalar),
            ("bgeu a1, a2, done", Unit::Scalar),
        ]);
        let all = ClassSet::all();
        assert_eq!(resolve_dependencies(&tasks, &all), vec![edge(1, 2, "a1")]);
    }

    #[test]
    fn empty_inputs() {
        assert!(resolve_dependencies(&[], &ClassSet::default()).is_empty());
        let tasks = tasks_of(&[
            ("addi a0,a1,1", Unit::Scalar),
            ("vfmacc.vf v0, a0, v8", Unit::Vector),
        ]);
        assert!(resolve_dependencies(&tasks, &ClassSet::empty()).is_empty());
    }

    #[test]
    fn verify_accepts_resolved_edges() {
        let tasks = tasks_of(&[
            ("flw ft0, 0(a0)", Unit::Fp),
            ("vfmacc.vf v0, ft0, v8", Unit::Vector),
        ]);
        let tracked = ClassSet::default();
        let edges = resolve_dependencies(&tasks, &tracked);
        assert!(verify_dependencies(&tasks, &edges, &tracked).all_pass());

        let bogus = vec![edge(1, 0, "ft0")];
        let cert = verify_dependencies(&tasks, &bogus, &tracked);
        assert!(!cert.d1_producer_precedes);
        assert!(!cert.d2_tracked_consumers);
        assert!(!cert.d3_register_flow);
    }

    #[test]
    fn class_set_display() {
        assert_eq!(format!("{}", ClassSet::default()), "{fused_multiply_accumulate}");
        assert_eq!(format!("{}", ClassSet::empty()), "{}");
        assert_eq!(format!("{}", edge(1, 2, "a0")), "#1 -> #2 (a0)");
    }
}
