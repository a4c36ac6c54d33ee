// pass.rs — Pass descriptors: metadata, dependency resolution, artifact IDs
//
// Declares the timeline passes, their dependency edges, and the artifacts
// they produce. The pipeline runner uses this to compute the minimal pass set
// for each --emit target. Lane allocation and dependency resolution both
// consume only the task list, so neither requires the other.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each timeline pass (trace loading happens before the runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    BuildTasks,
    AllocateLanes,
    ResolveDeps,
}

/// Machine-readable artifact identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Tasks, // Vec<Task>
    Lanes, // LaneSummary + Task::lane
    Edges, // Vec<DependencyEdge>
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Passes whose outputs this pass consumes.
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// Postconditions (documentation; checked by the stage certs).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::BuildTasks => PassDescriptor {
            name: "build_tasks",
            inputs: &[],
            outputs: &[ArtifactId::Tasks],
            invariants: "one task per row, program order = row index",
        },
        PassId::AllocateLanes => PassDescriptor {
            name: "allocate_lanes",
            inputs: &[PassId::BuildTasks],
            outputs: &[ArtifactId::Lanes],
            invariants: "L1-L2: every task laned, same-lane intervals disjoint",
        },
        PassId::ResolveDeps => PassDescriptor {
            name: "resolve_deps",
            inputs: &[PassId::BuildTasks],
            outputs: &[ArtifactId::Edges],
            invariants: "D1-D3: producer precedes consumer, tracked consumers only",
        },
    }
}

/// Postcondition evidence produced after a pass.
pub trait StageCert {
    fn all_pass(&self) -> bool;
    /// Named obligations and whether each holds.
    fn obligations(&self) -> Vec<(&'static str, bool)>;
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 3] = [
    PassId::BuildTasks,
    PassId::AllocateLanes,
    PassId::ResolveDeps,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    required_passes_for(&[terminal])
}

/// Minimal ordered pass set producing every pass in `terminals`.
pub fn required_passes_for(terminals: &[PassId]) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    for &terminal in terminals {
        visit(terminal, &mut visited, &mut order);
    }
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────
