// lanes.rs — First-fit lane allocation per execution-unit group
//
// Packs the cycle intervals of each unit group into display lanes so that no
// two intervals in one lane overlap. Tasks are placed in program order into
// the lowest-numbered lane that admits them; a new lane is opened only when
// none does. Greedy first-fit interval coloring, not a minimum coloring.
//
// Preconditions: `tasks` are in program order; task intervals are non-empty
//                (checked upstream by E0001).
// Postconditions: every task has `lane == Some(_)`; same-lane intervals
//                 within a group are pairwise disjoint.
// Failure modes: none.
// Side effects: sets `Task::lane`.

use std::collections::BTreeMap;
use std::fmt;

use crate::task::Task;
use crate::trace::{Interval, Unit};

// ── Public types ────────────────────────────────────────────────────────────

/// Lane assignment for one group, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLanes {
    pub assignments: Vec<u32>,
    pub lane_count: u32,
}

/// Per-group lane statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupStats {
    pub task_count: usize,
    pub lane_count: u32,
    /// Largest number of intervals alive at one cycle.
    pub peak_overlap: u32,
}

/// Lane statistics for every unit group. Empty groups are present with zero
/// lanes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneSummary {
    pub groups: BTreeMap<Unit, GroupStats>,
}

impl LaneSummary {
    pub fn lane_count(&self, unit: Unit) -> u32 {
        self.groups.get(&unit).map_or(0, |g| g.lane_count)
    }

    /// Widest group; 0 when every group is empty.
    pub fn max_lane_count(&self) -> u32 {
        self.groups.values().map(|g| g.lane_count).max().unwrap_or(0)
    }

    pub fn total_lanes(&self) -> u32 {
        self.groups.values().map(|g| g.lane_count).sum()
    }
}

// ── Lane state ──────────────────────────────────────────────────────────────

/// Intervals placed in one lane, sorted by `(start, end)`, pairwise disjoint.
#[derive(Debug, Default)]
struct Lane {
    placed: Vec<Interval>,
    has_empty: bool,
}

impl Lane {
    fn admits(&self, iv: Interval) -> bool {
        if iv.is_empty() || self.has_empty {
            return self.placed.iter().all(|p| !p.overlaps(iv));
        }
        // Non-empty disjoint intervals sorted by start also have sorted ends,
        // so only the last interval starting before `iv.end` can overlap.
        let idx = self.placed.partition_point(|p| p.start < iv.end);
        idx == 0 || self.placed[idx - 1].end <= iv.start
    }

    fn place(&mut self, iv: Interval) {
        let pos = self.placed.partition_point(|p| *p <= iv);
        self.placed.insert(pos, iv);
        self.has_empty |= iv.is_empty();
    }
}

// ── Allocation ──────────────────────────────────────────────────────────────

/// First-fit lane allocation for one group's intervals, in the given order.
pub fn allocate_group<I>(intervals: I) -> GroupLanes
where
    I: IntoIterator<Item = Interval>,
{
    let mut lanes: Vec<Lane> = Vec::new();
    let mut assignments = Vec::new();

    for iv in intervals {
        let lane = match lanes.iter().position(|l| l.admits(iv)) {
            Some(idx) => idx,
            None => {
                lanes.push(Lane::default());
                lanes.len() - 1
            }
        };
        lanes[lane].place(iv);
        assignments.push(lane as u32);
    }

    GroupLanes {
        assignments,
        lane_count: lanes.len() as u32,
    }
}

/// Assign lanes to all tasks, one independent pass per unit group.
pub fn allocate_lanes(tasks: &mut [Task]) -> LaneSummary {
    let mut groups = BTreeMap::new();

    for unit in Unit::ALL {
        let members: Vec<usize> = tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.unit() == unit)
            .map(|(i, _)| i)
            .collect();
        let intervals: Vec<Interval> = members.iter().map(|&i| tasks[i].interval()).collect();

        let result = allocate_group(intervals.iter().copied());
        for (&i, &lane) in members.iter().zip(&result.assignments) {
            debug_assert!(tasks[i].lane.is_none(), "lane assigned twice");
            tasks[i].lane = Some(lane);
        }

        groups.insert(
            unit,
            GroupStats {
                task_count: members.len(),
                lane_count: result.lane_count,
                peak_overlap: peak_overlap(&intervals),
            },
        );
    }

    LaneSummary { groups }
}

/// Largest number of half-open intervals that share a cycle.
pub fn peak_overlap(intervals: &[Interval]) -> u32 {
    // Ends sort before starts at the same cycle: [0,2) and [2,4) never coexist.
    let mut events: Vec<(u64, i32)> = Vec::with_capacity(intervals.len() * 2);
    for iv in intervals.iter().filter(|iv| !iv.is_empty()) {
        events.push((iv.start, 1));
        events.push((iv.end, -1));
    }
    events.sort_unstable_by_key(|&(cycle, delta)| (cycle, delta));

    let mut live = 0i32;
    let mut peak = 0i32;
    for (_, delta) in events {
        live += delta;
        peak = peak.max(live);
    }
    peak as u32
}

// ── Verification ────────────────────────────────────────────────────────────

/// Machine-checkable evidence for lane postconditions.
#[derive(Debug, Clone)]
pub struct LaneCert {
    /// Every task has a lane below its group's lane count.
    pub l1_all_tasks_laned: bool,
    /// No two same-group, same-lane intervals overlap.
    pub l2_lanes_disjoint: bool,
}

impl crate::pass::StageCert for LaneCert {
    fn all_pass(&self) -> bool {
        self.l1_all_tasks_laned && self.l2_lanes_disjoint
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("L1_all_tasks_laned", self.l1_all_tasks_laned),
            ("L2_lanes_disjoint", self.l2_lanes_disjoint),
        ]
    }
}

pub fn verify_lanes(tasks: &[Task], summary: &LaneSummary) -> LaneCert {
    let l1 = tasks.iter().all(|t| match t.lane {
        Some(lane) => lane < summary.lane_count(t.unit()),
        None => false,
    });

    let mut by_lane: BTreeMap<(Unit, u32), Vec<Interval>> = BTreeMap::new();
    for t in tasks {
        if let Some(lane) = t.lane {
            by_lane.entry((t.unit(), lane)).or_default().push(t.interval());
        }
    }
    let l2 = by_lane.values_mut().all(|ivs| {
        ivs.sort();
        ivs.windows(2).all(|w| !w[0].overlaps(w[1]))
            && (ivs.iter().all(|iv| !iv.is_empty())
                || ivs
                    .iter()
                    .enumerate()
                    .all(|(i, a)| ivs[i + 1..].iter().all(|b| !a.overlaps(*b))))
    });

    LaneCert {
        l1_all_tasks_laned: l1,
        l2_lanes_disjoint: l2,
    }
}

// ── Display ─────────────────────────────────────────────────────────────────

impl fmt::Display for LaneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (unit, stats) in &self.groups {
            writeln!(
                f,
                "{}: {} tasks, {} lanes, peak overlap {}",
                unit, stats.task_count, stats.lane_count, stats.peak_overlap
            )?;
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
