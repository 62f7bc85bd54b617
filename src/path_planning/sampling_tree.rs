//! Arena-backed search tree shared by RRT and RRT*
//!
//! Records are stored in a `Vec` and refer to their parent by index. A
//! parent -> children index sits alongside so a rewire can push its cost
//! change down the subtree without scanning the whole arena.

use std::collections::VecDeque;

use log::{debug, info, warn};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::common::{BranchLimits, Cell, CellState, Cost, Path, SearchRecord};
use crate::utils::geometry::{distance, is_blocked, line_of_sight, nearest_record, records_within_radius};
use crate::utils::{Grid, PlanningTrace, TraceEntry};

/// Tolerance used when checking stored costs against recomputed ones
pub const COST_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct SearchTree {
    records: Vec<SearchRecord>,
    children: Vec<Vec<usize>>,
}

impl SearchTree {
    pub fn new(root: Cell) -> Self {
        SearchTree {
            records: vec![SearchRecord::root(root, Cost::path_length(0.0))],
            children: vec![Vec::new()],
        }
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn records(&self) -> &[SearchRecord] {
        &self.records
    }

    pub fn record(&self, id: usize) -> &SearchRecord {
        &self.records[id]
    }

    pub fn children(&self, id: usize) -> &[usize] {
        &self.children[id]
    }

    /// Number of records, retired goals included. Never zero: the root is
    /// inserted on construction.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn nearest(&self, target: Cell) -> Option<usize> {
        nearest_record(target, &self.records)
    }

    pub fn within_radius(&self, target: Cell, radius: f64) -> Vec<usize> {
        records_within_radius(target, radius, &self.records)
    }

    /// Add a branch under `parent`; cost is the parent's plus the segment length.
    pub fn insert(&mut self, cell: Cell, parent: usize) -> usize {
        let cost = self.edge_cost(parent, cell);
        self.push(SearchRecord::child(cell, parent, cost))
    }

    /// Add a synthetic goal record under `parent`.
    pub fn attach_goal(&mut self, goal: Cell, parent: usize) -> usize {
        let cost = self.edge_cost(parent, goal);
        self.push(SearchRecord::goal(goal, parent, cost))
    }

    fn push(&mut self, record: SearchRecord) -> usize {
        let id = self.records.len();
        if let Some(parent) = record.parent {
            self.children[parent].push(id);
        }
        self.records.push(record);
        self.children.push(Vec::new());
        id
    }

    fn edge_cost(&self, parent: usize, cell: Cell) -> Cost {
        let parent = &self.records[parent];
        Cost::path_length(parent.cost.g + distance(parent.cell, cell))
    }

    /// Move `id` under `new_parent` and refresh the costs of its whole subtree.
    pub fn reparent(&mut self, id: usize, new_parent: usize) {
        debug_assert!(!self.is_ancestor(id, new_parent), "reparent would create a cycle");

        if let Some(old_parent) = self.records[id].parent {
            self.children[old_parent].retain(|&child| child != id);
        }
        self.children[new_parent].push(id);
        self.records[id].parent = Some(new_parent);
        self.records[id].cost = self.edge_cost(new_parent, self.records[id].cell);

        self.propagate_costs(id);
    }

    /// Breadth-first over the children index, each descendant recomputed
    /// from its own parent.
    fn propagate_costs(&mut self, from: usize) {
        let mut queue = VecDeque::from([from]);

        while let Some(parent) = queue.pop_front() {
            for i in 0..self.children[parent].len() {
                let child = self.children[parent][i];
                self.records[child].cost = self.edge_cost(parent, self.records[child].cell);
                queue.push_back(child);
            }
        }
    }

    /// Detach a superseded goal record. It stays in the arena but has no
    /// parent and is ignored by every query.
    pub fn retire(&mut self, id: usize) {
        debug_assert!(self.children[id].is_empty(), "only leaves can be retired");

        if let Some(parent) = self.records[id].parent.take() {
            self.children[parent].retain(|&child| child != id);
        }
        self.records[id].retired = true;
    }

    pub fn is_ancestor(&self, ancestor: usize, id: usize) -> bool {
        let mut current = self.records[id].parent;
        while let Some(index) = current {
            if index == ancestor {
                return true;
            }
            current = self.records[index].parent;
        }
        false
    }

    pub fn path_to(&self, id: usize) -> Path {
        Path::from_records(&self.records, id)
    }

    /// Parent -> child edges of live records, for tracing and plotting
    pub fn edges(&self) -> Vec<TraceEntry> {
        self.records
            .iter()
            .filter(|r| !r.retired)
            .filter_map(|r| {
                let parent = r.parent?;
                let state = if r.is_vertex() { CellState::Visited } else { CellState::Goal };
                Some(TraceEntry::new(r.cell, Some(self.records[parent].cell), state))
            })
            .collect()
    }

    /// Records whose stored cost differs from parent cost + edge length, or
    /// whose parent link and children index disagree. Empty when consistent.
    pub fn cost_violations(&self) -> Vec<usize> {
        let mut violations = Vec::new();

        for (id, record) in self.records.iter().enumerate() {
            let consistent = match record.parent {
                Some(parent) => {
                    let expected = self.records[parent].cost.g + distance(self.records[parent].cell, record.cell);
                    (record.cost.g - expected).abs() <= COST_TOLERANCE
                        && record.cost.f == record.cost.g
                        && self.children[parent].contains(&id)
                }
                None => {
                    record.retired || id == self.root()
                }
            };
            let children_agree = self.children[id].iter().all(|&c| self.records[c].parent == Some(id));

            if !consistent || !children_agree {
                violations.push(id);
            }
        }

        violations
    }
}

/// Tree, best goal record and extracted path after growing a tree
#[derive(Debug, Clone)]
pub struct TreeOutcome {
    pub tree: SearchTree,
    pub best_goal: Option<usize>,
    pub path: Path,
    pub iterations: usize,
    /// Reparent operations performed while growing (RRT* only)
    pub rewires: usize,
}

impl TreeOutcome {
    pub(crate) fn new(start: Cell) -> Self {
        TreeOutcome {
            tree: SearchTree::new(start),
            best_goal: None,
            path: Path::new(),
            iterations: 0,
            rewires: 0,
        }
    }

    /// Length of the best path found, if any
    pub fn cost(&self) -> Option<f64> {
        self.best_goal.map(|goal| self.tree.record(goal).cost.f)
    }

    pub(crate) fn finish(mut self, name: &str) -> Self {
        match self.best_goal {
            Some(goal) => {
                self.path = self.tree.path_to(goal);
                debug!(
                    "{}: path of {} cells, length {:.3}, after {} iterations ({} records, {} rewires)",
                    name,
                    self.path.len(),
                    self.tree.record(goal).cost.f,
                    self.iterations,
                    self.tree.len(),
                    self.rewires
                );
            }
            None => debug!("{}: no path after {} iterations", name, self.iterations),
        }
        self
    }
}

/// Clear the trace and build the working grid with start and goal marked.
///
/// Returns `None` when the endpoints are blocked or nothing is left to sample.
///
/// # Panics
/// Panics if `start` or `goal` lies outside `grid`.
pub(crate) fn prepare_working_grid(
    name: &str,
    start: Cell,
    goal: Cell,
    grid: &Grid,
    trace: &PlanningTrace,
) -> Option<Grid> {
    assert!(grid.in_bounds(start), "start {} outside grid", start);
    assert!(grid.in_bounds(goal), "goal {} outside grid", goal);

    trace.clear();
    if !grid.is_free(start) || !grid.is_free(goal) {
        warn!("{}: start {} or goal {} is not traversable", name, start, goal);
        return None;
    }

    let mut working = grid.clone();
    working.set_state(start, CellState::Start);
    working.set_state(goal, CellState::Goal);
    trace.record(TraceEntry::new(start, None, CellState::Start));
    trace.record(TraceEntry::new(goal, None, CellState::Goal));

    if working.count(CellState::Free) == 0 {
        warn!("{}: no free cell left to sample", name);
        return None;
    }

    Some(working)
}

/// Seeded generator, or a fresh random seed when none is configured
pub(crate) fn planner_rng(seed: Option<u64>) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed.unwrap_or_else(rand::random))
}

/// Draw cells uniformly until a Free one comes up.
///
/// The caller must make sure at least one Free cell exists.
pub fn sample_free_cell(grid: &Grid, rng: &mut dyn RngCore) -> Cell {
    loop {
        let cell = Cell::new(
            rng.gen_range(0..grid.height() as i32),
            rng.gen_range(0..grid.width() as i32),
        );
        if grid.state(cell) == CellState::Free {
            return cell;
        }
    }
}

/// New branch end from `from` toward `toward`, or `None` if the sample is
/// discarded.
///
/// The target lies at most `max_branch_length` away. If the segment to it is
/// blocked, cells before the first obstacle are tried one at a time, walking
/// back toward `from`, until one has a clear segment; a candidate closer than
/// `min_branch_length` ends the walk.
pub fn steer(from: Cell, toward: Cell, limits: &BranchLimits, grid: &Grid) -> Option<Cell> {
    let d = distance(from, toward);
    if d == 0.0 || d < limits.min_branch_length {
        return None;
    }

    let target = if d > limits.max_branch_length {
        let scale = limits.max_branch_length / d;
        Cell::new(
            (f64::from(from.row) + f64::from(toward.row - from.row) * scale).round() as i32,
            (f64::from(from.col) + f64::from(toward.col - from.col) * scale).round() as i32,
        )
    } else {
        toward
    };

    let ray = line_of_sight(from, target);
    let first_blocked = match ray.iter().position(|&c| !grid.in_bounds(c) || grid.is_occupied(c)) {
        None => {
            let length = distance(from, target);
            return (length > 0.0 && length >= limits.min_branch_length).then_some(target);
        }
        Some(index) => index,
    };

    for &candidate in ray[..first_blocked].iter().rev() {
        let length = distance(from, candidate);
        if length == 0.0 || length < limits.min_branch_length {
            break;
        }
        if !is_blocked(from, candidate, grid) {
            return Some(candidate);
        }
    }

    None
}

/// Within `goal_radius` of the goal and able to reach it in a straight line
pub(crate) fn reaches_goal(cell: Cell, goal: Cell, goal_radius: f64, grid: &Grid) -> bool {
    distance(cell, goal) < goal_radius && (cell == goal || !is_blocked(cell, goal, grid))
}

/// Attach a goal record under `from` if it beats the current best.
///
/// The previous best, if any, is retired from the tree and its trace
/// entries removed. Returns whether the best goal changed.
pub(crate) fn offer_goal(
    tree: &mut SearchTree,
    best_goal: &mut Option<usize>,
    from: usize,
    goal: Cell,
    trace: &PlanningTrace,
) -> bool {
    let from_record = tree.record(from);
    let candidate = from_record.cost.g + distance(from_record.cell, goal);

    if let Some(best) = *best_goal {
        if candidate >= tree.record(best).cost.f {
            return false;
        }
        debug!("goal cost improved {:.3} -> {:.3}", tree.record(best).cost.f, candidate);
        tree.retire(best);
        trace.retire_goal_entries(goal);
    } else {
        info!("first goal connection, cost {:.3}", candidate);
    }

    let id = tree.attach_goal(goal, from);
    let entry = TraceEntry::new(goal, Some(tree.record(from).cell), CellState::Goal);
    trace.record(entry);
    trace.set_best_goal(Some(entry));
    *best_goal = Some(id);
    true
}

/// Start/goal markers followed by every live tree edge
pub(crate) fn tree_entries(tree: &SearchTree, start: Cell, goal: Cell) -> Vec<TraceEntry> {
    let mut entries = vec![
        TraceEntry::new(start, None, CellState::Start),
        TraceEntry::new(goal, None, CellState::Goal),
    ];
    entries.extend(tree.edges());
    entries
}
