//! RRT* path planning on a grid
//!
//! Like RRT, but a new branch is hung off the cheapest neighbor that can
//! steer toward the sample, and after every insertion the neighbors of the
//! new vertex are rewired through it when that shortens their path. The best
//! goal connection is replaced whenever a cheaper one appears, so the
//! returned path only gets shorter as iterations go on.

use std::sync::Arc;

use log::{info, trace};
use rand::RngCore;

use crate::common::{
    BranchLimits, Cell, CellState, GridPlanner, Path, PlanningResult, RrtStarConfig, SamplingPlanner,
};
use crate::path_planning::sampling_tree::{
    offer_goal, planner_rng, prepare_working_grid, reaches_goal, sample_free_cell, steer, tree_entries,
    SearchTree, TreeOutcome,
};
use crate::utils::geometry::{distance, is_blocked};
use crate::utils::{Grid, PlanningTrace, TraceEntry, TraceSnapshot};

/// RRT* path planner
pub struct RrtStarPlanner {
    config: RrtStarConfig,
    trace: Arc<PlanningTrace>,
}

impl RrtStarPlanner {
    pub fn new(config: RrtStarConfig) -> PlanningResult<Self> {
        config.validate()?;
        Ok(RrtStarPlanner { config, trace: PlanningTrace::new() })
    }

    pub fn config(&self) -> &RrtStarConfig {
        &self.config
    }

    /// Grow the tree, calling `on_iteration` with the tree and best goal
    /// record after every iteration.
    ///
    /// # Panics
    /// Panics if `start` or `goal` lies outside `grid`.
    pub fn grow<F>(
        &self,
        start: Cell,
        goal: Cell,
        grid: &Grid,
        rng: &mut dyn RngCore,
        mut on_iteration: F,
    ) -> TreeOutcome
    where
        F: FnMut(&SearchTree, Option<usize>),
    {
        let mut outcome = TreeOutcome::new(start);
        let working = match prepare_working_grid(self.name(), start, goal, grid, &self.trace) {
            Some(working) => working,
            None => return outcome,
        };

        let limits = self.config.branch_limits();
        let root = outcome.tree.root();

        if self.config.max_iterations > 0 && reaches_goal(start, goal, self.config.goal_radius, &working) {
            offer_goal(&mut outcome.tree, &mut outcome.best_goal, root, goal, &self.trace);
        }
        let mut best_cost = f64::INFINITY;
        self.record_improvement(&outcome, &mut best_cost);

        while outcome.iterations < self.config.max_iterations {
            if self.config.stop_on_first_solution && outcome.best_goal.is_some() {
                break;
            }
            outcome.iterations += 1;

            let sample = sample_free_cell(&working, rng);
            if let Some(id) = self.extend(&mut outcome.tree, sample, &limits, &working) {
                if reaches_goal(outcome.tree.record(id).cell, goal, self.config.goal_radius, &working) {
                    offer_goal(&mut outcome.tree, &mut outcome.best_goal, id, goal, &self.trace);
                }

                let rewired = self.rewire(&mut outcome.tree, id, &working);
                outcome.rewires += rewired;
                if rewired > 0 {
                    self.trace.replace_entries(tree_entries(&outcome.tree, start, goal));
                }

                self.record_improvement(&outcome, &mut best_cost);
            }

            on_iteration(&outcome.tree, outcome.best_goal);
        }

        outcome.finish(self.name())
    }

    /// Insert a branch toward `sample` under the cheapest neighbor that can
    /// steer to it. Falls back to the nearest vertex when no vertex lies
    /// within the neighbor radius.
    fn extend(&self, tree: &mut SearchTree, sample: Cell, limits: &BranchLimits, grid: &Grid) -> Option<usize> {
        let mut candidates = tree.within_radius(sample, self.config.neighbor_radius);
        if candidates.is_empty() {
            candidates.extend(tree.nearest(sample));
        }

        let (parent, cell) = candidates
            .iter()
            .find_map(|&parent| steer(tree.record(parent).cell, sample, limits, grid).map(|cell| (parent, cell)))?;

        let id = tree.insert(cell, parent);
        let from = tree.record(parent).cell;
        self.trace.record(TraceEntry::new(cell, Some(from), CellState::Visited));
        trace!("RRT*: sample {} added {} under {}", sample, cell, from);
        Some(id)
    }

    /// Reparent neighbors of `new_id` through it where that is cheaper and
    /// the segment is clear. Returns how many were rewired.
    fn rewire(&self, tree: &mut SearchTree, new_id: usize, grid: &Grid) -> usize {
        let new_cell = tree.record(new_id).cell;
        let new_parent = tree.record(new_id).parent;
        let mut rewired = 0;

        for near in tree.within_radius(new_cell, self.config.neighbor_radius) {
            if near == new_id || Some(near) == new_parent {
                continue;
            }

            let near_record = tree.record(near);
            let through_new = tree.record(new_id).cost.g + distance(new_cell, near_record.cell);
            if through_new < near_record.cost.g && !is_blocked(new_cell, near_record.cell, grid) {
                trace!(
                    "RRT*: rewire {} through {} ({:.3} -> {:.3})",
                    near_record.cell,
                    new_cell,
                    near_record.cost.g,
                    through_new
                );
                tree.reparent(near, new_id);
                rewired += 1;
            }
        }

        rewired
    }

    /// Push a snapshot when the best goal cost dropped below `best_cost`
    fn record_improvement(&self, outcome: &TreeOutcome, best_cost: &mut f64) {
        let (goal, cost) = match (outcome.best_goal, outcome.cost()) {
            (Some(goal), Some(cost)) if cost < *best_cost => (goal, cost),
            _ => return,
        };

        *best_cost = cost;
        info!("RRT*: best path length {:.3} at iteration {}", cost, outcome.iterations);
        self.trace.push_improvement(TraceSnapshot {
            iteration: outcome.iterations,
            cost,
            edges: outcome.tree.edges(),
            path: outcome.tree.path_to(goal),
        });
    }
}

impl GridPlanner for RrtStarPlanner {
    fn find_path(&self, start: Cell, goal: Cell, grid: &Grid) -> Path {
        let mut rng = planner_rng(self.config.seed);
        self.grow(start, goal, grid, &mut rng, |_, _| {}).path
    }

    fn name(&self) -> &'static str {
        "RRT*"
    }

    fn trace(&self) -> Arc<PlanningTrace> {
        Arc::clone(&self.trace)
    }
}

impl SamplingPlanner for RrtStarPlanner {
    fn find_path_with_rng(&self, start: Cell, goal: Cell, grid: &Grid, rng: &mut dyn RngCore) -> Path {
        self.grow(start, goal, grid, rng, |_, _| {}).path
    }

    fn set_max_iterations(&mut self, max_iterations: usize) {
        self.config.max_iterations = max_iterations;
    }

    fn max_iterations(&self) -> usize {
        self.config.max_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PlanningError;
    use crate::utils::geometry::traversed_cells;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn small_config(seed: u64) -> RrtStarConfig {
        RrtStarConfig {
            max_iterations: 1500,
            max_branch_length: 4.0,
            min_branch_length: 1.0,
            neighbor_radius: 5.0,
            goal_radius: 2.5,
            stop_on_first_solution: false,
            seed: Some(seed),
        }
    }

    fn wall_with_gap() -> Grid {
        let mut grid = Grid::new(10, 10);
        grid.set_occupied((0..10).filter(|&r| r != 5).map(|r| Cell::new(r, 5)));
        grid
    }

    fn cluttered() -> Grid {
        let mut grid = Grid::new(30, 30);
        grid.set_occupied(itertools::iproduct!(8..20, 10..13).map(|(r, c)| Cell::new(r, c)));
        grid.set_occupied(itertools::iproduct!(3..6, 15..28).map(|(r, c)| Cell::new(r, c)));
        grid.set_occupied(itertools::iproduct!(22..25, 2..20).map(|(r, c)| Cell::new(r, c)));
        grid
    }

    #[test]
    fn test_invalid_configuration() {
        let config = RrtStarConfig { neighbor_radius: -1.0, ..Default::default() };
        assert!(matches!(RrtStarPlanner::new(config), Err(PlanningError::InvalidConfiguration(_))));

        let config = RrtStarConfig { max_branch_length: 2.0, min_branch_length: 3.0, ..Default::default() };
        assert!(RrtStarPlanner::new(config).is_err());
    }

    #[test]
    fn test_costs_consistent_after_every_iteration() {
        let grid = cluttered();
        let planner = RrtStarPlanner::new(small_config(11)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut checked = 0;
        let mut parents: Vec<Option<usize>> = Vec::new();
        let mut reparented = 0;

        let outcome = planner.grow(Cell::new(0, 0), Cell::new(29, 29), &grid, &mut rng, |tree, _| {
            assert_eq!(tree.cost_violations(), Vec::<usize>::new());
            checked += 1;

            // retired goals lose their parent, so only count moves between two parents
            reparented += parents
                .iter()
                .zip(tree.records())
                .filter(|(before, record)| before.is_some() && record.parent.is_some() && **before != record.parent)
                .count();
            parents = tree.records().iter().map(|record| record.parent).collect();
        });

        assert_eq!(checked, outcome.iterations);
        assert_eq!(outcome.iterations, 1500);
        assert!(outcome.rewires > 0);
        assert_eq!(reparented, outcome.rewires);
    }

    #[test]
    fn test_rewire_through_cheaper_vertex() {
        let grid = Grid::new(10, 10);
        let planner = RrtStarPlanner::new(small_config(1)).unwrap();

        // (0,0) -> (0,4) -> (4,4) -> (4,7), then (2,2) hangs off the root
        let mut tree = SearchTree::new(Cell::new(0, 0));
        let root = tree.root();
        let a = tree.insert(Cell::new(0, 4), root);
        let b = tree.insert(Cell::new(4, 4), a);
        let c = tree.insert(Cell::new(4, 7), b);
        let new = tree.insert(Cell::new(2, 2), root);
        assert_eq!(tree.record(b).cost.g, 8.0);

        // a is cheaper through the root, c lies outside the neighbor radius
        assert_eq!(planner.rewire(&mut tree, new, &grid), 1);

        let through_new = 4.0 * 2f64.sqrt();
        assert_eq!(tree.record(b).parent, Some(new));
        assert!((tree.record(b).cost.g - through_new).abs() < 1e-9);
        assert_eq!(tree.record(c).parent, Some(b));
        assert!((tree.record(c).cost.g - (through_new + 3.0)).abs() < 1e-9);
        assert_eq!(tree.record(a).parent, Some(root));
        assert_eq!(tree.record(a).cost.g, 4.0);
        assert!(tree.children(a).is_empty());
        assert!(tree.cost_violations().is_empty());

        // nothing left to improve
        assert_eq!(planner.rewire(&mut tree, new, &grid), 0);
    }

    #[test]
    fn test_rewire_skips_blocked_segment() {
        let mut grid = Grid::new(10, 10);
        grid.set_state(Cell::new(3, 3), CellState::Occupied);
        let planner = RrtStarPlanner::new(small_config(1)).unwrap();

        let mut tree = SearchTree::new(Cell::new(0, 0));
        let root = tree.root();
        let a = tree.insert(Cell::new(0, 4), root);
        let b = tree.insert(Cell::new(4, 4), a);
        let new = tree.insert(Cell::new(2, 2), root);

        assert_eq!(planner.rewire(&mut tree, new, &grid), 0);
        assert_eq!(tree.record(b).parent, Some(a));
    }

    #[test]
    fn test_best_goal_cost_never_increases() {
        let grid = cluttered();
        let planner = RrtStarPlanner::new(small_config(4)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut last = f64::INFINITY;

        let outcome = planner.grow(Cell::new(0, 0), Cell::new(29, 29), &grid, &mut rng, |tree, best| {
            if let Some(goal) = best {
                let cost = tree.record(goal).cost.f;
                assert!(cost <= last + 1e-9, "goal cost rose from {} to {}", last, cost);
                last = cost;
            }
        });

        assert!(!outcome.path.is_empty());
        assert!((outcome.path.length() - outcome.cost().unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_improvements_strictly_decrease() {
        let grid = cluttered();
        let planner = RrtStarPlanner::new(small_config(8)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let outcome = planner.grow(Cell::new(0, 0), Cell::new(29, 29), &grid, &mut rng, |_, _| {});

        let improvements = planner.trace().improvements();
        assert!(!improvements.is_empty());
        for w in improvements.windows(2) {
            assert!(w[1].cost < w[0].cost);
            assert!(w[1].iteration >= w[0].iteration);
        }

        let last = improvements.last().unwrap();
        assert!(last.cost >= outcome.cost().unwrap() - 1e-9);
        assert_eq!(last.path.first(), Some(Cell::new(0, 0)));
        assert_eq!(last.path.last(), Some(Cell::new(29, 29)));
    }

    #[test]
    fn test_wall_gap() {
        let grid = wall_with_gap();
        let planner = RrtStarPlanner::new(small_config(5)).unwrap();
        let start = Cell::new(0, 0);
        let goal = Cell::new(9, 9);

        let path = planner.find_path(start, goal, &grid);
        assert_eq!(path.first(), Some(start));
        assert_eq!(path.last(), Some(goal));
        let cells = traversed_cells(&path);
        assert!(cells.contains(&Cell::new(5, 5)));
        assert!(cells.iter().all(|&c| !grid.is_occupied(c)));
    }

    #[test]
    fn test_trace_rebuilt_from_tree() {
        let grid = Grid::new(15, 15);
        let planner = RrtStarPlanner::new(small_config(6)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let outcome = planner.grow(Cell::new(0, 0), Cell::new(14, 14), &grid, &mut rng, |_, _| {});

        let view = planner.trace().snapshot();
        let goal_edges = view
            .entries
            .iter()
            .filter(|e| e.state == CellState::Goal && e.predecessor.is_some())
            .count();
        assert_eq!(goal_edges, 1);
        assert_eq!(view.entries.len(), 2 + outcome.tree.edges().len());
    }

    #[test]
    fn test_zero_iterations_and_blocked_start() {
        let mut planner = RrtStarPlanner::new(small_config(1)).unwrap();
        planner.set_max_iterations(0);
        assert!(planner.find_path(Cell::new(0, 0), Cell::new(9, 9), &Grid::new(10, 10)).is_empty());

        let grid = Grid::from_ascii(&["#..", "...", "..."]).unwrap();
        planner.set_max_iterations(100);
        assert!(planner.find_path(Cell::new(0, 0), Cell::new(2, 2), &grid).is_empty());
    }

    #[test]
    fn test_zero_iterations_inside_goal_radius() {
        let config = RrtStarConfig { max_iterations: 0, goal_radius: 5.0, ..small_config(1) };
        let planner = RrtStarPlanner::new(config).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let outcome = planner.grow(Cell::new(0, 0), Cell::new(0, 3), &Grid::new(10, 10), &mut rng, |_, _| {});

        assert!(outcome.path.is_empty());
        assert_eq!(outcome.best_goal, None);
        assert_eq!(outcome.iterations, 0);
        assert!(planner.trace().improvements().is_empty());
    }

    #[test]
    fn test_stop_on_first_solution() {
        let config = RrtStarConfig { stop_on_first_solution: true, ..small_config(2) };
        let planner = RrtStarPlanner::new(config).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let outcome = planner.grow(Cell::new(0, 0), Cell::new(14, 14), &Grid::new(15, 15), &mut rng, |_, _| {});

        assert!(!outcome.path.is_empty());
        assert!(outcome.iterations < 1500);
        assert_eq!(planner.trace().improvements().len(), 1);
    }
}
