//! RRT (Rapidly-exploring Random Tree) path planning on a grid
//!
//! Samples Free cells uniformly, extends the nearest tree vertex toward each
//! sample and connects to the goal once a vertex is within the goal radius
//! with a clear segment. By default the first connection is returned.

use std::sync::Arc;

use log::{debug, trace};
use rand::RngCore;

use crate::common::{Cell, CellState, GridPlanner, Path, PlanningResult, RrtConfig, SamplingPlanner};
use crate::path_planning::sampling_tree::{
    offer_goal, planner_rng, prepare_working_grid, reaches_goal, sample_free_cell, steer, TreeOutcome,
};
use crate::utils::{Grid, PlanningTrace, TraceEntry};

/// RRT path planner
pub struct RrtPlanner {
    config: RrtConfig,
    trace: Arc<PlanningTrace>,
}

impl RrtPlanner {
    /// Create a new RRT planner, rejecting inconsistent branch limits
    pub fn new(config: RrtConfig) -> PlanningResult<Self> {
        config.validate()?;
        Ok(RrtPlanner { config, trace: PlanningTrace::new() })
    }

    pub fn config(&self) -> &RrtConfig {
        &self.config
    }

    /// Grow the tree and keep it, along with the best goal record.
    ///
    /// # Panics
    /// Panics if `start` or `goal` lies outside `grid`.
    pub fn grow(&self, start: Cell, goal: Cell, grid: &Grid, rng: &mut dyn RngCore) -> TreeOutcome {
        let mut outcome = TreeOutcome::new(start);
        let working = match prepare_working_grid(self.name(), start, goal, grid, &self.trace) {
            Some(working) => working,
            None => return outcome,
        };

        let limits = self.config.branch_limits();
        let root = outcome.tree.root();
        debug!(
            "RRT: {} -> {}, up to {} iterations, branch [{}, {}]",
            start, goal, self.config.max_iterations, limits.min_branch_length, limits.max_branch_length
        );

        // a zero budget never returns a path, even from inside the goal radius
        if self.config.max_iterations > 0 && reaches_goal(start, goal, self.config.goal_radius, &working) {
            offer_goal(&mut outcome.tree, &mut outcome.best_goal, root, goal, &self.trace);
        }

        while outcome.iterations < self.config.max_iterations {
            if self.config.stop_on_first_solution && outcome.best_goal.is_some() {
                break;
            }
            outcome.iterations += 1;

            let sample = sample_free_cell(&working, rng);
            let nearest = match outcome.tree.nearest(sample) {
                Some(nearest) => nearest,
                None => break,
            };
            let from = outcome.tree.record(nearest).cell;
            let cell = match steer(from, sample, &limits, &working) {
                Some(cell) => cell,
                None => continue,
            };

            let id = outcome.tree.insert(cell, nearest);
            self.trace.record(TraceEntry::new(cell, Some(from), CellState::Visited));
            trace!("RRT: iteration {} sample {} added {} under {}", outcome.iterations, sample, cell, from);

            if reaches_goal(cell, goal, self.config.goal_radius, &working) {
                offer_goal(&mut outcome.tree, &mut outcome.best_goal, id, goal, &self.trace);
            }
        }

        outcome.finish(self.name())
    }
}

impl GridPlanner for RrtPlanner {
    fn find_path(&self, start: Cell, goal: Cell, grid: &Grid) -> Path {
        let mut rng = planner_rng(self.config.seed);
        self.grow(start, goal, grid, &mut rng).path
    }

    fn name(&self) -> &'static str {
        "RRT"
    }

    fn trace(&self) -> Arc<PlanningTrace> {
        Arc::clone(&self.trace)
    }
}

impl SamplingPlanner for RrtPlanner {
    fn find_path_with_rng(&self, start: Cell, goal: Cell, grid: &Grid, rng: &mut dyn RngCore) -> Path {
        self.grow(start, goal, grid, rng).path
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
    use crate::utils::geometry::{is_blocked, traversed_cells};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn small_config(seed: u64) -> RrtConfig {
        RrtConfig {
            max_iterations: 3000,
            max_branch_length: 4.0,
            min_branch_length: 1.0,
            goal_radius: 2.5,
            stop_on_first_solution: true,
            seed: Some(seed),
        }
    }

    fn assert_tree_path(path: &Path, grid: &Grid, start: Cell, goal: Cell) {
        assert_eq!(path.first(), Some(start));
        assert_eq!(path.last(), Some(goal));
        for w in path.cells.windows(2) {
            assert!(!is_blocked(w[0], w[1], grid), "segment {} -> {} is blocked", w[0], w[1]);
        }
    }

    #[test]
    fn test_invalid_configuration() {
        let config = RrtConfig { min_branch_length: 12.0, ..Default::default() };
        assert!(matches!(RrtPlanner::new(config), Err(PlanningError::InvalidConfiguration(_))));

        let config = RrtConfig { goal_radius: 0.0, ..Default::default() };
        assert!(RrtPlanner::new(config).is_err());
    }

    #[test]
    fn test_open_grid() {
        let grid = Grid::new(20, 20);
        let planner = RrtPlanner::new(small_config(1)).unwrap();
        let start = Cell::new(0, 0);
        let goal = Cell::new(19, 19);

        let outcome = planner.grow(start, goal, &grid, &mut ChaCha8Rng::seed_from_u64(1));
        assert!(!outcome.path.is_empty());
        assert_tree_path(&outcome.path, &grid, start, goal);
        assert!(outcome.cost().unwrap() >= start.distance(&goal) - 1e-9);
        assert!(outcome.tree.cost_violations().is_empty());
    }

    #[test]
    fn test_wall_gap() {
        let mut grid = Grid::new(10, 10);
        grid.set_occupied((0..10).filter(|&r| r != 5).map(|r| Cell::new(r, 5)));
        let planner = RrtPlanner::new(small_config(7)).unwrap();
        let start = Cell::new(0, 0);
        let goal = Cell::new(9, 9);

        let path = planner.find_path(start, goal, &grid);
        assert!(!path.is_empty());
        assert_tree_path(&path, &grid, start, goal);
        assert!(traversed_cells(&path).contains(&Cell::new(5, 5)));
    }

    #[test]
    fn test_zero_iterations() {
        let mut planner = RrtPlanner::new(small_config(3)).unwrap();
        planner.set_max_iterations(0);
        assert_eq!(planner.max_iterations(), 0);

        let path = planner.find_path(Cell::new(0, 0), Cell::new(9, 9), &Grid::new(10, 10));
        assert!(path.is_empty());
        assert_eq!(planner.trace().len(), 2);
    }

    #[test]
    fn test_zero_iterations_inside_goal_radius() {
        let config = RrtConfig { max_iterations: 0, goal_radius: 5.0, ..small_config(3) };
        let planner = RrtPlanner::new(config).unwrap();
        let grid = Grid::new(10, 10);

        assert!(planner.find_path(Cell::new(0, 0), Cell::new(0, 3), &grid).is_empty());
        assert!(planner.find_path(Cell::new(4, 4), Cell::new(4, 4), &grid).is_empty());
    }

    #[test]
    fn test_start_is_goal() {
        let planner = RrtPlanner::new(small_config(3)).unwrap();
        let path = planner.find_path(Cell::new(4, 4), Cell::new(4, 4), &Grid::new(10, 10));
        assert_eq!(path.cells, vec![Cell::new(4, 4)]);
    }

    #[test]
    fn test_blocked_goal_and_enclosed_goal() {
        let mut grid = Grid::new(10, 10);
        grid.set_state(Cell::new(9, 9), CellState::Occupied);
        let planner = RrtPlanner::new(small_config(5)).unwrap();
        assert!(planner.find_path(Cell::new(0, 0), Cell::new(9, 9), &grid).is_empty());

        let mut grid = Grid::new(10, 10);
        grid.set_occupied([Cell::new(8, 8), Cell::new(8, 9), Cell::new(9, 8)]);
        let mut planner = RrtPlanner::new(small_config(5)).unwrap();
        planner.set_max_iterations(500);
        assert!(planner.find_path(Cell::new(0, 0), Cell::new(9, 9), &grid).is_empty());
    }

    #[test]
    fn test_same_seed_same_path() {
        let grid = Grid::new(15, 15);
        let planner = RrtPlanner::new(small_config(11)).unwrap();
        let a = planner.find_path(Cell::new(0, 0), Cell::new(14, 7), &grid);
        let b = planner.find_path(Cell::new(0, 0), Cell::new(14, 7), &grid);
        assert_eq!(a, b);
    }

    #[test]
    fn test_trace_matches_tree() {
        let grid = Grid::new(12, 12);
        let planner = RrtPlanner::new(small_config(2)).unwrap();
        let outcome = planner.grow(Cell::new(0, 0), Cell::new(11, 11), &grid, &mut ChaCha8Rng::seed_from_u64(2));
        let view = planner.trace().snapshot();

        assert_eq!(view.entries.len(), 2 + outcome.tree.edges().len());
        assert_eq!(view.best_goal.map(|e| e.cell), Some(Cell::new(11, 11)));
    }

    #[test]
    fn test_sampling_planner_trait_object() {
        let planner: Box<dyn SamplingPlanner> = Box::new(RrtPlanner::new(small_config(9)).unwrap());
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let path = planner.find_path_with_rng(Cell::new(0, 0), Cell::new(9, 0), &Grid::new(10, 10), &mut rng);
        assert_eq!(path.last(), Some(Cell::new(9, 0)));
    }
}
