//! Common traits defining interfaces for the grid planners

use std::sync::Arc;

use rand::RngCore;

use crate::common::types::*;
use crate::utils::{Grid, PlanningTrace};

/// Trait for planners working on an occupancy grid
///
/// The caller's grid is never modified. An empty [`Path`] means no path was
/// found; a start or goal outside the grid is a caller bug and panics.
pub trait GridPlanner {
    /// Plan a path from start to goal
    fn find_path(&self, start: Cell, goal: Cell, grid: &Grid) -> Path;

    /// Short display name
    fn name(&self) -> &'static str;

    /// Shared trace of the most recent planning call
    fn trace(&self) -> Arc<PlanningTrace>;
}

/// Trait for sampling-based planners (RRT, RRT*)
pub trait SamplingPlanner: GridPlanner {
    /// Plan with a caller-supplied random source, for reproducible runs
    fn find_path_with_rng(&self, start: Cell, goal: Cell, grid: &Grid, rng: &mut dyn RngCore) -> Path;

    /// Set maximum iterations for planning
    fn set_max_iterations(&mut self, max_iterations: usize);

    fn max_iterations(&self) -> usize;
}
