//! grid_planning - path planning on occupancy grids
//!
//! This crate provides breadth-first, depth-first and A* search together with
//! the sampling-based RRT and RRT* planners, all working on a 2D grid of cell
//! states and sharing one trace a renderer can poll while planning runs.

// Core modules
pub mod common;
pub mod utils;

// Algorithm modules
pub mod path_planning;

// Re-export common types for convenience
pub use common::{Cell, CellState, Cost, Path, SearchRecord};
pub use common::{GridPlanner, SamplingPlanner};
pub use common::{GridSearchConfig, Heuristic, PlannerConfig, RrtConfig, RrtStarConfig};
pub use common::{PlanningError, PlanningResult};
pub use utils::{Grid, PlanningTrace};
