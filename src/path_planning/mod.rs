//! Grid search and sampling-based path planners

pub mod grid_search;
pub mod sampling_tree;
pub mod rrt;
pub mod rrt_star;

pub use grid_search::*;
pub use sampling_tree::{sample_free_cell, steer, SearchTree, TreeOutcome, COST_TOLERANCE};
pub use rrt::*;
pub use rrt_star::*;
