//! Utility modules for grid_planning

pub mod geometry;
pub mod grid_map;
pub mod trace;
pub mod visualization;

pub use grid_map::*;
pub use trace::*;
pub use visualization::{GridLayers, Visualizer, colors};
