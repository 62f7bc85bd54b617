//! Error types for grid_planning

use thiserror::Error;

/// Main error type for the planning crate
///
/// "No path" is never an error: planners return an empty [`Path`](crate::common::Path)
/// for that. These variants cover configuration mistakes and the outer
/// collaborators (map files, config files, plotting).
#[derive(Error, Debug)]
pub enum PlanningError {
    /// Planner parameters rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Malformed map text
    #[error("Map parse error at line {line}: {message}")]
    MapParse { line: usize, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be decoded
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Visualization error
    #[error("Visualization error: {0}")]
    Visualization(String),
}

impl PlanningError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        PlanningError::InvalidConfiguration(msg.into())
    }
}

/// Result type alias for planning operations
pub type PlanningResult<T> = Result<T, PlanningError>;
