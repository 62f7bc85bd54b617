//! Planner configuration
//!
//! Every struct deserializes from TOML with missing fields falling back to
//! their defaults, and is checked by `validate()` before a planner is built.
//!
//! ```toml
//! [grid_search]
//! connectivity = 8
//! heuristic = "chebyshev"
//!
//! [rrt_star]
//! max_iterations = 3000
//! seed = 42
//! ```

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::common::error::{PlanningError, PlanningResult};
use crate::common::types::Cell;

/// Distance estimate used by A*
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heuristic {
    #[default]
    Euclidean,
    Manhattan,
    Chebyshev,
}

impl Heuristic {
    pub fn estimate(self, from: Cell, to: Cell) -> f64 {
        let dr = f64::from((from.row - to.row).abs());
        let dc = f64::from((from.col - to.col).abs());
        match self {
            Heuristic::Euclidean => dr.hypot(dc),
            Heuristic::Manhattan => dr + dc,
            Heuristic::Chebyshev => dr.max(dc),
        }
    }
}

/// Configuration for the grid search planners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSearchConfig {
    /// 4 or 8
    pub connectivity: u8,
    /// A* only. Unset picks the exact unit-cost distance for the
    /// connectivity: Manhattan for 4, Chebyshev for 8.
    pub heuristic: Option<Heuristic>,
    /// A* blend weight in [0, 1]; 0.5 orders like g + h
    pub heuristic_weight: f64,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            connectivity: 4,
            heuristic: None,
            heuristic_weight: 0.5,
        }
    }
}

impl GridSearchConfig {
    pub fn heuristic(&self) -> Heuristic {
        match (self.heuristic, self.connectivity) {
            (Some(heuristic), _) => heuristic,
            (None, 8) => Heuristic::Chebyshev,
            (None, _) => Heuristic::Manhattan,
        }
    }

    pub fn validate(&self) -> PlanningResult<()> {
        if self.connectivity != 4 && self.connectivity != 8 {
            return Err(PlanningError::invalid(format!(
                "connectivity must be 4 or 8, got {}",
                self.connectivity
            )));
        }
        if !(0.0..=1.0).contains(&self.heuristic_weight) {
            return Err(PlanningError::invalid(format!(
                "heuristic weight must lie in [0, 1], got {}",
                self.heuristic_weight
            )));
        }
        // diagonal moves cost 1, so only Chebyshev never overestimates
        if self.connectivity == 8 && self.heuristic() != Heuristic::Chebyshev {
            return Err(PlanningError::invalid(format!(
                "{:?} heuristic overestimates on an 8-connected grid, use chebyshev",
                self.heuristic()
            )));
        }
        Ok(())
    }
}

/// Branch length limits used when steering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchLimits {
    pub max_branch_length: f64,
    pub min_branch_length: f64,
}

impl BranchLimits {
    pub fn validate(&self) -> PlanningResult<()> {
        // written negated so NaN is rejected too
        if !(self.max_branch_length >= 1.0) || self.max_branch_length.is_infinite() {
            return Err(PlanningError::invalid(format!(
                "max branch length must be at least 1, got {}",
                self.max_branch_length
            )));
        }
        if !(self.min_branch_length >= 0.0) || self.min_branch_length > self.max_branch_length {
            return Err(PlanningError::invalid(format!(
                "min branch length {} must lie in [0, {}]",
                self.min_branch_length, self.max_branch_length
            )));
        }
        Ok(())
    }
}

fn validate_radius(name: &str, radius: f64) -> PlanningResult<()> {
    if radius > 0.0 && radius.is_finite() {
        Ok(())
    } else {
        Err(PlanningError::invalid(format!("{} must be positive, got {}", name, radius)))
    }
}

/// Configuration for RRT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RrtConfig {
    pub max_iterations: usize,
    pub max_branch_length: f64,
    pub min_branch_length: f64,
    /// A vertex strictly closer than this may connect to the goal
    pub goal_radius: f64,
    /// Return the first goal connection instead of running every iteration
    pub stop_on_first_solution: bool,
    /// Fixed seed for reproducible runs; random when unset
    pub seed: Option<u64>,
}

impl Default for RrtConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            max_branch_length: 10.0,
            min_branch_length: 5.0,
            goal_radius: 5.0,
            stop_on_first_solution: true,
            seed: None,
        }
    }
}

impl RrtConfig {
    pub fn branch_limits(&self) -> BranchLimits {
        BranchLimits {
            max_branch_length: self.max_branch_length,
            min_branch_length: self.min_branch_length,
        }
    }

    pub fn validate(&self) -> PlanningResult<()> {
        self.branch_limits().validate()?;
        validate_radius("goal radius", self.goal_radius)
    }
}

/// Configuration for RRT*
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RrtStarConfig {
    pub max_iterations: usize,
    pub max_branch_length: f64,
    pub min_branch_length: f64,
    /// Radius for choosing a parent and for rewiring
    pub neighbor_radius: f64,
    pub goal_radius: f64,
    /// Off by default: RRT* keeps improving the path until the budget runs out
    pub stop_on_first_solution: bool,
    pub seed: Option<u64>,
}

impl Default for RrtStarConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            max_branch_length: 10.0,
            min_branch_length: 5.0,
            neighbor_radius: 20.0,
            goal_radius: 5.0,
            stop_on_first_solution: false,
            seed: None,
        }
    }
}

impl RrtStarConfig {
    pub fn branch_limits(&self) -> BranchLimits {
        BranchLimits {
            max_branch_length: self.max_branch_length,
            min_branch_length: self.min_branch_length,
        }
    }

    pub fn validate(&self) -> PlanningResult<()> {
        self.branch_limits().validate()?;
        validate_radius("neighbor radius", self.neighbor_radius)?;
        validate_radius("goal radius", self.goal_radius)
    }
}

/// Configuration for every planner, as read from one TOML document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub grid_search: GridSearchConfig,
    pub rrt: RrtConfig,
    pub rrt_star: RrtStarConfig,
}

impl PlannerConfig {
    pub fn from_toml_str(text: &str) -> PlanningResult<Self> {
        let config: PlannerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> PlanningResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        debug!("loading planner config from {}", path.display());
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> PlanningResult<()> {
        self.grid_search.validate()?;
        self.rrt.validate()?;
        self.rrt_star.validate()
    }
}
