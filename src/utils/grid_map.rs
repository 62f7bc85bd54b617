//! Occupancy grid used by every planner
//!
//! The grid is a dense `nalgebra` matrix of [`CellState`], indexed by
//! (row, column). Planners never mutate the caller's grid: they clone it and
//! work on the copy.

use std::fmt;
use std::fs;

use itertools::iproduct;
use log::debug;
use nalgebra::DMatrix;

use crate::common::{Cell, CellState, Path, PlanningError, PlanningResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    cells: DMatrix<CellState>,
}

impl Grid {
    /// All-free grid
    pub fn new(height: usize, width: usize) -> Self {
        Self::filled(height, width, CellState::Free)
    }

    pub fn filled(height: usize, width: usize, state: CellState) -> Self {
        Self { cells: DMatrix::from_element(height, width, state) }
    }

    /// Build a grid from text rows: `#` is Occupied, anything else Free.
    pub fn from_ascii(rows: &[&str]) -> PlanningResult<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.chars().count());
        let mut grid = Self::new(height, width);

        for (row, line) in rows.iter().enumerate() {
            if line.chars().count() != width {
                return Err(PlanningError::MapParse {
                    line: row + 1,
                    message: format!("expected {} columns, found {}", width, line.chars().count()),
                });
            }
            for (col, ch) in line.chars().enumerate() {
                if ch == '#' {
                    grid.cells[(row, col)] = CellState::Occupied;
                }
            }
        }

        Ok(grid)
    }

    /// Parse the MovingAI `.map` text format.
    ///
    /// ```text
    /// type octile
    /// height 3
    /// width 4
    /// map
    /// ..@.
    /// ..@.
    /// ....
    /// ```
    ///
    /// `.` and `G` are Free, every other character is Occupied.
    pub fn from_map_str(text: &str) -> PlanningResult<Self> {
        let mut lines = text.lines().enumerate();

        let mut header = |keyword: &str| -> PlanningResult<String> {
            let (index, line) = lines.next().ok_or_else(|| PlanningError::MapParse {
                line: 0,
                message: format!("unexpected end of input, expected `{}`", keyword),
            })?;
            let mut parts = line.split_whitespace();
            if parts.next() != Some(keyword) {
                return Err(PlanningError::MapParse {
                    line: index + 1,
                    message: format!("expected `{}`, found `{}`", keyword, line.trim()),
                });
            }
            Ok(parts.collect::<Vec<_>>().join(" "))
        };

        header("type")?;
        let height = parse_dimension(&header("height")?, 2)?;
        let width = parse_dimension(&header("width")?, 3)?;
        header("map")?;

        let mut grid = Self::filled(height, width, CellState::Occupied);
        for row in 0..height {
            let (index, line) = lines.next().ok_or_else(|| PlanningError::MapParse {
                line: row + 5,
                message: format!("expected {} map rows, found {}", height, row),
            })?;
            let chars: Vec<char> = line.chars().collect();
            if chars.len() < width {
                return Err(PlanningError::MapParse {
                    line: index + 1,
                    message: format!("expected {} columns, found {}", width, chars.len()),
                });
            }
            for (col, ch) in chars.into_iter().take(width).enumerate() {
                if ch == '.' || ch == 'G' {
                    grid.cells[(row, col)] = CellState::Free;
                }
            }
        }

        debug!("parsed map {}x{}, {} free cells", height, width, grid.count(CellState::Free));
        Ok(grid)
    }

    pub fn from_map_file<P: AsRef<std::path::Path>>(path: P) -> PlanningResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_map_str(&contents)
    }

    pub fn height(&self) -> usize {
        self.cells.nrows()
    }

    pub fn width(&self) -> usize {
        self.cells.ncols()
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.row >= 0
            && cell.col >= 0
            && (cell.row as usize) < self.height()
            && (cell.col as usize) < self.width()
    }

    pub fn get(&self, cell: Cell) -> Option<CellState> {
        if self.in_bounds(cell) {
            Some(self.cells[(cell.row as usize, cell.col as usize)])
        } else {
            None
        }
    }

    /// State of an in-bounds cell.
    ///
    /// # Panics
    /// Panics if `cell` lies outside the grid.
    pub fn state(&self, cell: Cell) -> CellState {
        self.assert_in_bounds(cell);
        self.cells[(cell.row as usize, cell.col as usize)]
    }

    /// # Panics
    /// Panics if `cell` lies outside the grid.
    pub fn set_state(&mut self, cell: Cell, state: CellState) {
        self.assert_in_bounds(cell);
        self.cells[(cell.row as usize, cell.col as usize)] = state;
    }

    /// In bounds and Free, Start or Goal
    pub fn is_free(&self, cell: Cell) -> bool {
        self.get(cell).map_or(false, CellState::is_traversable)
    }

    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.get(cell) == Some(CellState::Occupied)
    }

    /// Every cell in row-major order
    pub fn cells(&self) -> impl Iterator<Item = Cell> {
        iproduct!(0..self.height() as i32, 0..self.width() as i32).map(|(r, c)| Cell::new(r, c))
    }

    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|&&s| s == state).count()
    }

    pub fn set_occupied<I: IntoIterator<Item = Cell>>(&mut self, cells: I) {
        for cell in cells {
            self.set_state(cell, CellState::Occupied);
        }
    }

    /// Overlay a path, leaving the start and goal markers in place
    pub fn mark_path(&mut self, path: &Path) {
        for &cell in path {
            match self.state(cell) {
                CellState::Start | CellState::Goal => {}
                _ => self.set_state(cell, CellState::OnPath),
            }
        }
    }

    fn assert_in_bounds(&self, cell: Cell) {
        assert!(
            self.in_bounds(cell),
            "cell {} outside {}x{} grid",
            cell,
            self.height(),
            self.width()
        );
    }
}

fn parse_dimension(value: &str, line: usize) -> PlanningResult<usize> {
    value.trim().parse::<usize>().map_err(|e| PlanningError::MapParse {
        line,
        message: format!("invalid dimension `{}`: {}", value, e),
    })
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.height() {
            for col in 0..self.width() {
                let ch = match self.cells[(row, col)] {
                    CellState::Free => '.',
                    CellState::Occupied => '#',
                    CellState::Visited => 'o',
                    CellState::Start => 'S',
                    CellState::Goal => 'G',
                    CellState::OnPath => '*',
                };
                write!(f, "{}", ch)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
