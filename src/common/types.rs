//! Common types used throughout grid_planning

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Grid cell coordinate (row, column)
///
/// Signed so that a neighbor offset can step outside the grid before the
/// bounds check rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn distance(&self, other: &Cell) -> f64 {
        f64::from(self.row - other.row).hypot(f64::from(self.col - other.col))
    }
}

impl From<(i32, i32)> for Cell {
    fn from(tuple: (i32, i32)) -> Self {
        Self { row: tuple.0, col: tuple.1 }
    }
}

impl Add for Cell {
    type Output = Cell;

    fn add(self, rhs: Cell) -> Cell {
        Cell::new(self.row + rhs.row, self.col + rhs.col)
    }
}

impl Sub for Cell {
    type Output = Cell;

    fn sub(self, rhs: Cell) -> Cell {
        Cell::new(self.row - rhs.row, self.col - rhs.col)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// State of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellState {
    #[default]
    Free,
    Occupied,
    Visited,
    Start,
    Goal,
    OnPath,
}

impl CellState {
    /// Cells a planner may step onto
    pub fn is_traversable(self) -> bool {
        matches!(self, CellState::Free | CellState::Start | CellState::Goal)
    }
}

/// Cost of a search record
///
/// `g` is the accumulated cost from the root, `h` the heuristic estimate to
/// the goal, `f` the value the frontier orders by.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cost {
    pub g: f64,
    pub h: f64,
    pub f: f64,
}

impl Cost {
    /// f = g + h
    pub fn new(g: f64, h: f64) -> Self {
        Self { g, h, f: g + h }
    }

    /// f = (1 - w) * g + w * h
    pub fn weighted(g: f64, h: f64, weight: f64) -> Self {
        Self { g, h, f: (1.0 - weight) * g + weight * h }
    }

    /// Pure path length: h = 0, f = g
    pub fn path_length(g: f64) -> Self {
        Self { g, h: 0.0, f: g }
    }
}

/// Role of a record inside a search tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Root,
    Branch,
    /// Synthetic record placed on the goal cell
    Goal,
}

/// A cell, the arena index of its parent and its cost
#[derive(Debug, Clone)]
pub struct SearchRecord {
    pub cell: Cell,
    pub parent: Option<usize>,
    pub cost: Cost,
    pub kind: RecordKind,
    /// Detached goal records stay in the arena but take no further part
    pub retired: bool,
}

impl SearchRecord {
    pub fn root(cell: Cell, cost: Cost) -> Self {
        Self { cell, parent: None, cost, kind: RecordKind::Root, retired: false }
    }

    pub fn child(cell: Cell, parent: usize, cost: Cost) -> Self {
        Self { cell, parent: Some(parent), cost, kind: RecordKind::Branch, retired: false }
    }

    pub fn goal(cell: Cell, parent: usize, cost: Cost) -> Self {
        Self { cell, parent: Some(parent), cost, kind: RecordKind::Goal, retired: false }
    }

    /// Whether the record can serve as a tree vertex for new branches
    pub fn is_vertex(&self) -> bool {
        !self.retired && self.kind != RecordKind::Goal
    }
}

/// Ordered sequence of cells from start to goal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    pub cells: Vec<Cell>,
}

impl Path {
    pub fn new() -> Self {
        Self { cells: Vec::new() }
    }

    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Walk parent links from `terminal` to the root and reverse.
    ///
    /// Consecutive duplicates are collapsed, which happens when a synthetic
    /// goal record hangs off a record already sitting on the goal cell.
    pub fn from_records(records: &[SearchRecord], terminal: usize) -> Self {
        let mut cells = Vec::new();
        let mut current = Some(terminal);

        while let Some(index) = current {
            let record = &records[index];
            cells.push(record.cell);
            current = record.parent;
        }

        cells.reverse();
        cells.dedup();
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of moves, one less than the number of cells
    pub fn step_count(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }

    pub fn first(&self) -> Option<Cell> {
        self.cells.first().copied()
    }

    pub fn last(&self) -> Option<Cell> {
        self.cells.last().copied()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.contains(&cell)
    }

    /// Summed Euclidean length of consecutive segments
    pub fn length(&self) -> f64 {
        self.cells.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cell> {
        self.cells.iter()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Cell;
    type IntoIter = std::slice::Iter<'a, Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_distance() {
        let a = Cell::new(0, 0);
        let b = Cell::new(3, 4);
        assert!((a.distance(&b) - 5.0).abs() < 1e-10);
        assert_eq!(a + Cell::new(1, -1), Cell::new(1, -1));
        assert_eq!(b - a, b);
    }

    #[test]
    fn test_cost_constructors() {
        let c = Cost::new(3.0, 2.0);
        assert_eq!(c.f, 5.0);

        let c = Cost::weighted(4.0, 2.0, 0.5);
        assert!((c.f - 3.0).abs() < 1e-12);

        let c = Cost::path_length(7.5);
        assert_eq!(c.h, 0.0);
        assert_eq!(c.f, c.g);
    }

    #[test]
    fn test_path_from_records() {
        let records = vec![
            SearchRecord::root(Cell::new(0, 0), Cost::default()),
            SearchRecord::child(Cell::new(0, 1), 0, Cost::new(1.0, 0.0)),
            SearchRecord::child(Cell::new(1, 1), 1, Cost::new(2.0, 0.0)),
            SearchRecord::goal(Cell::new(1, 1), 2, Cost::new(2.0, 0.0)),
        ];
        let path = Path::from_records(&records, 3);
        assert_eq!(path.cells, vec![Cell::new(0, 0), Cell::new(0, 1), Cell::new(1, 1)]);
        assert_eq!(path.step_count(), 2);
        assert!((path.length() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_goal_records_are_not_vertices() {
        let goal = SearchRecord::goal(Cell::new(2, 2), 0, Cost::default());
        assert!(!goal.is_vertex());
        assert!(SearchRecord::root(Cell::new(0, 0), Cost::default()).is_vertex());
    }
}
