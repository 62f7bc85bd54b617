//! Geometric primitives shared by the grid and sampling planners
//!
//! Distances are Euclidean in cell units. Line-of-sight discretizes the
//! straight segment between two cell indices into the cells it crosses.

use ordered_float::OrderedFloat;

use crate::common::{Cell, Path, SearchRecord};
use crate::utils::Grid;

/// Euclidean distance between two cells
pub fn distance(a: Cell, b: Cell) -> f64 {
    a.distance(&b)
}

/// Cells crossed by the segment from `a` to `b`, both endpoints included.
///
/// Samples are taken one unit apart along the segment, starting half a cell
/// into the direction of travel on each axis. The result is empty exactly
/// when `a == b`, and otherwise always begins with `a` and ends with `b`.
pub fn line_of_sight(a: Cell, b: Cell) -> Vec<Cell> {
    if a == b {
        return Vec::new();
    }

    let d_row = f64::from(b.row - a.row);
    let d_col = f64::from(b.col - a.col);
    let length = d_row.hypot(d_col);
    let (u_row, u_col) = (d_row / length, d_col / length);

    let offset_row = if d_row < 0.0 { -0.5 } else { 0.5 };
    let offset_col = if d_col < 0.0 { -0.5 } else { 0.5 };

    let samples = length.ceil() as usize;
    let mut ray: Vec<Cell> = (0..samples)
        .map(|i| {
            let t = i as f64;
            Cell::new(
                (f64::from(a.row) + offset_row + t * u_row) as i32,
                (f64::from(a.col) + offset_col + t * u_col) as i32,
            )
        })
        .collect();

    if ray.first() != Some(&a) {
        ray.insert(0, a);
    }
    if ray.last() != Some(&b) {
        ray.push(b);
    }

    ray
}

/// True when the ray is empty or crosses an Occupied (or off-grid) cell
pub fn is_blocked(a: Cell, b: Cell, grid: &Grid) -> bool {
    let ray = line_of_sight(a, b);
    ray.is_empty() || ray.iter().any(|&cell| !grid.in_bounds(cell) || grid.is_occupied(cell))
}

/// Every cell a path crosses, expanding each segment with [`line_of_sight`].
///
/// Tree planners return only their vertices; this is the cell sequence the
/// straight segments between them actually occupy.
pub fn traversed_cells(path: &Path) -> Vec<Cell> {
    let mut cells: Vec<Cell> = path.first().into_iter().collect();
    for w in path.cells.windows(2) {
        cells.extend(line_of_sight(w[0], w[1]).into_iter().skip(1));
    }
    cells
}

/// Index of the tree vertex closest to `target`; the first minimum wins.
///
/// Retired and synthetic goal records are never returned.
pub fn nearest_record(target: Cell, records: &[SearchRecord]) -> Option<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_vertex())
        .min_by_key(|(_, r)| OrderedFloat(distance(target, r.cell)))
        .map(|(i, _)| i)
}

/// Tree vertices strictly closer than `radius`, cheapest first.
pub fn records_within_radius(target: Cell, radius: f64, records: &[SearchRecord]) -> Vec<usize> {
    let mut near: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_vertex() && distance(target, r.cell) < radius)
        .map(|(i, _)| i)
        .collect();

    near.sort_by_key(|&i| OrderedFloat(records[i].cost.f));
    near
}
