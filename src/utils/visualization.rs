//! Visualization utilities for grid_planning
//!
//! [`GridLayers`] turns a grid, a trace and a path into plot coordinates;
//! [`Visualizer`] draws them with gnuplot. Cells map to (x = column, y = row)
//! and the y axis is flipped so row 0 sits at the top, as in the text dump.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::common::{Cell, CellState, Path, PlanningError, PlanningResult};
use crate::utils::{Grid, TraceView};

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const GREEN: &str = "#00AA00";
    pub const BLUE: &str = "#0000FF";
    pub const GRAY: &str = "#A0A0A0";

    pub const OBSTACLE: &str = BLACK;
    pub const START: &str = GREEN;
    pub const GOAL: &str = BLUE;
    pub const PATH: &str = RED;
    pub const TRACE: &str = GRAY;
}

fn point(cell: Cell) -> (f64, f64) {
    (f64::from(cell.col), f64::from(cell.row))
}

/// Plot coordinates extracted from a planning run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridLayers {
    pub rows: usize,
    pub cols: usize,
    pub occupied_x: Vec<f64>,
    pub occupied_y: Vec<f64>,
    /// Trace edges as one polyline, segments separated by NaN
    pub edges_x: Vec<f64>,
    pub edges_y: Vec<f64>,
    pub start: Option<(f64, f64)>,
    pub goal: Option<(f64, f64)>,
    pub path_x: Vec<f64>,
    pub path_y: Vec<f64>,
}

impl GridLayers {
    pub fn new(grid: &Grid) -> Self {
        let mut layers = GridLayers { rows: grid.height(), cols: grid.width(), ..Default::default() };
        for cell in grid.cells().filter(|&c| grid.is_occupied(c)) {
            let (x, y) = point(cell);
            layers.occupied_x.push(x);
            layers.occupied_y.push(y);
        }
        layers
    }

    pub fn with_trace(mut self, view: &TraceView) -> Self {
        for entry in &view.entries {
            match (entry.predecessor, entry.state) {
                (Some(from), _) => {
                    let (x0, y0) = point(from);
                    let (x1, y1) = point(entry.cell);
                    self.edges_x.extend([x0, x1, f64::NAN]);
                    self.edges_y.extend([y0, y1, f64::NAN]);
                }
                (None, CellState::Start) => self.start = Some(point(entry.cell)),
                (None, CellState::Goal) => self.goal = Some(point(entry.cell)),
                (None, _) => {}
            }
        }
        self
    }

    pub fn with_path(mut self, path: &Path) -> Self {
        let (xs, ys): (Vec<f64>, Vec<f64>) = path.iter().map(|&c| point(c)).unzip();
        self.path_x = xs;
        self.path_y = ys;
        if let (Some(first), Some(last)) = (path.first(), path.last()) {
            self.start.get_or_insert(point(first));
            self.goal.get_or_insert(point(last));
        }
        self
    }
}

/// Main visualizer struct
pub struct Visualizer {
    figure: Figure,
    title: String,
}

impl Visualizer {
    pub fn new() -> Self {
        Self { figure: Figure::new(), title: String::new() }
    }

    /// Set the plot title
    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    /// Draw every non-empty layer onto a single set of axes
    pub fn draw(&mut self, layers: &GridLayers) -> &mut Self {
        let axes = self.figure.axes2d();

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_range(AutoOption::Fix(-1.0), AutoOption::Fix(layers.cols as f64));
        axes.set_y_range(AutoOption::Fix(layers.rows as f64), AutoOption::Fix(-1.0));
        axes.set_aspect_ratio(AutoOption::Fix(1.0));

        if !layers.occupied_x.is_empty() {
            axes.points(
                &layers.occupied_x,
                &layers.occupied_y,
                &[Caption("Obstacles"), Color(colors::OBSTACLE), PointSymbol('S'), PointSize(0.8)],
            );
        }
        if !layers.edges_x.is_empty() {
            axes.lines(&layers.edges_x, &layers.edges_y, &[Caption("Search"), Color(colors::TRACE)]);
        }
        if !layers.path_x.is_empty() {
            axes.lines(
                &layers.path_x,
                &layers.path_y,
                &[Caption("Path"), Color(colors::PATH), LineWidth(2.0)],
            );
        }
        if let Some((x, y)) = layers.start {
            axes.points(&[x], &[y], &[Caption("Start"), Color(colors::START), PointSymbol('O'), PointSize(1.5)]);
        }
        if let Some((x, y)) = layers.goal {
            axes.points(&[x], &[y], &[Caption("Goal"), Color(colors::GOAL), PointSymbol('O'), PointSize(1.5)]);
        }

        self
    }

    /// Finalize and show the plot
    pub fn show(&mut self) -> PlanningResult<()> {
        self.figure
            .show()
            .map(|_| ())
            .map_err(|e| PlanningError::Visualization(e.to_string()))
    }

    /// Save plot to PNG file
    pub fn save_png(&mut self, path: &str, width: u32, height: u32) -> PlanningResult<()> {
        self.figure
            .save_to_png(path, width, height)
            .map_err(|e| PlanningError::Visualization(e.to_string()))
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}
