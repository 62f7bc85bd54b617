// Grid planning demo
//
// Runs BFS, DFS, A*, RRT and RRT* on one grid, prints what each found and
// saves a plot per planner under img/.
//
// usage: grid_planning [MAP_FILE] [CONFIG_TOML]

use std::env;
use std::fs;
use std::process;
use std::time::Instant;

use grid_planning::common::{
    Cell, CellState, GridPlanner, Path, PlannerConfig, PlanningError, PlanningResult,
};
use grid_planning::path_planning::{GridSearchPlanner, RrtPlanner, RrtStarPlanner, SearchMode};
use grid_planning::utils::geometry::traversed_cells;
use grid_planning::utils::{Grid, GridLayers, Visualizer};

const MAX_PRINT_WIDTH: usize = 80;

// 40x40 with a vertical wall and a single gap
fn wall_with_gap() -> (Grid, Cell, Cell) {
    let mut grid = Grid::new(40, 40);
    grid.set_occupied((0..40).filter(|&r| r != 20).map(|r| Cell::new(r, 20)));
    (grid, Cell::new(2, 2), Cell::new(37, 37))
}

// first and last Free cells in row-major order
fn endpoints(grid: &Grid) -> Option<(Cell, Cell)> {
    let start = grid.cells().find(|&c| grid.is_free(c))?;
    let goal = grid.cells().filter(|&c| grid.is_free(c)).last()?;
    (start != goal).then_some((start, goal))
}

fn overlay(grid: &Grid, start: Cell, goal: Cell, path: &Path) -> Grid {
    let mut shown = grid.clone();
    shown.set_state(start, CellState::Start);
    shown.set_state(goal, CellState::Goal);
    shown.mark_path(&Path::from_cells(traversed_cells(path)));
    shown
}

fn run() -> PlanningResult<()> {
    let args: Vec<String> = env::args().collect();

    let (grid, start, goal) = match args.get(1) {
        Some(map_file) => {
            let grid = Grid::from_map_file(map_file)?;
            let (start, goal) = endpoints(&grid).ok_or_else(|| {
                PlanningError::InvalidConfiguration(format!("{} has fewer than two free cells", map_file))
            })?;
            (grid, start, goal)
        }
        None => wall_with_gap(),
    };
    let config = match args.get(2) {
        Some(config_file) => PlannerConfig::from_file(config_file)?,
        None => PlannerConfig::default(),
    };

    println!("grid {}x{}, start {}, goal {}", grid.height(), grid.width(), start, goal);
    fs::create_dir_all("img")?;

    let planners: Vec<Box<dyn GridPlanner>> = vec![
        Box::new(GridSearchPlanner::new(SearchMode::Bfs, config.grid_search.clone())?),
        Box::new(GridSearchPlanner::new(SearchMode::Dfs, config.grid_search.clone())?),
        Box::new(GridSearchPlanner::new(SearchMode::AStar, config.grid_search.clone())?),
        Box::new(RrtPlanner::new(config.rrt.clone())?),
        Box::new(RrtStarPlanner::new(config.rrt_star.clone())?),
    ];

    for planner in &planners {
        let started = Instant::now();
        let path = planner.find_path(start, goal, &grid);
        let elapsed = started.elapsed();
        let trace = planner.trace().snapshot();

        if path.is_empty() {
            println!("{:>5}: no path, {} trace entries ({:?})", planner.name(), trace.entries.len(), elapsed);
        } else {
            println!(
                "{:>5}: {} cells, length {:.2}, {} trace entries ({:?})",
                planner.name(),
                path.len(),
                path.length(),
                trace.entries.len(),
                elapsed
            );
            if grid.width() <= MAX_PRINT_WIDTH {
                print!("{}", overlay(&grid, start, goal, &path));
            }
        }

        let layers = GridLayers::new(&grid).with_trace(&trace).with_path(&path);
        let file = format!("img/grid_planning_{}.png", planner.name().to_lowercase().replace('*', "_star"));
        let mut vis = Visualizer::new();
        vis.set_title(planner.name()).draw(&layers);
        match vis.save_png(&file, 800, 800) {
            Ok(()) => println!("saved {}", file),
            Err(e) => eprintln!("could not save {}: {}", file, e),
        }
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
