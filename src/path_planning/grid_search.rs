//! Grid search: one expansion loop, three frontier disciplines
//!
//! - BFS: FIFO frontier, cells marked Visited as they are enqueued
//! - DFS: LIFO frontier, cells marked Visited when popped; the same cell may
//!   sit on the frontier several times and stale copies are skipped on pop
//! - A*: min-f frontier with f = (1 - w) * g + w * h, Visited on pop, and a
//!   best-g table so a cell is only re-pushed when its cost improves
//!
//! Every move costs 1 regardless of direction.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;

use log::{debug, trace, warn};
use ordered_float::OrderedFloat;

use crate::common::{
    Cell, CellState, Cost, GridPlanner, GridSearchConfig, Path, PlanningError, PlanningResult,
    SearchRecord,
};
use crate::utils::{Grid, PlanningTrace, TraceEntry};

/// Relative offsets checked around every expanded cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpace {
    offsets: Vec<Cell>,
}

impl SearchSpace {
    pub fn four() -> Self {
        Self {
            offsets: vec![Cell::new(0, 1), Cell::new(1, 0), Cell::new(0, -1), Cell::new(-1, 0)],
        }
    }

    pub fn eight() -> Self {
        let mut space = Self::four();
        space.offsets.extend([
            Cell::new(1, 1),
            Cell::new(1, -1),
            Cell::new(-1, -1),
            Cell::new(-1, 1),
        ]);
        space
    }

    pub fn from_connectivity(connectivity: u8) -> PlanningResult<Self> {
        match connectivity {
            4 => Ok(Self::four()),
            8 => Ok(Self::eight()),
            other => Err(PlanningError::invalid(format!(
                "connectivity must be 4 or 8, got {}",
                other
            ))),
        }
    }

    pub fn offsets(&self) -> &[Cell] {
        &self.offsets
    }

    pub fn connectivity(&self) -> usize {
        self.offsets.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Bfs,
    Dfs,
    AStar,
}

/// Result of one search, including the working grid with visited cells and
/// the path overlay
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub path: Path,
    pub working_grid: Grid,
    pub expansions: usize,
}

enum Frontier {
    Fifo(VecDeque<usize>),
    Lifo(Vec<usize>),
    /// Ties on f pop in insertion order
    Priority {
        heap: BinaryHeap<Reverse<(OrderedFloat<f64>, u64, usize)>>,
        inserted: u64,
    },
}

impl Frontier {
    fn for_mode(mode: SearchMode) -> Self {
        match mode {
            SearchMode::Bfs => Frontier::Fifo(VecDeque::new()),
            SearchMode::Dfs => Frontier::Lifo(Vec::new()),
            SearchMode::AStar => Frontier::Priority { heap: BinaryHeap::new(), inserted: 0 },
        }
    }

    fn push(&mut self, index: usize, f: f64) {
        match self {
            Frontier::Fifo(queue) => queue.push_back(index),
            Frontier::Lifo(stack) => stack.push(index),
            Frontier::Priority { heap, inserted } => {
                heap.push(Reverse((OrderedFloat(f), *inserted, index)));
                *inserted += 1;
            }
        }
    }

    fn pop(&mut self) -> Option<usize> {
        match self {
            Frontier::Fifo(queue) => queue.pop_front(),
            Frontier::Lifo(stack) => stack.pop(),
            Frontier::Priority { heap, .. } => heap.pop().map(|Reverse((_, _, index))| index),
        }
    }
}

/// BFS / DFS / A* on an occupancy grid
pub struct GridSearchPlanner {
    mode: SearchMode,
    config: GridSearchConfig,
    search_space: SearchSpace,
    trace: Arc<PlanningTrace>,
}

impl GridSearchPlanner {
    pub fn new(mode: SearchMode, config: GridSearchConfig) -> PlanningResult<Self> {
        config.validate()?;
        let search_space = SearchSpace::from_connectivity(config.connectivity)?;

        Ok(GridSearchPlanner {
            mode,
            config,
            search_space,
            trace: PlanningTrace::new(),
        })
    }

    pub fn bfs(connectivity: u8) -> PlanningResult<Self> {
        Self::new(SearchMode::Bfs, GridSearchConfig { connectivity, ..Default::default() })
    }

    pub fn dfs(connectivity: u8) -> PlanningResult<Self> {
        Self::new(SearchMode::Dfs, GridSearchConfig { connectivity, ..Default::default() })
    }

    pub fn a_star(heuristic_weight: f64, connectivity: u8) -> PlanningResult<Self> {
        Self::new(
            SearchMode::AStar,
            GridSearchConfig { connectivity, heuristic_weight, ..Default::default() },
        )
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn config(&self) -> &GridSearchConfig {
        &self.config
    }

    pub fn search_space(&self) -> &SearchSpace {
        &self.search_space
    }

    fn cost_for(&self, g: f64, cell: Cell, goal: Cell) -> Cost {
        match self.mode {
            SearchMode::AStar => Cost::weighted(
                g,
                self.config.heuristic().estimate(cell, goal),
                self.config.heuristic_weight,
            ),
            SearchMode::Bfs | SearchMode::Dfs => Cost::new(g, 0.0),
        }
    }

    /// Run the search and keep the working grid.
    ///
    /// # Panics
    /// Panics if `start` or `goal` lies outside `grid`.
    pub fn search(&self, start: Cell, goal: Cell, grid: &Grid) -> SearchOutcome {
        assert!(grid.in_bounds(start), "start {} outside grid", start);
        assert!(grid.in_bounds(goal), "goal {} outside grid", goal);

        self.trace.clear();
        let mut working = grid.clone();

        if !grid.is_free(start) || !grid.is_free(goal) {
            warn!("{}: start {} or goal {} is not traversable", self.name(), start, goal);
            return SearchOutcome { path: Path::new(), working_grid: working, expansions: 0 };
        }

        working.set_state(start, CellState::Start);
        working.set_state(goal, CellState::Goal);
        self.trace.record(TraceEntry::new(start, None, CellState::Start));
        self.trace.record(TraceEntry::new(goal, None, CellState::Goal));

        debug!(
            "{}: searching {} -> {} on {}x{} grid, {}-connected",
            self.name(),
            start,
            goal,
            grid.height(),
            grid.width(),
            self.search_space.connectivity()
        );

        let mut records = vec![SearchRecord::root(start, self.cost_for(0.0, start, goal))];
        let mut frontier = Frontier::for_mode(self.mode);
        let mut best_g: HashMap<Cell, f64> = HashMap::new();

        frontier.push(0, records[0].cost.f);
        best_g.insert(start, 0.0);
        if self.mode == SearchMode::Bfs {
            working.set_state(start, CellState::Visited);
        }

        let mut expansions = 0;
        let mut terminal = None;

        while let Some(index) = frontier.pop() {
            let cell = records[index].cell;

            if cell == goal {
                terminal = Some(index);
                break;
            }

            if self.mode != SearchMode::Bfs {
                if working.state(cell) == CellState::Visited {
                    continue;
                }
                working.set_state(cell, CellState::Visited);
            }

            expansions += 1;
            let predecessor = records[index].parent.map(|p| records[p].cell);
            self.trace.record(TraceEntry::new(cell, predecessor, CellState::Visited));
            trace!("{}: expand {} g={}", self.name(), cell, records[index].cost.g);

            for &offset in self.search_space.offsets() {
                let neighbor = cell + offset;
                if !working.is_free(neighbor) {
                    continue;
                }

                let g = records[index].cost.g + 1.0;
                if self.mode == SearchMode::AStar {
                    if best_g.get(&neighbor).map_or(false, |&best| best <= g) {
                        continue;
                    }
                    best_g.insert(neighbor, g);
                }

                let child = SearchRecord::child(neighbor, index, self.cost_for(g, neighbor, goal));
                frontier.push(records.len(), child.cost.f);
                records.push(child);

                if self.mode == SearchMode::Bfs {
                    working.set_state(neighbor, CellState::Visited);
                }
            }
        }

        working.set_state(start, CellState::Start);
        working.set_state(goal, CellState::Goal);

        let path = match terminal {
            Some(index) => {
                let path = Path::from_records(&records, index);
                working.mark_path(&path);
                debug!(
                    "{}: found path of {} cells after {} expansions",
                    self.name(),
                    path.len(),
                    expansions
                );
                path
            }
            None => {
                debug!("{}: frontier exhausted after {} expansions, no path", self.name(), expansions);
                Path::new()
            }
        };

        SearchOutcome { path, working_grid: working, expansions }
    }
}

impl GridPlanner for GridSearchPlanner {
    fn find_path(&self, start: Cell, goal: Cell, grid: &Grid) -> Path {
        self.search(start, goal, grid).path
    }

    fn name(&self) -> &'static str {
        match self.mode {
            SearchMode::Bfs => "BFS",
            SearchMode::Dfs => "DFS",
            SearchMode::AStar => "A*",
        }
    }

    fn trace(&self) -> Arc<PlanningTrace> {
        Arc::clone(&self.trace)
    }
}
