//! Expansion / tree trace shared with a renderer
//!
//! The planner appends while it runs; a renderer on another thread may poll
//! [`PlanningTrace::snapshot`]. The lock is taken for a single append,
//! replace or read and is never held across a planning step.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{Cell, CellState, Path};

/// One expansion or tree edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEntry {
    pub cell: Cell,
    pub predecessor: Option<Cell>,
    pub state: CellState,
}

impl TraceEntry {
    pub fn new(cell: Cell, predecessor: Option<Cell>, state: CellState) -> Self {
        Self { cell, predecessor, state }
    }
}

/// Point-in-time copy of the trace
#[derive(Debug, Clone, Default)]
pub struct TraceView {
    pub entries: Vec<TraceEntry>,
    pub best_goal: Option<TraceEntry>,
}

/// Tree and path captured when the best goal cost dropped
#[derive(Debug, Clone)]
pub struct TraceSnapshot {
    pub iteration: usize,
    pub cost: f64,
    pub edges: Vec<TraceEntry>,
    pub path: Path,
}

#[derive(Debug, Default)]
struct TraceState {
    entries: Vec<TraceEntry>,
    best_goal: Option<TraceEntry>,
    improvements: Vec<TraceSnapshot>,
}

#[derive(Debug, Default)]
pub struct PlanningTrace {
    state: Mutex<TraceState>,
}

impl PlanningTrace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drop everything recorded by a previous planning call
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.best_goal = None;
        state.improvements.clear();
    }

    pub fn record(&self, entry: TraceEntry) {
        self.state.lock().entries.push(entry);
    }

    /// Swap in a rebuilt entry list, e.g. after a tree was rewired
    pub fn replace_entries(&self, entries: Vec<TraceEntry>) {
        self.state.lock().entries = entries;
    }

    pub fn set_best_goal(&self, entry: Option<TraceEntry>) {
        self.state.lock().best_goal = entry;
    }

    /// Remove the edges of a goal record that has been superseded. The
    /// bare goal marker (no predecessor) stays.
    pub fn retire_goal_entries(&self, goal: Cell) {
        self.state
            .lock()
            .entries
            .retain(|e| !(e.state == CellState::Goal && e.cell == goal && e.predecessor.is_some()));
    }

    pub fn push_improvement(&self, snapshot: TraceSnapshot) {
        self.state.lock().improvements.push(snapshot);
    }

    pub fn snapshot(&self) -> TraceView {
        let state = self.state.lock();
        TraceView { entries: state.entries.clone(), best_goal: state.best_goal }
    }

    pub fn improvements(&self) -> Vec<TraceSnapshot> {
        self.state.lock().improvements.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_retire_goal_entries() {
        let trace = PlanningTrace::new();
        let goal = Cell::new(4, 4);
        trace.record(TraceEntry::new(goal, None, CellState::Goal));
        trace.record(TraceEntry::new(Cell::new(1, 1), Some(Cell::new(0, 0)), CellState::Visited));
        trace.record(TraceEntry::new(goal, Some(Cell::new(1, 1)), CellState::Goal));
        trace.retire_goal_entries(goal);

        let view = trace.snapshot();
        assert_eq!(view.entries.len(), 2);
        assert_eq!(view.entries[0].predecessor, None);
        assert_eq!(view.entries[1].cell, Cell::new(1, 1));
    }

    #[test]
    fn test_concurrent_reader_sees_whole_entries() {
        let trace = PlanningTrace::new();
        let reader = {
            let trace = Arc::clone(&trace);
            thread::spawn(move || {
                let mut last = 0;
                for _ in 0..200 {
                    let n = trace.snapshot().entries.len();
                    assert!(n >= last);
                    last = n;
                }
            })
        };

        for i in 0..500 {
            trace.record(TraceEntry::new(Cell::new(i, 0), None, CellState::Visited));
        }
        reader.join().unwrap();
        assert_eq!(trace.len(), 500);
    }
}
