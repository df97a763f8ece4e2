//! Bounded undo/redo stack of scene snapshots.

use std::collections::VecDeque;

use crate::template::ElementRecord;

pub const HISTORY_LIMIT: usize = 50;

type Snapshot = Vec<ElementRecord>;

#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_LIMIT)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record the state before an edit. Clears the redo stack; the oldest
    /// snapshot is dropped once the limit is reached.
    pub fn record(&mut self, snapshot: Snapshot) {
        if self.undo.back() == Some(&snapshot) {
            return;
        }
        if self.undo.len() == self.limit {
            self.undo.pop_front();
        }
        self.undo.push_back(snapshot);
        self.redo.clear();
    }

    /// Step back from `current`, returning the state to restore.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Step forward from `current`, returning the state to restore.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(text: &str) -> Snapshot {
        vec![ElementRecord {
            kind: "text".into(),
            text: Some(text.into()),
            ..Default::default()
        }]
    }

    #[test]
    fn test_undo_redo() {
        let mut h = History::default();
        h.record(snap("a"));
        h.record(snap("b"));
        assert_eq!(h.undo(snap("c")), Some(snap("b")));
        assert_eq!(h.undo(snap("b")), Some(snap("a")));
        assert_eq!(h.undo(snap("a")), None);
        assert_eq!(h.redo(snap("a")), Some(snap("b")));
        assert!(h.can_redo());
    }

    #[test]
    fn test_record_clears_redo() {
        let mut h = History::default();
        h.record(snap("a"));
        h.undo(snap("b"));
        assert!(h.can_redo());
        h.record(snap("c"));
        assert!(!h.can_redo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut h = History::new(3);
        for t in ["1", "2", "3", "4"] {
            h.record(snap(t));
        }
        assert_eq!(h.len(), 3);
        h.undo(snap("5"));
        h.undo(snap("4"));
        assert_eq!(h.undo(snap("3")), Some(snap("2")));
        assert_eq!(h.undo(snap("2")), None);
    }

    #[test]
    fn test_identical_snapshots_collapse() {
        let mut h = History::default();
        h.record(snap("a"));
        h.record(snap("a"));
        assert_eq!(h.len(), 1);
    }
}
