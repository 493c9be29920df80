//! Snapshot-based undo/redo.

use crate::config::DEFAULT_HISTORY_CAPACITY;
use std::collections::VecDeque;

/// Bounded undo/redo over whole-array snapshots.
///
/// Every entry is a full copy of the array taken before a commit, so undo
/// and redo simply swap arrays.
#[derive(Debug, Clone)]
pub struct History<T> {
    undo_stack: VecDeque<Vec<T>>,
    redo_stack: Vec<Vec<T>>,
    capacity: usize,
}

impl<T: Clone + PartialEq> Default for History<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl<T: Clone + PartialEq> History<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Apply `mutator` to `current` as one history entry.
    ///
    /// The mutator sees the current array and returns its replacement. If the
    /// replacement equals the current array nothing is recorded. On error the
    /// array is left untouched.
    pub fn commit<E>(
        &mut self,
        current: &mut Vec<T>,
        mutator: impl FnOnce(&[T]) -> Result<Vec<T>, E>,
    ) -> Result<bool, E> {
        let next = mutator(current)?;
        if next == *current {
            return Ok(false);
        }
        let before = std::mem::replace(current, next);
        self.push_undo(before);
        Ok(true)
    }

    /// Record a snapshot taken before a change that was applied in place,
    /// such as a drag. Nothing is recorded if `current` still equals it.
    pub fn record(&mut self, before: Vec<T>, current: &[T]) -> bool {
        if before.as_slice() == current {
            return false;
        }
        self.push_undo(before);
        true
    }

    fn push_undo(&mut self, snapshot: Vec<T>) {
        self.undo_stack.push_back(snapshot);
        self.redo_stack.clear();
        while self.undo_stack.len() > self.capacity {
            self.undo_stack.pop_front();
        }
    }

    /// Undo the last change.
    /// Returns true if undo was performed, false if nothing to undo.
    pub fn undo(&mut self, current: &mut Vec<T>) -> bool {
        let Some(snapshot) = self.undo_stack.pop_back() else {
            return false;
        };
        let replaced = std::mem::replace(current, snapshot);
        self.redo_stack.push(replaced);
        true
    }

    /// Redo the last undone change.
    /// Returns true if redo was performed, false if nothing to redo.
    pub fn redo(&mut self, current: &mut Vec<T>) -> bool {
        let Some(snapshot) = self.redo_stack.pop() else {
            return false;
        };
        let replaced = std::mem::replace(current, snapshot);
        self.undo_stack.push_back(replaced);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
