//! Priority buffer — the ordered backlog owned by the relay coordinator.
//!
//! Items are kept in non-increasing priority order. Items of equal priority
//! keep their arrival order, so the head is always the oldest item of the
//! highest priority present.

use std::collections::VecDeque;

/// A value tagged with the priority it was submitted at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prioritized<T> {
    pub value: T,
    pub priority: i32,
}

impl<T> Prioritized<T> {
    pub fn new(value: T, priority: i32) -> Self {
        Self { value, priority }
    }
}

/// Ordered backlog of pending items.
///
/// Insertion is a linear scan. The backlog is expected to stay shallow
/// relative to throughput, and the common cases (new highest priority,
/// new lowest-or-equal priority) are O(1).
#[derive(Debug)]
pub struct PriorityBuffer<T> {
    items: VecDeque<Prioritized<T>>,
}

impl<T> PriorityBuffer<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Insert an item at its priority position.
    pub fn push(&mut self, item: Prioritized<T>) {
        let (head, tail) = match (self.items.front(), self.items.back()) {
            (Some(head), Some(tail)) => (head.priority, tail.priority),
            _ => {
                self.items.push_back(item);
                return;
            }
        };

        if item.priority > head {
            self.items.push_front(item);
        } else if item.priority <= tail {
            self.items.push_back(item);
        } else {
            // head >= item > tail, so a strictly lower element exists.
            let at = self
                .items
                .iter()
                .position(|queued| queued.priority < item.priority)
                .unwrap_or(self.items.len());
            self.items.insert(at, item);
        }
    }

    /// Put back an item that was just taken from the head.
    pub fn restore(&mut self, item: Prioritized<T>) {
        self.items.push_front(item);
    }

    /// Remove and return the head (highest priority, oldest first).
    pub fn pop(&mut self) -> Option<Prioritized<T>> {
        self.items.pop_front()
    }

    pub fn peek(&self) -> Option<&Prioritized<T>> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every buffered item, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.items.len();
        self.items.clear();
        discarded
    }
}

impl<T> Default for PriorityBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
