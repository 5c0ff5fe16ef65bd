use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `mutex`, recovering the guard if a panicking thread poisoned it.
///
/// Every critical section in this crate leaves its data consistent, so a
/// poisoned lock still guards valid state.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Unbounded thread-safe FIFO of received text.
///
/// Filled by the reader thread, drained by any number of consumers. Never
/// blocks beyond the short critical section of a push or pop.
#[derive(Debug, Default)]
pub struct OutputQueue {
    items: Mutex<VecDeque<String>>,
}

impl OutputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: String) {
        lock(&self.items).push_back(item);
    }

    /// Append `items` keeping their order.
    pub fn extend(&self, items: impl IntoIterator<Item = String>) {
        lock(&self.items).extend(items);
    }

    /// Next item, or `None` when the queue is empty.
    pub fn try_pop(&self) -> Option<String> {
        lock(&self.items).pop_front()
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }
}
