//! Fixed-capacity record queue.
//!
//! Used twice on the device: once for inbound [`Command`]s and once for
//! outbound [`ResultRecord`]s.  Overflow is a soft condition: the oldest
//! record is evicted, the new one is still stored, and `put` reports
//! `false`.
//!
//! Filtered retrieval removes matches with a stable two-pass rebuild, so
//! the queue is never mutated while it is being scanned.
//!
//! The queue is not synchronised; see [`ResultSink`] for the shared
//! result-queue handle.
//!
//! [`Command`]: super::record::Command
//! [`ResultRecord`]: super::record::ResultRecord
//! [`ResultSink`]: crate::app::results::ResultSink

use heapless::Deque;
use log::debug;

use super::record::Tagged;
use crate::config::QUEUE_CAPACITY;

/// FIFO queue holding at most `N` records (`N > 0`).
#[derive(Debug, Clone)]
pub struct BoundedQueue<T, const N: usize = QUEUE_CAPACITY> {
    items: Deque<T, N>,
}

impl<T: Tagged + Clone, const N: usize> Default for BoundedQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tagged + Clone, const N: usize> BoundedQueue<T, N> {
    pub const fn new() -> Self {
        Self {
            items: Deque::new(),
        }
    }

    /// Append a record, evicting the oldest one if the queue is full.
    ///
    /// Returns `false` when an eviction happened.
    pub fn put(&mut self, record: T) -> bool {
        let mut accepted = true;
        if self.items.is_full() {
            if let Some(evicted) = self.items.pop_front() {
                debug!("queue full, evicted oldest '{}'", evicted.method());
            }
            accepted = false;
        }
        // A slot was freed above, so this cannot fail.
        let _ = self.items.push_back(record);
        accepted
    }

    /// Remove and return records.
    ///
    /// * `method == None`: the oldest record, or everything when `all`.
    /// * `method == Some(m)`: records tagged `m` or the diagnostic tag, in
    ///   queue order; stops after the first unless `all`.
    pub fn get(&mut self, method: Option<&str>, all: bool) -> Vec<T> {
        match method {
            None if all => {
                let mut out = Vec::with_capacity(self.items.len());
                while let Some(item) = self.items.pop_front() {
                    out.push(item);
                }
                out
            }
            None => self.items.pop_front().into_iter().collect(),
            Some(m) => self.take_where(|r| r.method() == m || r.is_diagnostic(), all),
        }
    }

    /// Same selection as [`get`](Self::get), without removal.
    pub fn peek(&self, method: Option<&str>, all: bool) -> Vec<T> {
        match method {
            None if all => self.items.iter().cloned().collect(),
            None => self.items.front().cloned().into_iter().collect(),
            Some(m) => {
                let matches = self
                    .items
                    .iter()
                    .filter(|r| r.method() == m || r.is_diagnostic())
                    .cloned();
                if all {
                    matches.collect()
                } else {
                    matches.take(1).collect()
                }
            }
        }
    }

    /// Replace the first record with the same method, or append `record`.
    ///
    /// Returns `false` only if appending evicted a record.
    pub fn update(&mut self, record: T) -> bool {
        if let Some(slot) = self
            .items
            .iter_mut()
            .find(|r| r.method() == record.method())
        {
            *slot = record;
            return true;
        }
        self.put(record)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn take_where(&mut self, matches: impl Fn(&T) -> bool, all: bool) -> Vec<T> {
        let mut taken = Vec::new();
        let mut kept: Deque<T, N> = Deque::new();
        while let Some(item) = self.items.pop_front() {
            if (all || taken.is_empty()) && matches(&item) {
                taken.push(item);
            } else {
                // `kept` never holds more than the queue did.
                let _ = kept.push_back(item);
            }
        }
        self.items = kept;
        taken
    }
}
