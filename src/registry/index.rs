//! # Channel index table.
//!
//! Native hot paths cannot afford a name lookup to decide whether a channel has
//! subscribers. [`Registry::channel_index`](crate::Registry::channel_index) assigns
//! a channel name a small, stable integer; the table then keeps the total
//! reference count of every channel carrying that name in a fixed array of atomics:
//!
//! ```text
//! names:   "http.request" → 0, "db.query" → 1, ...
//! counts:  [ 2 | 0 | ... ]          (AtomicUsize, capacity fixed at first use)
//! pending: "cache.miss" → 1, ...    (totals of active names without a slot yet)
//! ```
//!
//! ## Rules
//! - Indices are never reused, even after the channel is collected.
//! - A slot sums every channel of its name: plain channels, tracing sub-channels,
//!   and evicted channels a caller still holds.
//! - Each attach/detach moves the total by one; a new slot starts from the
//!   pending total of its name.
//! - Reading a slot is a single atomic load.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::error::Error;
use crate::name::ChannelName;

/// Stable slot number assigned to a channel name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelIndex(u32);

impl ChannelIndex {
    /// Returns the raw slot number.
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Direction of a reference count change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Change {
    Attached,
    Detached,
}

#[derive(Default)]
struct Names {
    slots: HashMap<ChannelName, ChannelIndex>,
    /// Non-zero totals of names that have no slot.
    pending: HashMap<ChannelName, usize>,
}

/// Fixed-capacity name → counter table.
pub(crate) struct IndexTable {
    capacity: usize,
    counts: OnceLock<Box<[AtomicUsize]>>,
    names: RwLock<Names>,
}

impl IndexTable {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            counts: OnceLock::new(),
            names: RwLock::new(Names::default()),
        }
    }

    fn counts(&self) -> &[AtomicUsize] {
        self.counts
            .get_or_init(|| (0..self.capacity).map(|_| AtomicUsize::new(0)).collect())
    }

    /// Returns the index of `name`, assigning the next slot on first use.
    ///
    /// A new slot starts from the current total of every channel named `name`.
    pub(crate) fn get_or_assign(&self, name: ChannelName) -> Result<ChannelIndex, Error> {
        if let Some(idx) = self.names.read().slots.get(&name) {
            return Ok(*idx);
        }

        let mut names = self.names.write();
        if let Some(idx) = names.slots.get(&name) {
            return Ok(*idx);
        }
        let next = names.slots.len();
        if next >= self.capacity {
            return Err(Error::IndexExhausted {
                limit: self.capacity,
            });
        }
        let idx = ChannelIndex(next as u32);
        let seed = names.pending.remove(&name).unwrap_or(0);
        self.counts()[next].store(seed, AtomicOrdering::Release);
        names.slots.insert(name, idx);
        Ok(idx)
    }

    /// Moves the total of `name` by one attachment.
    ///
    /// Called by every channel of a registry, with its state lock held.
    pub(crate) fn record(&self, name: &ChannelName, change: Change) {
        {
            let names = self.names.read();
            if let Some(idx) = names.slots.get(name) {
                self.adjust(*idx, change);
                return;
            }
        }

        let mut names = self.names.write();
        if let Some(idx) = names.slots.get(name) {
            self.adjust(*idx, change);
            return;
        }
        match change {
            Change::Attached => *names.pending.entry(name.clone()).or_insert(0) += 1,
            Change::Detached => {
                if let Some(total) = names.pending.get_mut(name) {
                    *total -= 1;
                    if *total == 0 {
                        names.pending.remove(name);
                    }
                }
            }
        }
    }

    fn adjust(&self, idx: ChannelIndex, change: Change) {
        let slot = &self.counts()[idx.0 as usize];
        match change {
            Change::Attached => slot.fetch_add(1, AtomicOrdering::AcqRel),
            Change::Detached => slot.fetch_sub(1, AtomicOrdering::AcqRel),
        };
    }

    /// Reads the total of a slot (0 for slots never assigned).
    #[inline]
    pub(crate) fn count_at(&self, idx: ChannelIndex) -> usize {
        self.counts
            .get()
            .and_then(|counts| counts.get(idx.0 as usize))
            .map_or(0, |c| c.load(AtomicOrdering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_stable_and_sequential() {
        let table = IndexTable::new(4);
        let a = table.get_or_assign("a".into()).unwrap();
        let b = table.get_or_assign("b".into()).unwrap();
        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 1);
        table.record(&"a".into(), Change::Attached);
        assert_eq!(table.get_or_assign("a".into()).unwrap(), a);
        assert_eq!(table.count_at(a), 1, "existing slot is not re-initialised");
    }

    #[test]
    fn test_exhausted_after_capacity() {
        let table = IndexTable::new(1);
        table.get_or_assign("a".into()).unwrap();
        let err = table.get_or_assign("b".into()).unwrap_err();
        assert!(matches!(err, Error::IndexExhausted { limit: 1 }));
    }

    #[test]
    fn test_new_slot_starts_from_pending_total() {
        let table = IndexTable::new(2);
        table.record(&"a".into(), Change::Attached);
        table.record(&"a".into(), Change::Attached);
        table.record(&"a".into(), Change::Attached);
        table.record(&"a".into(), Change::Detached);
        let a = table.get_or_assign("a".into()).unwrap();
        assert_eq!(table.count_at(a), 2);

        table.record(&"a".into(), Change::Detached);
        table.record(&"b".into(), Change::Attached);
        assert_eq!(table.count_at(a), 1);
        assert_eq!(table.count_at(ChannelIndex(1)), 0);
    }

    #[test]
    fn test_settled_names_leave_nothing_pending() {
        let table = IndexTable::new(2);
        table.record(&"a".into(), Change::Attached);
        table.record(&"a".into(), Change::Detached);
        assert!(table.names.read().pending.is_empty());

        let a = table.get_or_assign("a".into()).unwrap();
        assert_eq!(table.count_at(a), 0);
    }
}
