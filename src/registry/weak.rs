//! # Counted weak reference.
//!
//! [`WeakRef`] holds its target weakly while its count is zero and strongly while
//! the count is positive. Channels count their subscribers and stores into the
//! `WeakRef` of their registry entry: an active channel is kept alive by the
//! registry even if every caller dropped its handle, and a dormant one lives
//! exactly as long as someone else holds it.
//!
//! ```text
//! count:   0 ──inc──► 1 ──inc──► 2 ──dec──► 1 ──dec──► 0
//! holds:   weak       strong     strong     strong     weak
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Weak handle that can be temporarily upgraded by reference counting.
pub(crate) struct WeakRef<T> {
    target: Weak<T>,
    state: Mutex<Counted<T>>,
}

struct Counted<T> {
    count: usize,
    strong: Option<Arc<T>>,
}

impl<T> WeakRef<T> {
    pub(crate) fn new(target: Weak<T>) -> Self {
        Self {
            target,
            state: Mutex::new(Counted {
                count: 0,
                strong: None,
            }),
        }
    }

    /// Increments the count; the first increment pins the target.
    ///
    /// Returns the new count.
    pub(crate) fn inc_ref(&self) -> usize {
        let mut state = self.state.lock();
        state.count += 1;
        if state.count == 1 {
            state.strong = self.target.upgrade();
        }
        state.count
    }

    /// Decrements the count; reaching zero releases the pin.
    ///
    /// Returns the new count and the released strong handle. The caller drops the
    /// handle once it no longer holds any lock the target's `Drop` may take.
    pub(crate) fn dec_ref(&self) -> (usize, Option<Arc<T>>) {
        let mut state = self.state.lock();
        state.count = state.count.saturating_sub(1);
        let released = if state.count == 0 {
            state.strong.take()
        } else {
            None
        };
        (state.count, released)
    }

    /// Current count.
    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.state.lock().count
    }

    /// Upgrades the weak handle.
    #[inline]
    pub(crate) fn get(&self) -> Option<Arc<T>> {
        self.target.upgrade()
    }

    /// Returns `true` while the target has not been dropped.
    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }
}
