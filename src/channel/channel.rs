//! # Named publish/subscribe endpoint.
//!
//! A [`Channel`] is either **dormant** (nothing attached, no list or map
//! allocated) or **active** (at least one subscriber or store):
//!
//! ```text
//!             subscribe / bind_store
//!   Dormant ─────────────────────────► Active { subscribers, stores }
//!      ▲                                  │
//!      └──── last unsubscribe / unbind ───┘
//! ```
//!
//! ## Rules
//! - A dormant `publish` is one atomic load: no lock, no allocation.
//! - A dormant `run_stores` calls the function directly.
//! - Subscribers run in subscription order; stores nest in binding order.
//! - `publish` iterates a snapshot: subscribing or unsubscribing from inside a
//!   subscriber affects the next publish, not the one in flight.
//! - A panicking subscriber is caught; the remaining subscribers still run and the
//!   panic is reported out of band, never re-raised to the publisher.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::store::{self, Store, StoreBinding, Transform};
use crate::channel::subscriber::{Message, Subscriber};
use crate::config::Config;
use crate::error::Error;
use crate::name::ChannelName;
use crate::registry::index::Change;
use crate::registry::shared::Shared;
use crate::registry::table::{Anchor, Detached};

/// Attachments of an active channel.
#[derive(Clone, Default)]
struct Active {
    subscribers: Vec<Subscriber>,
    stores: Vec<StoreBinding>,
}

impl Active {
    #[inline]
    fn is_empty(&self) -> bool {
        self.subscribers.is_empty() && self.stores.is_empty()
    }
}

enum State {
    Dormant,
    /// Copy-on-write: `publish` clones the `Arc`, mutations go through `make_mut`.
    Active(Arc<Active>),
}

impl State {
    fn active_mut(&mut self) -> &mut Active {
        if matches!(self, State::Dormant) {
            *self = State::Active(Arc::default());
        }
        match self {
            State::Active(active) => Arc::make_mut(active),
            State::Dormant => unreachable!("state was just activated"),
        }
    }

    /// Goes dormant if nothing is attached anymore.
    ///
    /// The returned state must be dropped after the lock is released.
    fn retire_if_empty(&mut self) -> Option<State> {
        let empty = matches!(self, State::Active(active) if active.is_empty());
        empty.then(|| std::mem::replace(self, State::Dormant))
    }

    fn snapshot(&self) -> Option<Arc<Active>> {
        match self {
            State::Active(active) => Some(Arc::clone(active)),
            State::Dormant => None,
        }
    }
}

pub(crate) struct ChannelInner {
    name: ChannelName,
    /// Subscribers + stores; mirrors `State` for lock-free reads.
    refs: AtomicUsize,
    state: Mutex<State>,
    anchor: Arc<dyn Anchor>,
    shared: Arc<Shared>,
}

impl ChannelInner {
    pub(crate) fn new(name: ChannelName, anchor: Arc<dyn Anchor>, shared: Arc<Shared>) -> Self {
        tracing::debug!(channel = %name, "channel created");
        Self {
            name,
            refs: AtomicUsize::new(0),
            state: Mutex::new(State::Dormant),
            anchor,
            shared,
        }
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        self.anchor.forget();
    }
}

/// Named publish/subscribe endpoint.
///
/// Cheap to clone: every clone is a handle to the same channel.
///
/// ## Example
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use diagbus::{Channel, Subscriber};
///
/// let ch = Channel::new("cache.miss");
/// assert!(!ch.has_subscribers());
/// ch.publish(&"ignored"); // dormant: no-op
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let sub = Subscriber::new(move |msg, _| {
///     if let Some(key) = msg.downcast_ref::<&str>() {
///         sink.lock().unwrap().push(key.to_string());
///     }
/// });
///
/// ch.subscribe(&sub);
/// ch.publish(&"user:42");
/// assert_eq!(*seen.lock().unwrap(), vec!["user:42"]);
/// ```
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    /// Creates a standalone channel that is not registered in any registry.
    ///
    /// Subscriber panics are reported with the default [`Config`] reporter.
    /// Use [`Registry::channel`](crate::Registry::channel) for shared, named channels.
    pub fn new(name: impl Into<ChannelName>) -> Self {
        let shared = Shared::new(&Config::default());
        Self::from_inner(Arc::new(ChannelInner::new(
            name.into(),
            Arc::new(Detached),
            shared,
        )))
    }

    #[inline]
    pub(crate) fn from_inner(inner: Arc<ChannelInner>) -> Self {
        Self { inner }
    }

    /// Channel name.
    #[inline]
    pub fn name(&self) -> &ChannelName {
        &self.inner.name
    }

    /// Returns `true` while at least one subscriber or store is attached.
    #[inline]
    pub fn has_subscribers(&self) -> bool {
        self.inner.refs.load(AtomicOrdering::Acquire) > 0
    }

    /// Number of attached subscribers plus bound stores.
    #[inline]
    pub fn ref_count(&self) -> usize {
        self.inner.refs.load(AtomicOrdering::Acquire)
    }

    /// Returns `true` if both handles refer to the same channel.
    #[inline]
    pub fn same(&self, other: &Channel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Appends `subscriber`; the first attachment activates the channel.
    ///
    /// Subscribing the same handle twice delivers every message to it twice.
    pub fn subscribe(&self, subscriber: &Subscriber) {
        let mut state = self.inner.state.lock();
        let activated = matches!(*state, State::Dormant);
        state.active_mut().subscribers.push(subscriber.clone());
        self.attached(activated, "subscribe");
    }

    /// Removes the first occurrence of `subscriber`.
    ///
    /// Returns `false` if it was not subscribed (always `false` when dormant).
    pub fn unsubscribe(&self, subscriber: &Subscriber) -> bool {
        let mut state = self.inner.state.lock();
        let State::Active(active) = &mut *state else {
            return false;
        };
        let Some(pos) = active.subscribers.iter().position(|s| s.same(subscriber)) else {
            return false;
        };
        let removed = Arc::make_mut(active).subscribers.remove(pos);
        let retired = state.retire_if_empty();
        self.detached("unsubscribe");
        drop(state);
        drop((removed, retired));
        true
    }

    /// Binds `store` so that [`run_stores`](Self::run_stores) runs inside its scope.
    ///
    /// `transform` maps the published message to the value the store installs;
    /// `None` passes the message through. Binding an already bound store only
    /// replaces its transform: the reference count does not change.
    pub fn bind_store(&self, store: Arc<dyn Store>, transform: Option<Transform>) {
        let mut state = self.inner.state.lock();
        let activated = matches!(*state, State::Dormant);
        let active = state.active_mut();
        match active.stores.iter_mut().find(|b| b.is(&store)) {
            Some(binding) => {
                let previous = std::mem::replace(&mut binding.transform, transform);
                tracing::trace!(channel = %self.inner.name, store = store.name(), "store rebound");
                drop(state);
                drop(previous);
            }
            None => {
                active.stores.push(StoreBinding { store, transform });
                self.attached(activated, "bind_store");
            }
        }
    }

    /// Unbinds `store`. Returns `false` if it was not bound (always `false` when dormant).
    pub fn unbind_store<S: Store + ?Sized>(&self, store: &Arc<S>) -> bool {
        let mut state = self.inner.state.lock();
        let State::Active(active) = &mut *state else {
            return false;
        };
        let Some(pos) = active.stores.iter().position(|b| b.is(store)) else {
            return false;
        };
        let removed = Arc::make_mut(active).stores.remove(pos);
        let retired = state.retire_if_empty();
        self.detached("unbind_store");
        drop(state);
        drop((removed, retired));
        true
    }

    /// Delivers `data` to every subscriber, in subscription order.
    ///
    /// Panics raised by subscribers are caught and reported out of band.
    pub fn publish(&self, data: &Message) {
        if !self.has_subscribers() {
            return;
        }
        let Some(active) = self.inner.state.lock().snapshot() else {
            return;
        };
        self.deliver(&active.subscribers, data);
    }

    /// Publishes `data`, then runs `f` nested inside every bound store.
    ///
    /// On a dormant channel this is exactly `f()`.
    pub fn run_stores<R>(&self, data: &Message, f: impl FnOnce() -> R) -> R {
        if !self.has_subscribers() {
            return f();
        }
        let Some(active) = self.inner.state.lock().snapshot() else {
            return f();
        };
        self.deliver(&active.subscribers, data);
        store::run_scoped(&active.stores, data, f)
    }

    /// Reports a failure through the owning registry's reporter.
    pub(crate) fn report(&self, error: Error) {
        self.inner.shared.report(error);
    }

    fn deliver(&self, subscribers: &[Subscriber], data: &Message) {
        for sub in subscribers {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| sub.call(data, &self.inner.name)));
            if let Err(payload) = delivered {
                self.report(Error::subscriber_panicked(&self.inner.name, payload));
            }
        }
    }

    /// Counts one new attachment. Called with the state lock held.
    fn attached(&self, activated: bool, op: &'static str) {
        let count = self.inner.refs.fetch_add(1, AtomicOrdering::AcqRel) + 1;
        self.inner.anchor.inc_ref();
        self.inner.shared.index.record(&self.inner.name, Change::Attached);
        if activated {
            tracing::debug!(channel = %self.inner.name, "channel active");
        }
        tracing::trace!(channel = %self.inner.name, op, refs = count, "attached");
    }

    /// Counts one removed attachment. Called with the state lock held.
    fn detached(&self, op: &'static str) {
        let count = self.inner.refs.fetch_sub(1, AtomicOrdering::AcqRel) - 1;
        self.inner.anchor.dec_ref();
        self.inner.shared.index.record(&self.inner.name, Change::Detached);
        if count == 0 {
            tracing::debug!(channel = %self.inner.name, "channel dormant");
        }
        tracing::trace!(channel = %self.inner.name, op, refs = count, "detached");
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.inner.name)
            .field("refs", &self.ref_count())
            .finish()
    }
}
