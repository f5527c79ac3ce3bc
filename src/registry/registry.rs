//! # Channel registry.
//!
//! [`Registry`] maps names to channels and tracing channels. It never owns an idle
//! channel: an entry is held weakly while its channel is dormant and strongly
//! while it has subscribers or stores.
//!
//! ```text
//! Registry
//!   ├─ channels: Table<ChannelInner>     name → Entry{ WeakRef<ChannelInner> }
//!   ├─ tracing:  Table<TracingInner>     name → Entry{ WeakRef<TracingInner> }
//!   └─ shared:   Shared { reporter, index }  ◄── every channel it creates
//! ```
//!
//! ## Rules
//! - `channel(name)` returns the registered channel while it is alive, else a new one.
//! - `has_subscribers(name)` is a map read: no upgrade, no allocation.
//! - An entry is removed as soon as its reference count reaches zero.

use std::fmt;
use std::sync::Arc;

use crate::channel::{Channel, ChannelInner, Subscriber};
use crate::config::Config;
use crate::error::Error;
use crate::name::{ChannelName, NameRef};
use crate::registry::index::ChannelIndex;
use crate::registry::shared::Shared;
use crate::registry::table::Table;
use crate::trace::{TracingChannel, TracingInner};

/// Registry of named channels and tracing channels.
///
/// Most code uses the process-wide registry through [`channel`](crate::channel) and
/// friends; a private registry is useful for tests and embedded hosts.
///
/// ## Example
/// ```rust
/// use diagbus::{Registry, Subscriber};
///
/// let registry = Registry::new();
/// let ch = registry.channel("db.query");
/// assert!(!registry.has_subscribers("db.query"));
///
/// let sub = Subscriber::new(|_, _| {});
/// registry.subscribe("db.query", &sub);
/// assert!(registry.has_subscribers("db.query"));
/// assert!(registry.channel("db.query").same(&ch));
///
/// assert!(registry.unsubscribe("db.query", &sub));
/// assert!(!registry.has_subscribers("db.query"));
/// ```
pub struct Registry {
    shared: Arc<Shared>,
    channels: Arc<Table<ChannelInner>>,
    tracing: Arc<Table<TracingInner>>,
}

impl Registry {
    /// Creates a registry with [`Config::default`].
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a registry with the given configuration.
    pub fn with_config(config: Config) -> Self {
        tracing::debug!(
            reporter = config.reporter.name(),
            index_capacity = config.index_capacity_clamped(),
            "registry created"
        );
        Self {
            shared: Shared::new(&config),
            channels: Table::new(),
            tracing: Table::new(),
        }
    }

    /// Returns the channel named `name`, creating a dormant one if none is alive.
    pub fn channel(&self, name: impl Into<ChannelName>) -> Channel {
        let shared = &self.shared;
        let inner = self.channels.get_or_create(name.into(), |name, anchor| {
            ChannelInner::new(name, anchor, Arc::clone(shared))
        });
        Channel::from_inner(inner)
    }

    /// Returns `true` if the channel registered under `name` has subscribers or stores.
    ///
    /// Only the registered channel is consulted: an evicted channel that a caller
    /// still holds, and that could not re-register because another channel took
    /// its name, is not seen here. [`channel_index`](Self::channel_index) counts both.
    #[inline]
    pub fn has_subscribers<'a>(&self, name: impl Into<NameRef<'a>>) -> bool {
        self.channels.count(name.into()) > 0
    }

    /// Subscribes to the channel named `name`, creating it if needed.
    pub fn subscribe(&self, name: impl Into<ChannelName>, subscriber: &Subscriber) {
        self.channel(name).subscribe(subscriber);
    }

    /// Unsubscribes from the channel registered under `name`.
    ///
    /// Returns `false` if no live channel has that name or `subscriber` was not on it.
    ///
    /// A channel evicted at zero references and then reactivated through a held
    /// handle only re-registers if the name is free. While another channel owns
    /// the name, this method reaches that other channel; remove subscribers from
    /// the held channel through the handle itself.
    pub fn unsubscribe<'a>(&self, name: impl Into<NameRef<'a>>, subscriber: &Subscriber) -> bool {
        match self.channels.get(name.into()) {
            Some(inner) => Channel::from_inner(inner).unsubscribe(subscriber),
            None => false,
        }
    }

    /// Returns the tracing channel named `name`, creating one if none is alive.
    ///
    /// Its four sub-channels are created with it and are not registered as plain
    /// channels.
    pub fn tracing_channel(&self, name: impl Into<ChannelName>) -> TracingChannel {
        let shared = &self.shared;
        let inner = self.tracing.get_or_create(name.into(), |name, anchor| {
            TracingInner::new(name, anchor, Arc::clone(shared))
        });
        TracingChannel::from_inner(inner)
    }

    /// Returns the index slot holding the total reference count of every channel
    /// named `name`.
    ///
    /// The total covers plain channels, tracing sub-channels and evicted channels
    /// that are still held. The first call for a name assigns the next free slot
    /// and starts it from the current total.
    ///
    /// # Errors
    /// [`Error::IndexExhausted`] once every slot is assigned.
    pub fn channel_index(&self, name: impl Into<ChannelName>) -> Result<ChannelIndex, Error> {
        let name = name.into();
        let idx = self.shared.index.get_or_assign(name.clone())?;
        tracing::trace!(channel = %name, index = idx.get(), "channel index");
        Ok(idx)
    }

    /// Returns `true` if the channels behind `index` have subscribers or stores.
    #[inline]
    pub fn has_subscribers_at(&self, index: ChannelIndex) -> bool {
        self.shared.index.count_at(index) > 0
    }

    /// Total reference count held in `index`.
    #[inline]
    pub fn subscriber_count_at(&self, index: ChannelIndex) -> usize {
        self.shared.index.count_at(index)
    }

    /// Number of registered channels that are still alive.
    pub fn live_channels(&self) -> usize {
        self.channels.live()
    }

    /// Number of registered tracing channels that are still alive.
    pub fn live_tracing_channels(&self) -> usize {
        self.tracing.live()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("live_channels", &self.live_channels())
            .field("live_tracing_channels", &self.live_tracing_channels())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Store;
    use crate::name::Symbol;
    use crate::report::Report;
    use crate::trace::TraceHandlers;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Error>>);

    impl Report for Collect {
        fn report(&self, error: Error) {
            self.0.lock().push(error);
        }
    }

    fn registry() -> Registry {
        Registry::with_config(Config::default().with_reporter(Arc::new(Collect::default())))
    }

    struct Nop;

    impl Store for Nop {
        fn run(&self, _value: &crate::channel::Message, scope: &mut dyn FnMut()) {
            scope()
        }
    }

    #[test]
    fn test_unknown_name_has_no_subscribers() {
        let registry = registry();
        assert!(!registry.has_subscribers("never.requested"));
        let ch = registry.channel("never.requested");
        assert!(!ch.has_subscribers());
        ch.publish(&());
    }

    #[test]
    fn test_same_channel_while_held() {
        let registry = registry();
        let a = registry.channel("x");
        let b = registry.channel(String::from("x"));
        assert!(a.same(&b));
        assert_eq!(registry.live_channels(), 1);
    }

    #[test]
    fn test_unreferenced_dormant_channel_is_dropped() {
        let registry = registry();
        let ch = registry.channel("x");
        drop(ch);
        assert_eq!(registry.live_channels(), 0);
    }

    #[test]
    fn test_active_channel_is_kept_alive_by_registry() {
        let registry = registry();
        let sub = Subscriber::new(|_, _| {});
        let first = registry.channel("x");
        first.subscribe(&sub);
        drop(first);

        assert_eq!(registry.live_channels(), 1);
        assert!(registry.has_subscribers("x"));

        let again = registry.channel("x");
        assert_eq!(again.ref_count(), 1);
        assert!(again.unsubscribe(&sub));
        assert!(!registry.has_subscribers("x"));
        drop(again);
        assert_eq!(registry.live_channels(), 0);
    }

    #[test]
    fn test_zero_count_evicts_even_when_held() {
        let registry = registry();
        let sub = Subscriber::new(|_, _| {});
        let held = registry.channel("x");
        held.subscribe(&sub);
        held.unsubscribe(&sub);

        let fresh = registry.channel("x");
        assert!(!fresh.same(&held), "dormant channel was deregistered eagerly");
    }

    #[test]
    fn test_held_channel_reregisters_when_name_is_free() {
        let registry = registry();
        let sub = Subscriber::new(|_, _| {});
        let held = registry.channel("x");
        held.subscribe(&sub);
        held.unsubscribe(&sub);

        held.subscribe(&sub);
        assert!(registry.channel("x").same(&held));
        assert!(registry.has_subscribers("x"));
        held.unsubscribe(&sub);
    }

    #[test]
    fn test_name_lookups_reach_registered_channel_only() {
        let registry = registry();
        let sub = Subscriber::new(|_, _| {});
        let held = registry.channel("x");
        held.subscribe(&sub);
        held.unsubscribe(&sub);

        let owner = registry.channel("x");
        owner.subscribe(&Subscriber::new(|_, _| {}));
        held.subscribe(&sub);
        assert!(registry.channel("x").same(&owner), "name stays with the live owner");

        assert!(!registry.unsubscribe("x", &sub), "held channel is not reachable by name");
        assert_eq!(held.ref_count(), 1);
        assert!(held.unsubscribe(&sub));
        assert!(registry.has_subscribers("x"));
    }

    #[test]
    fn test_subscribe_and_unsubscribe_by_name() {
        let registry = registry();
        let sub = Subscriber::new(|_, _| {});
        assert!(!registry.unsubscribe("x", &sub));

        registry.subscribe("x", &sub);
        assert!(registry.has_subscribers("x"));
        assert!(registry.unsubscribe("x", &sub));
        assert!(!registry.unsubscribe("x", &sub));
        assert_eq!(registry.live_channels(), 0);
    }

    #[test]
    fn test_symbol_names_do_not_collide_with_strings() {
        let registry = registry();
        let sym = Symbol::new("x");
        let by_symbol = registry.channel(&sym);
        let by_str = registry.channel("x");
        assert!(!by_symbol.same(&by_str));

        let sub = Subscriber::new(|_, _| {});
        by_symbol.subscribe(&sub);
        assert!(registry.has_subscribers(&sym));
        assert!(!registry.has_subscribers("x"));
        by_symbol.unsubscribe(&sub);
    }

    #[test]
    fn test_store_keeps_channel_registered() {
        let registry = registry();
        let store = Arc::new(Nop);
        registry.channel("x").bind_store(store.clone(), None);
        assert!(registry.has_subscribers("x"));
        assert!(registry.channel("x").unbind_store(&store));
        assert!(!registry.has_subscribers("x"));
    }

    #[test]
    fn test_subscriber_panic_reaches_reporter() {
        let reporter = Arc::new(Collect::default());
        let registry = Registry::with_config(Config::default().with_reporter(reporter.clone()));
        let ch = registry.channel("x");
        ch.subscribe(&Subscriber::new(|_, _| panic!("listener bug")));

        ch.publish(&());

        let mut reported = Vec::new();
        for _ in 0..500 {
            reported = reporter.0.lock().clone();
            if !reported.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].as_message(), "channel=x panic=listener bug");
    }

    #[test]
    fn test_channel_index_tracks_reference_count() {
        let registry = registry();
        let sub = Subscriber::new(|_, _| {});
        let ch = registry.channel("x");
        ch.subscribe(&sub);

        let idx = registry.channel_index("x").unwrap();
        assert_eq!(registry.subscriber_count_at(idx), 1, "seeded from the live channel");

        ch.subscribe(&sub);
        assert_eq!(registry.subscriber_count_at(idx), 2);
        ch.unsubscribe(&sub);
        ch.unsubscribe(&sub);
        assert!(!registry.has_subscribers_at(idx));
        assert_eq!(registry.channel_index("x").unwrap(), idx);
    }

    #[test]
    fn test_channel_index_exhausted() {
        let registry = Registry::with_config(Config {
            index_capacity: 1,
            ..Config::default()
        });
        registry.channel_index("a").unwrap();
        let err = registry.channel_index("b").unwrap_err();
        assert_eq!(err.as_label(), "index_exhausted");
    }

    #[test]
    fn test_channel_index_covers_tracing_subchannels() {
        let registry = registry();
        let idx = registry.channel_index("tracing:http:start").unwrap();
        let tc = registry.tracing_channel("http");
        let handlers = TraceHandlers::new().start(Subscriber::new(|_, _| {}));

        tc.subscribe(&handlers);
        assert!(registry.has_subscribers_at(idx));
        assert!(!registry.has_subscribers("tracing:http:start"), "sub-channels are not plain channels");
        assert!(tc.unsubscribe(&handlers));
        assert!(!registry.has_subscribers_at(idx));
    }

    #[test]
    fn test_channel_index_seeded_from_active_subchannel() {
        let registry = registry();
        let tc = registry.tracing_channel("http");
        let handlers = TraceHandlers::new().start(Subscriber::new(|_, _| {}));
        tc.subscribe(&handlers);

        let idx = registry.channel_index("tracing:http:start").unwrap();
        assert_eq!(registry.subscriber_count_at(idx), 1);
        assert!(tc.unsubscribe(&handlers));
        assert_eq!(registry.subscriber_count_at(idx), 0);
    }

    #[test]
    fn test_channel_index_sums_channels_sharing_a_name() {
        let registry = registry();
        let idx = registry.channel_index("tracing:http:start").unwrap();
        let tc = registry.tracing_channel("http");
        let handlers = TraceHandlers::new().start(Subscriber::new(|_, _| {}));
        tc.subscribe(&handlers);

        let plain = registry.channel("tracing:http:start");
        let sub = Subscriber::new(|_, _| {});
        plain.subscribe(&sub);
        assert_eq!(registry.subscriber_count_at(idx), 2);
        assert!(plain.unsubscribe(&sub));
        assert_eq!(registry.subscriber_count_at(idx), 1, "tracing start is still subscribed");
        assert!(registry.has_subscribers_at(idx));

        assert!(tc.unsubscribe(&handlers));
        assert!(!registry.has_subscribers_at(idx));
    }

    #[test]
    fn test_channel_index_counts_held_evicted_channel() {
        let registry = registry();
        let sub = Subscriber::new(|_, _| {});
        let held = registry.channel("x");
        held.subscribe(&sub);
        held.unsubscribe(&sub);

        let fresh = registry.channel("x");
        fresh.subscribe(&sub);
        held.subscribe(&sub);
        assert!(!fresh.same(&held));

        let idx = registry.channel_index("x").unwrap();
        assert_eq!(registry.subscriber_count_at(idx), 2, "seeded from both channels");
        assert!(fresh.unsubscribe(&sub));
        assert_eq!(registry.subscriber_count_at(idx), 1);
        assert!(held.unsubscribe(&sub));
        assert_eq!(registry.subscriber_count_at(idx), 0);
    }

    #[test]
    fn test_tracing_channel_lifecycle() {
        let registry = registry();
        let handlers = TraceHandlers::new()
            .end(Subscriber::new(|_, _| {}))
            .error(Subscriber::new(|_, _| {}));

        let tc = registry.tracing_channel("db");
        assert!(registry.tracing_channel("db").same(&tc));
        tc.subscribe(&handlers);
        drop(tc);
        assert_eq!(registry.live_tracing_channels(), 1, "sub-channel activity pins the parent");

        let tc = registry.tracing_channel("db");
        assert!(tc.has_subscribers());
        assert!(tc.unsubscribe(&handlers));
        drop(tc);
        assert_eq!(registry.live_tracing_channels(), 0);
    }
}
