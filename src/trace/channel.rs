//! # Tracing channel.
//!
//! A [`TracingChannel`] bundles the four sub-channels of one traced operation
//! and applies the fast path: with nothing attached to any sub-channel, the
//! protocol methods call the operation directly.
//!
//! ## Liveness
//! The sub-channels report their subscribers and stores to the tracing
//! channel's own registry entry, so the registry keeps the tracing channel (and
//! with it all four sub-channels) alive while any of them is active:
//!
//! ```text
//! Entry{ WeakRef<TracingInner> } ◄── start / end / asyncEnd / error
//!                                   (one anchor, counts summed)
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::Either;

use crate::channel::{Channel, ChannelInner};
use crate::config::Config;
use crate::name::ChannelName;
use crate::registry::shared::Shared;
use crate::registry::table::{Anchor, Detached};
use crate::trace::context::TraceRecord;
use crate::trace::event::{TraceEvent, TraceHandlers};
use crate::trace::protocol::{self, CallbackSlot, TracedCallback};

/// The four sub-channels of a tracing channel.
///
/// This is the explicit bundle the free protocol functions take.
#[derive(Clone, Debug)]
pub struct TraceChannels {
    pub start: Channel,
    pub end: Channel,
    pub async_end: Channel,
    pub error: Channel,
}

impl TraceChannels {
    /// Creates four standalone sub-channels for the tracing channel `name`.
    pub fn new(name: impl Into<ChannelName>) -> Self {
        Self::anchored(
            &name.into(),
            &(Arc::new(Detached) as Arc<dyn Anchor>),
            &Shared::new(&Config::default()),
        )
    }

    fn anchored(name: &ChannelName, anchor: &Arc<dyn Anchor>, shared: &Arc<Shared>) -> Self {
        let sub = |event: TraceEvent| {
            Channel::from_inner(Arc::new(ChannelInner::new(
                event.channel_name(name),
                Arc::clone(anchor),
                Arc::clone(shared),
            )))
        };
        Self {
            start: sub(TraceEvent::Start),
            end: sub(TraceEvent::End),
            async_end: sub(TraceEvent::AsyncEnd),
            error: sub(TraceEvent::Error),
        }
    }

    /// Returns the sub-channel of `event`.
    pub fn get(&self, event: TraceEvent) -> &Channel {
        match event {
            TraceEvent::Start => &self.start,
            TraceEvent::End => &self.end,
            TraceEvent::AsyncEnd => &self.async_end,
            TraceEvent::Error => &self.error,
        }
    }

    /// Returns `true` if any sub-channel has subscribers or stores.
    #[inline]
    pub fn has_subscribers(&self) -> bool {
        self.start.has_subscribers()
            || self.end.has_subscribers()
            || self.async_end.has_subscribers()
            || self.error.has_subscribers()
    }
}

pub(crate) struct TracingInner {
    name: ChannelName,
    channels: TraceChannels,
    anchor: Arc<dyn Anchor>,
}

impl TracingInner {
    pub(crate) fn new(name: ChannelName, anchor: Arc<dyn Anchor>, shared: Arc<Shared>) -> Self {
        tracing::debug!(tracing_channel = %name, "tracing channel created");
        let channels = TraceChannels::anchored(&name, &anchor, &shared);
        Self {
            name,
            channels,
            anchor,
        }
    }
}

impl Drop for TracingInner {
    fn drop(&mut self) {
        self.anchor.forget();
    }
}

/// Named bundle of trace sub-channels with instrumentation helpers.
///
/// ## Example
/// ```rust
/// use diagbus::{Subscriber, TraceContext, TraceHandlers, TracingChannel};
///
/// type Ctx = TraceContext<u64, String, &'static str>;
///
/// let tc = TracingChannel::new("db.query");
/// let handlers = TraceHandlers::new().end(Subscriber::new(|msg, _| {
///     let ctx = msg.downcast_ref::<Ctx>().unwrap();
///     println!("{} -> {:?}", ctx.meta(), ctx.result());
/// }));
/// tc.subscribe(&handlers);
///
/// let ctx = Ctx::with_meta("SELECT count(*) FROM users");
/// let rows = tc.trace_sync(|| Ok(3), &ctx);
/// assert_eq!(rows, Ok(3));
/// assert_eq!(ctx.result(), Some(3));
/// assert!(tc.unsubscribe(&handlers));
/// ```
#[derive(Clone)]
pub struct TracingChannel {
    inner: Arc<TracingInner>,
}

impl TracingChannel {
    /// Creates a standalone tracing channel that is not registered in any registry.
    pub fn new(name: impl Into<ChannelName>) -> Self {
        Self::from_inner(Arc::new(TracingInner::new(
            name.into(),
            Arc::new(Detached),
            Shared::new(&Config::default()),
        )))
    }

    #[inline]
    pub(crate) fn from_inner(inner: Arc<TracingInner>) -> Self {
        Self { inner }
    }

    /// Base name (without the `tracing:` prefix and event suffix).
    #[inline]
    pub fn name(&self) -> &ChannelName {
        &self.inner.name
    }

    /// The sub-channels.
    #[inline]
    pub fn channels(&self) -> &TraceChannels {
        &self.inner.channels
    }

    /// Returns `true` if any sub-channel has subscribers or stores.
    #[inline]
    pub fn has_subscribers(&self) -> bool {
        self.inner.channels.has_subscribers()
    }

    /// Returns `true` if both handles refer to the same tracing channel.
    #[inline]
    pub fn same(&self, other: &TracingChannel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Subscribes every handler to its event's sub-channel.
    pub fn subscribe(&self, handlers: &TraceHandlers) {
        for (event, subscriber) in handlers.iter() {
            self.inner.channels.get(event).subscribe(subscriber);
        }
    }

    /// Unsubscribes every handler from its event's sub-channel.
    ///
    /// Returns `true` only if every handler present in `handlers` was removed.
    /// Every handler is attempted even after a miss.
    pub fn unsubscribe(&self, handlers: &TraceHandlers) -> bool {
        handlers.iter().fold(true, |done, (event, subscriber)| {
            self.inner.channels.get(event).unsubscribe(subscriber) && done
        })
    }

    /// [`trace_sync`](crate::trace_sync) with the fast path.
    pub fn trace_sync<C, F>(&self, f: F, ctx: &C) -> Result<C::Output, C::Error>
    where
        C: TraceRecord + Send + Sync + 'static,
        F: FnOnce() -> Result<C::Output, C::Error>,
    {
        if !self.has_subscribers() {
            return f();
        }
        protocol::trace_sync(&self.inner.channels, f, ctx)
    }

    /// [`trace_callback`](crate::trace_callback) with the fast path.
    ///
    /// Untraced calls still receive a handle for `Wrap`/`Unset` slots; completing
    /// it only runs the wrapped callback.
    pub fn trace_callback<C, R, F>(
        &self,
        f: F,
        slot: CallbackSlot<C::Output, C::Error>,
        ctx: Arc<C>,
    ) -> Result<R, C::Error>
    where
        C: TraceRecord + Send + Sync + 'static,
        F: FnOnce(Option<TracedCallback<C>>) -> Result<R, C::Error>,
    {
        if !self.has_subscribers() {
            return f(protocol::passthrough(slot));
        }
        protocol::trace_callback(&self.inner.channels, f, slot, ctx)
    }

    /// [`trace_promise`](crate::trace_promise) with the fast path.
    ///
    /// Untraced calls return the operation's future unchanged (`Either::Left`).
    pub fn trace_promise<C, F, Fut>(
        &self,
        f: F,
        ctx: Arc<C>,
    ) -> Either<Fut, impl Future<Output = Result<C::Output, C::Error>>>
    where
        C: TraceRecord + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C::Output, C::Error>>,
    {
        if !self.has_subscribers() {
            return Either::Left(f());
        }
        Either::Right(protocol::trace_promise(&self.inner.channels, f, ctx))
    }
}

impl fmt::Debug for TracingChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingChannel")
            .field("name", &self.inner.name)
            .field("channels", &self.inner.channels)
            .finish()
    }
}
