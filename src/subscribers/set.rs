//! # Non-blocking fan-out from a channel to async subscribers.
//!
//! [`SubscriberSet`] attaches one bridging [`Subscriber`] per async subscriber to
//! a channel. The bridge only downcasts and enqueues; the subscriber's own
//! worker task does the rest.
//!
//! ```text
//! channel.publish(&msg)
//!     │
//!     ├──► bridge 1 ──► [queue 1] ──► worker 1 ──► sub1.on_message()
//!     │                 (bounded)         └──────► panic → Report
//!     └──► bridge N ──► [queue N] ──► worker N ──► subN.on_message()
//! ```
//!
//! ## Rules
//! - **Typed**: messages that are not a `T` are ignored.
//! - **Overflow**: message dropped for that subscriber only (`warn!`).
//! - **Non-blocking**: bridges use `try_send`; `publish` never awaits.
//! - **Per-subscriber FIFO**, no ordering across subscribers.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::channel::{Channel, Subscriber};
use crate::error::{panic_message, Error};
use crate::name::ChannelName;
use crate::subscribers::Subscribe;

/// Bridge registered on the channel for one async subscriber.
struct Bridge {
    name: &'static str,
    subscriber: Subscriber,
}

/// Async subscribers attached to one channel.
///
/// Dropping the set detaches the bridges without waiting for the workers; use
/// [`shutdown`](Self::shutdown) to drain the queues.
pub struct SubscriberSet<T> {
    channel: Channel,
    bridges: Vec<Bridge>,
    workers: Vec<JoinHandle<()>>,
    _message: PhantomData<fn(T)>,
}

impl<T> SubscriberSet<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawns one worker per subscriber and subscribes its bridge to `channel`.
    ///
    /// # Panics
    /// Panics if called outside of a tokio runtime.
    #[must_use]
    pub fn attach(channel: &Channel, subs: Vec<Arc<dyn Subscribe<T>>>) -> Self {
        let mut bridges = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<(Arc<T>, ChannelName)>(cap);

            let s = Arc::clone(&sub);
            let reporting = channel.clone();
            let handle = tokio::spawn(async move {
                while let Some((msg, from)) = rx.recv().await {
                    let fut = s.on_message(msg.as_ref(), &from);

                    if let Err(panic_err) = AssertUnwindSafe(fut).catch_unwind().await {
                        reporting.report(Error::SubscriberPanicked {
                            channel: from.clone(),
                            message: format!("{}: {}", s.name(), panic_message(&*panic_err)),
                        });
                    }
                }
            });

            let subscriber = Subscriber::new(move |msg, from| {
                let Some(value) = msg.downcast_ref::<T>() else {
                    return;
                };
                match tx.try_send((Arc::new(value.clone()), from.clone())) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(subscriber = name, channel = %from, reason = "full", "message dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        tracing::warn!(subscriber = name, channel = %from, reason = "closed", "message dropped");
                    }
                }
            });
            channel.subscribe(&subscriber);
            tracing::debug!(subscriber = name, channel = %channel.name(), queue = cap, "async subscriber attached");

            bridges.push(Bridge { name, subscriber });
            workers.push(handle);
        }

        Self {
            channel: channel.clone(),
            bridges,
            workers,
            _message: PhantomData,
        }
    }
}

impl<T> SubscriberSet<T> {
    /// Number of attached subscribers.
    pub fn len(&self) -> usize {
        self.bridges.len()
    }

    /// Returns `true` if no subscriber is attached.
    pub fn is_empty(&self) -> bool {
        self.bridges.is_empty()
    }

    /// Gracefully shuts down all subscriber workers.
    ///
    /// 1. Unsubscribes every bridge (queues close once drained)
    /// 2. Awaits all worker tasks to finish
    pub async fn shutdown(mut self) {
        self.detach();

        for h in std::mem::take(&mut self.workers) {
            let _ = h.await;
        }
    }

    fn detach(&mut self) {
        for bridge in std::mem::take(&mut self.bridges) {
            if !self.channel.unsubscribe(&bridge.subscriber) {
                tracing::debug!(subscriber = bridge.name, "bridge was already unsubscribed");
            }
        }
    }
}

impl<T> Drop for SubscriberSet<T> {
    fn drop(&mut self) {
        self.detach();
    }
}
