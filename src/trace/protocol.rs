//! # Instrumentation protocols.
//!
//! Each protocol wraps one call of an operation with the tracing lifecycle:
//!
//! ```text
//! Idle ─► Started ─► Succeeded ─┐
//!                 └► Failed ────┴─► Ended ─► (AsyncEnded)
//!
//! start   published by start.run_stores, the operation runs inside the start stores
//! error   on Err, after the error is recorded into the context
//! end     exactly once, after the synchronous part, even if it panics
//! asyncEnd callback / future protocols only, after the outcome is recorded
//! ```
//!
//! The free functions always publish. The [`TracingChannel`](crate::TracingChannel)
//! methods of the same names skip all of it when no sub-channel is active.
//!
//! A panic inside the operation is not an error outcome: `end` is published while
//! unwinding and the panic continues to the caller untouched.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::channel::{Channel, Message};
use crate::trace::channel::TraceChannels;
use crate::trace::context::TraceRecord;

type Completion<T, E> = Box<dyn FnOnce(Result<T, E>) + Send>;

/// Completion callback of a callback-style operation, as handed to
/// [`trace_callback`].
pub enum CallbackSlot<T, E> {
    /// Wrap this callback: it runs after the outcome is recorded and published.
    Wrap(Completion<T, E>),
    /// Wrap an absent callback: the outcome is still recorded and `asyncEnd` published.
    Unset,
    /// Do not wrap anything; `asyncEnd` is never published for this call.
    Detached,
}

impl<T: 'static, E: 'static> CallbackSlot<T, E> {
    /// Wraps `callback`.
    pub fn wrap<F>(callback: F) -> Self
    where
        F: FnOnce(Result<T, E>) + Send + 'static,
    {
        CallbackSlot::Wrap(Box::new(callback))
    }
}

impl<T, E> fmt::Debug for CallbackSlot<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallbackSlot::Wrap(_) => "Wrap",
            CallbackSlot::Unset => "Unset",
            CallbackSlot::Detached => "Detached",
        })
    }
}

struct Traced<C> {
    ctx: Arc<C>,
    error: Channel,
    async_end: Channel,
}

/// Completion handle given to a callback-style operation.
///
/// The operation calls [`complete`](Self::complete) once with its outcome. When
/// the call is traced this records the outcome, publishes `error` (on `Err`) and
/// `asyncEnd`, then runs the wrapped callback. Otherwise it only runs the callback.
pub struct TracedCallback<C: TraceRecord> {
    callback: Option<Completion<C::Output, C::Error>>,
    traced: Option<Traced<C>>,
}

impl<C> TracedCallback<C>
where
    C: TraceRecord + Send + Sync + 'static,
{
    fn traced(
        callback: Option<Completion<C::Output, C::Error>>,
        ctx: &Arc<C>,
        channels: &TraceChannels,
    ) -> Self {
        Self {
            callback,
            traced: Some(Traced {
                ctx: Arc::clone(ctx),
                error: channels.error.clone(),
                async_end: channels.async_end.clone(),
            }),
        }
    }

    /// Returns `true` if completing this handle publishes trace events.
    #[inline]
    pub fn is_traced(&self) -> bool {
        self.traced.is_some()
    }

    /// Reports the operation's outcome.
    pub fn complete(self, outcome: Result<C::Output, C::Error>) {
        if let Some(traced) = self.traced {
            let ctx: &C = &traced.ctx;
            match &outcome {
                Ok(result) => ctx.record_result(result),
                Err(error) => {
                    ctx.record_error(error);
                    traced.error.publish(ctx);
                }
            }
            traced.async_end.publish(ctx);
        }
        if let Some(callback) = self.callback {
            callback(outcome);
        }
    }
}

impl<C: TraceRecord> fmt::Debug for TracedCallback<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedCallback")
            .field("callback", &self.callback.is_some())
            .field("traced", &self.traced.is_some())
            .finish()
    }
}

/// Converts a slot into the handle an untraced call receives.
pub(crate) fn passthrough<C>(slot: CallbackSlot<C::Output, C::Error>) -> Option<TracedCallback<C>>
where
    C: TraceRecord,
{
    match slot {
        CallbackSlot::Wrap(callback) => Some(TracedCallback {
            callback: Some(callback),
            traced: None,
        }),
        CallbackSlot::Unset => Some(TracedCallback {
            callback: None,
            traced: None,
        }),
        CallbackSlot::Detached => None,
    }
}

/// Publishes `message` on `channel` when dropped, including while unwinding.
struct PublishOnDrop<'a> {
    channel: &'a Channel,
    message: &'a Message,
}

impl Drop for PublishOnDrop<'_> {
    fn drop(&mut self) {
        self.channel.publish(self.message);
    }
}

/// Traces a synchronous operation.
///
/// `f` runs inside the `start` stores. `Ok` is recorded as the result; `Err` is
/// recorded, published on `error` and returned unchanged. `end` follows in
/// every case.
pub fn trace_sync<C, F>(channels: &TraceChannels, f: F, ctx: &C) -> Result<C::Output, C::Error>
where
    C: TraceRecord + Send + Sync + 'static,
    F: FnOnce() -> Result<C::Output, C::Error>,
{
    let _end = PublishOnDrop {
        channel: &channels.end,
        message: ctx,
    };
    let out = channels.start.run_stores(ctx, f);
    match &out {
        Ok(result) => ctx.record_result(result),
        Err(error) => {
            ctx.record_error(error);
            channels.error.publish(ctx);
        }
    }
    out
}

/// Traces a callback-style operation.
///
/// `f` receives the completion handle built from `slot` (`None` for
/// [`CallbackSlot::Detached`]). Its synchronous `Err` is recorded and published
/// like in [`trace_sync`]; its `Ok` value is returned without being recorded,
/// since the outcome arrives later through the handle. `end` is published as
/// soon as `f` returns; `asyncEnd` when the handle is completed.
pub fn trace_callback<C, R, F>(
    channels: &TraceChannels,
    f: F,
    slot: CallbackSlot<C::Output, C::Error>,
    ctx: Arc<C>,
) -> Result<R, C::Error>
where
    C: TraceRecord + Send + Sync + 'static,
    F: FnOnce(Option<TracedCallback<C>>) -> Result<R, C::Error>,
{
    let callback = match slot {
        CallbackSlot::Wrap(callback) => Some(TracedCallback::traced(Some(callback), &ctx, channels)),
        CallbackSlot::Unset => Some(TracedCallback::traced(None, &ctx, channels)),
        CallbackSlot::Detached => None,
    };

    let ctx: &C = &ctx;
    let _end = PublishOnDrop {
        channel: &channels.end,
        message: ctx,
    };
    let out = channels.start.run_stores(ctx, move || f(callback));
    if let Err(error) = &out {
        ctx.record_error(error);
        channels.error.publish(ctx);
    }
    out
}

/// Traces a future-returning operation.
///
/// `f` is called right away, inside the `start` stores, and `end` is published
/// before this function returns. The returned future awaits the operation,
/// records its output, publishes `error` (on `Err`) then `asyncEnd`, and yields
/// the output unchanged.
pub fn trace_promise<C, F, Fut>(
    channels: &TraceChannels,
    f: F,
    ctx: Arc<C>,
) -> impl Future<Output = Result<C::Output, C::Error>>
where
    C: TraceRecord + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<C::Output, C::Error>>,
{
    let fut = {
        let _end = PublishOnDrop {
            channel: &channels.end,
            message: &*ctx,
        };
        channels.start.run_stores(&*ctx, f)
    };

    let error = channels.error.clone();
    let async_end = channels.async_end.clone();
    async move {
        let out = fut.await;
        let ctx: &C = &ctx;
        match &out {
            Ok(result) => ctx.record_result(result),
            Err(err) => {
                ctx.record_error(err);
                error.publish(ctx);
            }
        }
        async_end.publish(ctx);
        out
    }
}
