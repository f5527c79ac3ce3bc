//! # Tracing channels.
//!
//! A tracing channel wraps an operation with lifecycle events published on four
//! sub-channels (`start`, `end`, `asyncEnd`, `error`), recording the outcome
//! into a caller-owned trace context.
//!
//! - [`TracingChannel`] named bundle with the no-subscriber fast path
//! - [`trace_sync`], [`trace_callback`], [`trace_promise`] the protocols over an explicit [`TraceChannels`]
//! - [`TraceRecord`] / [`TraceContext`] the trace context
//! - [`TraceEvent`] / [`TraceHandlers`] event keys and handler maps

mod channel;
mod context;
mod event;
mod protocol;

pub(crate) use channel::TracingInner;
pub use channel::{TraceChannels, TracingChannel};
pub use context::{TraceContext, TraceRecord};
pub use event::{TraceEvent, TraceHandlers};
pub use protocol::{trace_callback, trace_promise, trace_sync, CallbackSlot, TracedCallback};
