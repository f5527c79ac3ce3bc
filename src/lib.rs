//! # diagbus
//!
//! **diagbus** is a low-overhead, process-wide instrumentation bus.
//!
//! Libraries publish diagnostic messages on named channels; tools subscribe to the
//! channels they care about. When nobody listens, publishing costs one atomic
//! load. On top of plain channels, tracing channels wrap sync, callback-style
//! and future-returning operations with `start`/`end`/`asyncEnd`/`error` events
//! and run them inside ambient-context stores.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  instrumented code                               tools / exporters
//!  ─────────────────                               ─────────────────
//!  has_subscribers("db.query") ─┐            ┌──── subscribe("db.query", sub)
//!  channel("db.query")          │            │     tracing_channel("http")
//!    .publish(&msg)             ▼            ▼       .subscribe(&handlers)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Registry                                                         │
//! │  - channels: name → weakly held Channel (pinned while active)     │
//! │  - tracing:  name → weakly held TracingChannel                    │
//! │  - index:    name → slot of per-name reference totals             │
//! │  - reporter: receives subscriber panics, out of band              │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        ▼                                              ▼
//!   ┌─────────────────────────────┐        ┌──────────────────────────────┐
//!   │ Channel                     │        │ TracingChannel               │
//!   │  Dormant ◄──► Active {      │        │  tracing:X:start ─┐          │
//!   │    subscribers (in order),  │        │  tracing:X:end    ├ Channels │
//!   │    stores (nested in order) │        │  tracing:X:asyncEnd          │
//!   │  }                          │        │  tracing:X:error ─┘          │
//!   └─────────────────────────────┘        └──────────────────────────────┘
//! ```
//!
//! ### Traced call
//! ```text
//! trace_sync(f, &ctx)
//!   ├─► start.run_stores(&ctx, f)     publish start, run f inside every start store
//!   │       ├─ Ok(v)  ──► ctx.record_result(&v)
//!   │       └─ Err(e) ──► ctx.record_error(&e), publish error
//!   └─► publish end (always, exactly once)
//!
//! trace_callback / trace_promise: same, then later
//!   └─► outcome recorded ──► publish error (on Err) ──► publish asyncEnd
//! ```
//!
//! ## Features
//! | Area                 | Description                                                  | Key types / functions                             |
//! |----------------------|--------------------------------------------------------------|---------------------------------------------------|
//! | **Channels**         | Named pub/sub with a zero-cost dormant path.                 | [`Channel`], [`Subscriber`], [`Message`]          |
//! | **Registry**         | Lookup-or-create by name, deterministic cleanup.             | [`Registry`], [`channel`], [`has_subscribers`]    |
//! | **Stores**           | Run work inside ambient-context scopes.                      | [`Store`], [`Transform`], [`TaskLocalStore`]      |
//! | **Tracing**          | Lifecycle events around sync/callback/async operations.      | [`TracingChannel`], [`trace_sync`], [`TraceContext`] |
//! | **Async fan-out**    | Queue messages to async exporters off the publishing path.   | [`Subscribe`], [`SubscriberSet`]                  |
//! | **Channel index**    | Integer slots for lock-free "is anyone listening" checks.    | [`ChannelIndex`], [`Registry::channel_index`]     |
//! | **Errors/reporting** | Typed errors, out-of-band subscriber panic reports.          | [`Error`], [`Report`], [`LogReporter`]            |
//! | **Configuration**    | Reporter and index capacity.                                 | [`Config`], [`install`]                           |
//!
//! ## Example
//! ```rust
//! use diagbus::{Subscriber, TraceContext, TraceHandlers};
//!
//! type Ctx = TraceContext<usize, String, &'static str>;
//!
//! // Tool side: listen for finished queries.
//! let handlers = TraceHandlers::new().end(Subscriber::new(|msg, name| {
//!     if let Some(ctx) = msg.downcast_ref::<Ctx>() {
//!         println!("{name}: {} -> {:?}", ctx.meta(), ctx.result());
//!     }
//! }));
//! diagbus::tracing_channel("example.db.query").subscribe(&handlers);
//!
//! // Library side: trace the operation (free when nobody listens).
//! let tc = diagbus::tracing_channel("example.db.query");
//! let ctx = Ctx::with_meta("SELECT * FROM users");
//! let rows = tc.trace_sync(|| Ok::<_, String>(3), &ctx);
//!
//! assert_eq!(rows, Ok(3));
//! assert!(tc.unsubscribe(&handlers));
//! ```

mod channel;
mod config;
mod error;
mod name;
mod registry;
mod report;
mod subscribers;
mod trace;

// ---- Public re-exports ----

pub use channel::{transform, Channel, Message, Store, Subscriber, TaskLocalStore, Transform};
pub use config::Config;
pub use error::Error;
pub use name::{ChannelName, NameRef, Symbol};
pub use registry::{
    channel, global, has_subscribers, install, subscribe, tracing_channel, unsubscribe,
    ChannelIndex, Registry,
};
pub use report::{LogReporter, Report};
pub use subscribers::{Subscribe, SubscriberSet};
pub use trace::{
    trace_callback, trace_promise, trace_sync, CallbackSlot, TraceChannels, TraceContext,
    TraceEvent, TraceHandlers, TraceRecord, TracedCallback, TracingChannel,
};
