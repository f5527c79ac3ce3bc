//! # Async subscriber trait.
//!
//! [`Subscribe`] is the extension point for exporters that need async I/O.
//! Channel subscribers run inside `publish`; an async subscriber instead gets:
//! - **Dedicated worker task** (runs independently of the publisher)
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and handed to the registry's reporter)
//!
//! ```text
//! publish ──► bridge ──try_send──► [bounded queue] ──► worker ──► on_message()
//!                 └─► full: dropped for this subscriber        └─► panic → Report
//! ```
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use diagbus::{ChannelName, Subscribe};
//!
//! #[derive(Clone)]
//! struct Query {
//!     sql: String,
//! }
//!
//! struct SlowLog;
//!
//! #[async_trait]
//! impl Subscribe<Query> for SlowLog {
//!     async fn on_message(&self, query: &Query, channel: &ChannelName) {
//!         // write to a file, send over the network, ...
//!         let _ = (query.sql.len(), channel);
//!     }
//!
//!     fn name(&self) -> &'static str { "slow-log" }
//!     fn queue_capacity(&self) -> usize { 256 }
//! }
//! ```

use async_trait::async_trait;

use crate::name::ChannelName;

/// Async consumer of messages of type `T`.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Slow processing affects only this subscriber's queue.
#[async_trait]
pub trait Subscribe<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    /// Processes one message published on `channel`.
    ///
    /// Called from a dedicated worker task, in publish order.
    async fn on_message(&self, message: &T, channel: &ChannelName);

    /// Returns the subscriber name used in logs and panic reports.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose; override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity (clamped to a minimum of 1).
    ///
    /// A message arriving at a full queue is dropped for this subscriber only.
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
