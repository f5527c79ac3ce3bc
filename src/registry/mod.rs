//! # Registries and liveness management.
//!
//! - [`Registry`] name → channel / tracing channel lookup-or-create
//! - [`global`], [`install`] and the free functions over the process-wide registry
//! - [`ChannelIndex`] stable slot in the channel index table
//!
//! Internals: the counted weak reference (`weak`), the anchored name table
//! (`table`), the index table (`index`) and the state a registry shares with its
//! channels (`shared`).

pub(crate) mod index;
pub(crate) mod shared;
pub(crate) mod table;

mod global;
mod registry;
mod weak;

pub use global::{channel, global, has_subscribers, install, subscribe, tracing_channel, unsubscribe};
pub use index::ChannelIndex;
pub use registry::Registry;
