//! # Channels, subscribers and stores.
//!
//! - [`Channel`] named publish/subscribe endpoint with a dormant fast path
//! - [`Subscriber`] cloneable callback handle, compared by identity
//! - [`Store`] ambient-context provider a channel can run work inside
//! - [`TaskLocalStore`] [`Store`] over a `tokio::task_local!` key

mod channel;
mod store;
mod subscriber;

pub(crate) use channel::ChannelInner;
pub use channel::Channel;
pub use store::{transform, Store, TaskLocalStore, Transform};
pub use subscriber::{Message, Subscriber};
