//! # Async subscribers.
//!
//! Plain [`Subscriber`](crate::Subscriber)s run synchronously inside `publish`.
//! This module moves the work of async exporters off the publishing path:
//!
//! ```text
//! Channel ── publish(&T) ──► SubscriberSet bridges ──► per-subscriber queue
//!                                                          │
//!                                                          ▼
//!                                              worker ──► Subscribe::on_message(&T)
//! ```

mod set;
mod subscribe;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;
