//! # Out-of-band failure reporting.
//!
//! A subscriber that panics must not disturb the publisher or its sibling
//! subscribers. `publish` catches the panic, turns it into
//! [`Error::SubscriberPanicked`](crate::Error::SubscriberPanicked) and hands it to
//! the registry's [`Report`]er **on a later tick**, never on the publishing stack.
//!
//! ```text
//! publish(data)
//!     ├──► sub1(data)            ok
//!     ├──► sub2(data)  ── panic ─► catch_unwind ─► defer ─┐
//!     └──► sub3(data)            ok                        │
//!                                                          ▼
//!                         tokio::spawn / reporter thread ─► Report::report(err)
//! ```

mod log;
mod reporter;

pub use log::LogReporter;
pub use reporter::Report;

pub(crate) use reporter::defer;
