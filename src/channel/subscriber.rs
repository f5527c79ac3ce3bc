//! # Subscriber handles.
//!
//! A [`Subscriber`] is a cloneable handle around a synchronous callback. The
//! channel identifies subscriptions by handle identity, not by callback
//! behaviour: keep the handle you subscribed with to unsubscribe later.
//!
//! ```rust
//! use diagbus::{Channel, Message, Subscriber};
//!
//! let ch = Channel::new("db.query");
//! let sub = Subscriber::new(|msg: &Message, _name| {
//!     if let Some(sql) = msg.downcast_ref::<&str>() {
//!         println!("query: {sql}");
//!     }
//! });
//!
//! ch.subscribe(&sub);
//! ch.publish(&"SELECT 1");
//! assert!(ch.unsubscribe(&sub));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::name::ChannelName;

/// Type of every published message.
///
/// Subscribers receive the message as `&dyn Any` and downcast to the type the
/// publisher documents for the channel.
pub type Message = dyn std::any::Any + Send + Sync;

type Callback = dyn Fn(&Message, &ChannelName) + Send + Sync;

/// Cloneable handle to a channel callback.
///
/// Two handles are equal iff they were cloned from the same [`Subscriber::new`] call.
#[derive(Clone)]
pub struct Subscriber {
    callback: Arc<Callback>,
}

impl Subscriber {
    /// Wraps a callback invoked with `(message, channel_name)`.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Message, &ChannelName) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(f),
        }
    }

    /// Invokes the callback.
    #[inline]
    pub(crate) fn call(&self, message: &Message, name: &ChannelName) {
        (self.callback)(message, name)
    }

    /// Returns `true` if both handles refer to the same callback.
    #[inline]
    pub fn same(&self, other: &Subscriber) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.callback) as *const (),
            Arc::as_ptr(&other.callback) as *const (),
        )
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Subscriber {}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("callback", &(Arc::as_ptr(&self.callback) as *const ()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_follows_clones() {
        let a = Subscriber::new(|_, _| {});
        let b = Subscriber::new(|_, _| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
