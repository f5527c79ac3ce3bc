//! Error types used by the diagnostics bus.
//!
//! [`Error`] covers the failures the bus itself can raise:
//!
//! - [`Error::InvalidArgument`]: a dynamically typed argument had the wrong shape.
//! - [`Error::SubscriberPanicked`]: a subscriber panicked during `publish`; never
//!   returned to the publisher, only handed to the [`Report`](crate::Report)er.
//! - [`Error::IndexExhausted`]: the channel index table has no free slot.
//! - [`Error::AlreadyInstalled`]: the process-wide registry was configured twice.
//!
//! Failures of the *instrumented* operation are not represented here: they flow
//! back to the caller unchanged as the operation's own error type.

use thiserror::Error;

use crate::name::ChannelName;

/// # Errors produced by the diagnostics bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// An argument did not have an accepted type or value.
    #[error("invalid argument `{argument}`: expected {expected}, received {received}")]
    InvalidArgument {
        /// Name of the offending argument.
        argument: &'static str,
        /// Human-readable description of what is accepted.
        expected: &'static str,
        /// Description of what was received.
        received: String,
    },

    /// A subscriber panicked while a message was being published.
    #[error("subscriber on channel `{channel}` panicked: {message}")]
    SubscriberPanicked {
        /// Channel the message was published on.
        channel: ChannelName,
        /// Panic payload rendered as text.
        message: String,
    },

    /// Every slot of the channel index table is already assigned.
    #[error("channel index table is full ({limit} slots)")]
    IndexExhausted {
        /// Configured capacity of the table.
        limit: usize,
    },

    /// The process-wide registry was already created or installed.
    #[error("global registry already installed")]
    AlreadyInstalled,
}

impl Error {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use diagbus::Error;
    ///
    /// let err = Error::IndexExhausted { limit: 8 };
    /// assert_eq!(err.as_label(), "index_exhausted");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::InvalidArgument { .. } => "invalid_argument",
            Error::SubscriberPanicked { .. } => "subscriber_panicked",
            Error::IndexExhausted { .. } => "index_exhausted",
            Error::AlreadyInstalled => "already_installed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            Error::InvalidArgument {
                argument,
                expected,
                received,
            } => format!("{argument}: expected {expected}, got {received}"),
            Error::SubscriberPanicked { channel, message } => {
                format!("channel={channel} panic={message}")
            }
            Error::IndexExhausted { limit } => format!("index table full: limit={limit}"),
            Error::AlreadyInstalled => "global registry already installed".to_string(),
        }
    }

    /// Builds the [`Error::SubscriberPanicked`] variant from a caught panic payload.
    pub(crate) fn subscriber_panicked(
        channel: &ChannelName,
        payload: Box<dyn std::any::Any + Send>,
    ) -> Self {
        Error::SubscriberPanicked {
            channel: channel.clone(),
            message: panic_message(payload.as_ref()),
        }
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
