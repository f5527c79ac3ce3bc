//! # Registry configuration.
//!
//! Provides [`Config`], the settings a [`Registry`](crate::Registry) is built with.
//!
//! Config is used in two ways:
//! 1. **Private registries**: `Registry::with_config(config)`
//! 2. **Process-wide registry**: `diagbus::install(config)` before first use
//!
//! ## Sentinel values
//! - `index_capacity = 0` → clamped to 1 (the table always has one slot)

use std::fmt;
use std::sync::Arc;

use crate::report::{LogReporter, Report};

/// Configuration of a channel registry.
///
/// ## Field semantics
/// - `reporter`: receives subscriber panics, always out of the publisher's call stack
/// - `index_capacity`: number of slots in the channel index table (min 1)
#[derive(Clone)]
pub struct Config {
    /// Reporter for failures that must never reach the publisher.
    ///
    /// Subscriber panics are caught inside `publish`, converted to
    /// [`Error::SubscriberPanicked`](crate::Error::SubscriberPanicked) and handed
    /// to this reporter on a later scheduling tick.
    pub reporter: Arc<dyn Report>,

    /// Maximum number of channel names that can be assigned an index.
    ///
    /// Indices are handed out by [`Registry::channel_index`](crate::Registry::channel_index)
    /// and are never reused.
    pub index_capacity: usize,
}

impl Config {
    /// Returns the index capacity clamped to a minimum of 1.
    #[inline]
    pub fn index_capacity_clamped(&self) -> usize {
        self.index_capacity.max(1)
    }

    /// Replaces the reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Report>) -> Self {
        self.reporter = reporter;
        self
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `reporter = LogReporter` (logs at `error` level through `tracing`)
    /// - `index_capacity = 1024`
    fn default() -> Self {
        Self {
            reporter: Arc::new(LogReporter::new()),
            index_capacity: 1024,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("reporter", &self.reporter.name())
            .field("index_capacity", &self.index_capacity)
            .finish()
    }
}
