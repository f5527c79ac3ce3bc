//! # LogReporter: default failure sink
//!
//! Logs every reported failure through `tracing` at `error` level.
//!
//! ## Example output
//! ```text
//! ERROR diagbus::report::log: subscriber failure reporter="LogReporter" label="subscriber_panicked" channel=http panic=boom
//! ```

use crate::error::Error;
use crate::report::Report;

/// Reporter that writes failures to the `tracing` pipeline.
#[derive(Default, Debug, Clone, Copy)]
pub struct LogReporter;

impl LogReporter {
    /// Construct a new [`LogReporter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Report for LogReporter {
    fn report(&self, error: Error) {
        tracing::error!(
            reporter = self.name(),
            label = error.as_label(),
            "{}",
            error.as_message()
        );
    }

    fn name(&self) -> &'static str {
        "LogReporter"
    }
}
