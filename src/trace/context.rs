//! # Trace context.
//!
//! The context is the message every tracing sub-channel publishes. The
//! instrumentation protocols record the operation's outcome into it before the
//! corresponding events fire, so an `end` or `asyncEnd` subscriber can read the
//! result or error of the call it observes.

use std::fmt;

use parking_lot::Mutex;

/// Outcome recorder driven by the tracing protocols.
///
/// Recording goes through `&self`: subscribers hold the same context while the
/// operation is in flight, so implementations use interior mutability.
pub trait TraceRecord {
    /// Success value of the traced operation.
    type Output;
    /// Failure value of the traced operation.
    type Error;

    /// Stores the success value.
    fn record_result(&self, result: &Self::Output);
    /// Stores the failure value.
    fn record_error(&self, error: &Self::Error);
}

/// Ready-made trace context: caller metadata plus the recorded outcome.
///
/// Subscribers downcast the published message to the concrete
/// `TraceContext<T, E, M>` the instrumented code uses.
///
/// ## Example
/// ```rust
/// use diagbus::{TraceContext, TraceRecord};
///
/// let ctx: TraceContext<u32, String, &str> = TraceContext::with_meta("GET /");
/// ctx.record_result(&200);
/// assert_eq!(ctx.result(), Some(200));
/// assert_eq!(*ctx.meta(), "GET /");
/// assert!(ctx.error().is_none());
/// ```
pub struct TraceContext<T, E, M = ()> {
    meta: M,
    result: Mutex<Option<T>>,
    error: Mutex<Option<E>>,
}

impl<T, E> TraceContext<T, E, ()> {
    /// Creates an empty context without metadata.
    pub fn new() -> Self {
        Self::with_meta(())
    }
}

impl<T, E, M> TraceContext<T, E, M> {
    /// Creates an empty context carrying `meta`.
    pub fn with_meta(meta: M) -> Self {
        Self {
            meta,
            result: Mutex::new(None),
            error: Mutex::new(None),
        }
    }

    /// Caller-supplied metadata.
    #[inline]
    pub fn meta(&self) -> &M {
        &self.meta
    }

    /// Recorded success value, if any.
    pub fn result(&self) -> Option<T>
    where
        T: Clone,
    {
        self.result.lock().clone()
    }

    /// Recorded failure value, if any.
    pub fn error(&self) -> Option<E>
    where
        E: Clone,
    {
        self.error.lock().clone()
    }

    /// Takes the recorded success value out of the context.
    pub fn take_result(&self) -> Option<T> {
        self.result.lock().take()
    }

    /// Takes the recorded failure value out of the context.
    pub fn take_error(&self) -> Option<E> {
        self.error.lock().take()
    }
}

impl<T, E> Default for TraceContext<T, E, ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, E: Clone, M> TraceRecord for TraceContext<T, E, M> {
    type Output = T;
    type Error = E;

    fn record_result(&self, result: &T) {
        *self.result.lock() = Some(result.clone());
    }

    fn record_error(&self, error: &E) {
        *self.error.lock() = Some(error.clone());
    }
}

impl<T: fmt::Debug, E: fmt::Debug, M: fmt::Debug> fmt::Debug for TraceContext<T, E, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceContext")
            .field("meta", &self.meta)
            .field("result", &*self.result.lock())
            .field("error", &*self.error.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_overwrite_previous_values() {
        let ctx: TraceContext<i32, String> = TraceContext::new();
        ctx.record_result(&1);
        ctx.record_result(&2);
        ctx.record_error(&"e".to_string());
        assert_eq!(ctx.result(), Some(2));
        assert_eq!(ctx.take_error().as_deref(), Some("e"));
        assert!(ctx.error().is_none());
    }

    #[test]
    fn test_debug_shows_outcome() {
        let ctx: TraceContext<i32, String, u8> = TraceContext::with_meta(7);
        ctx.record_result(&42);
        assert_eq!(
            format!("{ctx:?}"),
            "TraceContext { meta: 7, result: Some(42), error: None }"
        );
    }
}
