//! # Reporter trait and deferred dispatch.
//!
//! [`Report`] is the host's "uncaught exception" hook. The bus never calls it
//! synchronously from `publish`: [`defer`] moves the call onto the current tokio
//! runtime when one is entered, or onto the process-wide reporter thread otherwise.
//!
//! ```text
//! defer(err) ──► tokio runtime entered? ── yes ──► spawn(report(err))
//!                        │
//!                        no ──try_send──► [bounded queue] ──► "diagbus-report" thread
//!                                 └─► full: report dropped (warn!)
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use tokio::sync::mpsc;

use crate::error::Error;

/// Reports waiting for the reporter thread before new ones are dropped.
const QUEUE_CAPACITY: usize = 1024;

type Queued = (Arc<dyn Report>, Error);

/// Sender to the reporter thread; `None` if the thread could not be started.
static QUEUE: OnceLock<Option<mpsc::Sender<Queued>>> = OnceLock::new();

/// Sink for failures that must not propagate to the publisher.
///
/// ### Implementation requirements
/// - Called from a spawned task or the reporter thread, never from `publish`.
/// - Must not panic; a panicking reporter only loses its own report.
pub trait Report: Send + Sync + 'static {
    /// Handles one failure.
    fn report(&self, error: Error);

    /// Returns the reporter name used in logs.
    ///
    /// The default uses `type_name::<Self>()`; override it with something short.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Hands `error` to `reporter` outside of the current call stack.
pub(crate) fn defer(reporter: Arc<dyn Report>, error: Error) {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move { reporter.report(error) });
        return;
    }

    let label = error.as_label();
    let Some(queue) = reporter_queue() else {
        tracing::error!(error = label, "report dropped: no reporter thread");
        return;
    };
    match queue.try_send((reporter, error)) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(error = label, reason = "full", "report dropped");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::error!(error = label, reason = "closed", "report dropped");
        }
    }
}

/// Starts the reporter thread on first use.
fn reporter_queue() -> Option<&'static mpsc::Sender<Queued>> {
    QUEUE
        .get_or_init(|| {
            let (tx, mut rx) = mpsc::channel::<Queued>(QUEUE_CAPACITY);
            let spawned = std::thread::Builder::new()
                .name("diagbus-report".into())
                .spawn(move || {
                    while let Some((reporter, error)) = rx.blocking_recv() {
                        let name = reporter.name();
                        let label = error.as_label();
                        if panic::catch_unwind(AssertUnwindSafe(|| reporter.report(error))).is_err() {
                            tracing::error!(reporter = name, error = label, "reporter panicked");
                        }
                    }
                });
            match spawned {
                Ok(_) => {
                    tracing::debug!(capacity = QUEUE_CAPACITY, "reporter thread started");
                    Some(tx)
                }
                Err(e) => {
                    tracing::error!(cause = %e, "failed to spawn reporter thread");
                    None
                }
            }
        })
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    struct Collect(parking_lot::Mutex<mpsc::Sender<Error>>);

    impl Report for Collect {
        fn report(&self, error: Error) {
            let _ = self.0.lock().send(error);
        }
    }

    #[test]
    fn test_defer_without_runtime_uses_thread() {
        let (tx, rx) = mpsc::channel();
        let reporter: Arc<dyn Report> = Arc::new(Collect(parking_lot::Mutex::new(tx)));

        defer(reporter, Error::AlreadyInstalled);

        let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(got.as_label(), "already_installed");
    }

    struct ThreadOf(parking_lot::Mutex<mpsc::Sender<std::thread::ThreadId>>);

    impl Report for ThreadOf {
        fn report(&self, _error: Error) {
            let _ = self.0.lock().send(std::thread::current().id());
        }
    }

    #[test]
    fn test_defer_without_runtime_reuses_one_thread() {
        let (tx, rx) = mpsc::channel();
        let reporter: Arc<dyn Report> = Arc::new(ThreadOf(parking_lot::Mutex::new(tx)));

        for _ in 0..16 {
            defer(Arc::clone(&reporter), Error::AlreadyInstalled);
        }

        let threads: Vec<_> = (0..16)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert!(threads.iter().all(|id| *id == threads[0]));
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[test]
    fn test_reporter_thread_survives_panicking_reporter() {
        struct Panics;
        impl Report for Panics {
            fn report(&self, _error: Error) {
                panic!("broken reporter");
            }
        }
        defer(Arc::new(Panics), Error::AlreadyInstalled);

        let (tx, rx) = mpsc::channel();
        defer(Arc::new(Collect(parking_lot::Mutex::new(tx))), Error::AlreadyInstalled);
        let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(got.as_label(), "already_installed");
    }

    #[tokio::test]
    async fn test_defer_inside_runtime_spawns_task() {
        let (tx, rx) = mpsc::channel();
        let reporter: Arc<dyn Report> = Arc::new(Collect(parking_lot::Mutex::new(tx)));

        defer(reporter, Error::IndexExhausted { limit: 1 });
        assert!(rx.try_recv().is_err(), "report must not run synchronously");

        let mut got = None;
        for _ in 0..100 {
            tokio::task::yield_now().await;
            if let Ok(err) = rx.try_recv() {
                got = Some(err);
                break;
            }
        }
        assert_eq!(got.unwrap().as_label(), "index_exhausted");
    }
}
