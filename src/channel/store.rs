//! # Store binding: running work inside ambient-context scopes.
//!
//! A [`Store`] is anything that can run a closure with an overridden ambient
//! context (an async-local storage, a task-local, a thread-local stack...). The
//! bus does not implement context propagation itself; it only composes the
//! stores bound to a channel around the instrumented call.
//!
//! ## Nesting
//! Stores wrap the call in binding order, the first bound store being the
//! outermost scope:
//! ```text
//! bind S1, bind S2
//!
//! S1.run(t1(data), || {
//!     S2.run(t2(data), || {
//!         f()
//!     })
//! })
//! ```
//! Each transform `tN` runs lazily, inside the scopes of the stores bound before it.

use std::fmt;
use std::sync::Arc;

use tokio::task::LocalKey;

use crate::channel::subscriber::Message;

/// Ambient-context scope provider.
///
/// `run` must invoke `scope` exactly once, with `value` installed as the ambient
/// context for the duration of the call, and restore the previous context after.
pub trait Store: Send + Sync + 'static {
    /// Runs `scope` with `value` as the ambient context.
    fn run(&self, value: &Message, scope: &mut dyn FnMut());

    /// Returns the store name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Maps the published message to the value a store should install.
pub type Transform = Arc<dyn Fn(&Message) -> Box<Message> + Send + Sync>;

/// Builds a [`Transform`] from a closure returning any message type.
///
/// ```rust
/// use diagbus::{transform, Message};
///
/// let t = transform(|m: &Message| m.downcast_ref::<u32>().map(|v| v + 1));
/// let out = t(&1u32);
/// assert_eq!(out.downcast_ref::<Option<u32>>(), Some(&Some(2)));
/// ```
pub fn transform<F, V>(f: F) -> Transform
where
    F: Fn(&Message) -> V + Send + Sync + 'static,
    V: std::any::Any + Send + Sync,
{
    Arc::new(move |m: &Message| -> Box<Message> { Box::new(f(m)) })
}

/// One store bound to a channel.
#[derive(Clone)]
pub(crate) struct StoreBinding {
    pub(crate) store: Arc<dyn Store>,
    /// `None` is the identity transform.
    pub(crate) transform: Option<Transform>,
}

impl StoreBinding {
    #[inline]
    pub(crate) fn is<S: Store + ?Sized>(&self, store: &Arc<S>) -> bool {
        same_store(&self.store, store)
    }
}

impl fmt::Debug for StoreBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBinding")
            .field("store", &self.store.name())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Compares two store handles by the address of the store they point to.
#[inline]
pub(crate) fn same_store<S: Store + ?Sized>(a: &Arc<dyn Store>, b: &Arc<S>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Runs `f` nested inside every binding, first binding outermost.
///
/// # Panics
/// Panics if a store returns from `run` without having invoked its scope.
pub(crate) fn run_scoped<R>(bindings: &[StoreBinding], data: &Message, f: impl FnOnce() -> R) -> R {
    let mut f = Some(f);
    let mut out = None;
    {
        let mut call = || {
            if let Some(f) = f.take() {
                out = Some(f());
            }
        };
        nest(bindings, data, &mut call);
    }
    match out {
        Some(out) => out,
        None => panic!("a bound store returned without running its scope"),
    }
}

fn nest(bindings: &[StoreBinding], data: &Message, next: &mut dyn FnMut()) {
    let Some((binding, inner)) = bindings.split_first() else {
        return next();
    };
    let transformed;
    let value: &Message = match &binding.transform {
        Some(transform) => {
            transformed = transform(data);
            &*transformed
        }
        None => data,
    };
    binding
        .store
        .run(value, &mut || nest(inner, data, &mut *next));
}

/// [`Store`] backed by a `tokio::task_local!` key.
///
/// The value handed to the store is downcast to `T` and cloned into the scope via
/// [`LocalKey::sync_scope`]. A value of another type runs the scope without
/// overriding the context.
///
/// ```rust
/// use std::sync::Arc;
/// use diagbus::{Channel, TaskLocalStore};
///
/// tokio::task_local! {
///     static REQUEST_ID: u64;
/// }
///
/// let ch = Channel::new("http.request");
/// ch.bind_store(Arc::new(TaskLocalStore::new(&REQUEST_ID)), None);
///
/// let seen = ch.run_stores(&7u64, || REQUEST_ID.get());
/// assert_eq!(seen, 7);
/// ```
pub struct TaskLocalStore<T: 'static> {
    key: &'static LocalKey<T>,
}

impl<T: 'static> TaskLocalStore<T> {
    /// Wraps a task-local key.
    pub fn new(key: &'static LocalKey<T>) -> Self {
        Self { key }
    }
}

impl<T> Store for TaskLocalStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn run(&self, value: &Message, scope: &mut dyn FnMut()) {
        match value.downcast_ref::<T>() {
            Some(v) => self.key.sync_scope(v.clone(), scope),
            None => {
                tracing::debug!(
                    store = self.name(),
                    expected = std::any::type_name::<T>(),
                    "message type mismatch; running scope without context"
                );
                scope()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records enter/exit markers into a shared log.
    struct Tracer {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Store for Tracer {
        fn run(&self, value: &Message, scope: &mut dyn FnMut()) {
            let v = value.downcast_ref::<i32>().copied().unwrap_or(-1);
            self.log.lock().push(format!("enter {} {}", self.label, v));
            scope();
            self.log.lock().push(format!("exit {}", self.label));
        }
    }

    fn binding(label: &'static str, log: &Arc<Mutex<Vec<String>>>, transform: Option<Transform>) -> StoreBinding {
        StoreBinding {
            store: Arc::new(Tracer {
                label,
                log: Arc::clone(log),
            }),
            transform,
        }
    }

    #[test]
    fn test_first_binding_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bindings = vec![binding("s1", &log, None), binding("s2", &log, None)];

        let inner_log = Arc::clone(&log);
        let out = run_scoped(&bindings, &5i32, move || {
            inner_log.lock().push("call".to_string());
            42
        });

        assert_eq!(out, 42);
        assert_eq!(
            *log.lock(),
            vec!["enter s1 5", "enter s2 5", "call", "exit s2", "exit s1"]
        );
    }

    #[test]
    fn test_transform_applies_per_store() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let double = transform(|m: &Message| m.downcast_ref::<i32>().copied().unwrap_or(0) * 2);
        let bindings = vec![binding("s1", &log, Some(double)), binding("s2", &log, None)];

        run_scoped(&bindings, &3i32, || ());

        assert_eq!(log.lock()[0], "enter s1 6");
        assert_eq!(log.lock()[1], "enter s2 3");
    }

    #[test]
    fn test_no_bindings_calls_directly() {
        assert_eq!(run_scoped(&[], &(), || "direct"), "direct");
    }

    #[test]
    #[should_panic(expected = "without running its scope")]
    fn test_store_that_skips_scope_panics() {
        struct Skip;
        impl Store for Skip {
            fn run(&self, _value: &Message, _scope: &mut dyn FnMut()) {}
        }
        let bindings = vec![StoreBinding {
            store: Arc::new(Skip),
            transform: None,
        }];
        run_scoped(&bindings, &(), || ());
    }

    tokio::task_local! {
        static TENANT: String;
    }

    #[test]
    fn test_task_local_store_scopes_value() {
        let bindings = vec![StoreBinding {
            store: Arc::new(TaskLocalStore::new(&TENANT)),
            transform: None,
        }];
        let seen = run_scoped(&bindings, &String::from("acme"), || TENANT.get());
        assert_eq!(seen, "acme");
        assert!(TENANT.try_with(|_| ()).is_err(), "scope must be restored");
    }

    #[test]
    fn test_task_local_store_ignores_other_types() {
        let bindings = vec![StoreBinding {
            store: Arc::new(TaskLocalStore::new(&TENANT)),
            transform: None,
        }];
        let set = run_scoped(&bindings, &1u8, || TENANT.try_with(|_| ()).is_ok());
        assert!(!set);
    }
}
