//! # Anchored name table.
//!
//! [`Table`] maps names to weakly held objects (channels or tracing channels).
//! Each object carries an [`Anchor`] (its table [`Entry`]) and reports every
//! subscriber/store it gains or loses to it:
//!
//! ```text
//! inc_ref ─► count 0→1 ─► pin object, (re)register name
//! dec_ref ─► count 1→0 ─► unpin object, evict name
//! drop    ─► object gone ─► forget name
//! ```
//!
//! ## Rules
//! - Eviction happens synchronously when the count reaches zero, not when the
//!   object is eventually dropped.
//! - An evicted object that becomes active again re-registers itself, unless the
//!   name was taken by another live object in the meantime.
//! - Entries only ever remove themselves (pointer identity is checked).
//! - No `Arc<T>` is dropped while the table lock is held: `T`'s `Drop` calls back
//!   into the table.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::name::{ChannelName, NameRef, Symbol};
use crate::registry::weak::WeakRef;

/// Liveness hook an anchored object reports its references to.
pub(crate) trait Anchor: Send + Sync + 'static {
    /// A subscriber or store was attached.
    fn inc_ref(&self);
    /// A subscriber or store was detached.
    fn dec_ref(&self);
    /// The anchored object is being dropped.
    fn forget(&self);
}

/// Anchor of an object that is not registered anywhere.
pub(crate) struct Detached;

impl Anchor for Detached {
    fn inc_ref(&self) {}
    fn dec_ref(&self) {}
    fn forget(&self) {}
}

/// Registration of one object under one name.
pub(crate) struct Entry<T> {
    name: ChannelName,
    target: WeakRef<T>,
    table: Weak<Table<T>>,
    me: Weak<Entry<T>>,
}

impl<T: Send + Sync + 'static> Anchor for Entry<T> {
    fn inc_ref(&self) {
        if self.target.inc_ref() == 1 {
            if let (Some(table), Some(me)) = (self.table.upgrade(), self.me.upgrade()) {
                table.restore(me);
            }
        }
    }

    fn dec_ref(&self) {
        let (count, released) = self.target.dec_ref();
        if count == 0 {
            if let Some(table) = self.table.upgrade() {
                table.evict(self);
            }
        }
        drop(released);
    }

    fn forget(&self) {
        if let Some(table) = self.table.upgrade() {
            table.forget(self);
        }
    }
}

struct Slots<T> {
    strs: HashMap<Arc<str>, Arc<Entry<T>>>,
    symbols: HashMap<Symbol, Arc<Entry<T>>>,
}

impl<T> Slots<T> {
    fn get(&self, name: NameRef<'_>) -> Option<&Arc<Entry<T>>> {
        match name {
            NameRef::Str(s) => self.strs.get(s),
            NameRef::Symbol(sym) => self.symbols.get(sym),
        }
    }

    fn insert(&mut self, name: ChannelName, entry: Arc<Entry<T>>) -> Option<Arc<Entry<T>>> {
        match name {
            ChannelName::Str(s) => self.strs.insert(s, entry),
            ChannelName::Symbol(sym) => self.symbols.insert(sym, entry),
        }
    }

    fn remove(&mut self, name: NameRef<'_>) -> Option<Arc<Entry<T>>> {
        match name {
            NameRef::Str(s) => self.strs.remove(s),
            NameRef::Symbol(sym) => self.symbols.remove(sym),
        }
    }

    fn values(&self) -> impl Iterator<Item = &Arc<Entry<T>>> {
        self.strs.values().chain(self.symbols.values())
    }
}

/// Name → weakly held object table.
pub(crate) struct Table<T> {
    slots: RwLock<Slots<T>>,
}

impl<T: Send + Sync + 'static> Table<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            slots: RwLock::new(Slots {
                strs: HashMap::new(),
                symbols: HashMap::new(),
            }),
        })
    }

    /// Returns the live object registered under `name`.
    pub(crate) fn get(&self, name: NameRef<'_>) -> Option<Arc<T>> {
        self.slots.read().get(name).and_then(|e| e.target.get())
    }

    /// Reference count of the entry registered under `name` (0 if none).
    pub(crate) fn count(&self, name: NameRef<'_>) -> usize {
        self.slots.read().get(name).map_or(0, |e| e.target.count())
    }

    /// Number of registered entries whose object is alive.
    pub(crate) fn live(&self) -> usize {
        self.slots.read().values().filter(|e| e.target.is_live()).count()
    }

    /// Returns the live object for `name`, building and registering one if needed.
    ///
    /// `build` receives the anchor the new object must report its references to.
    pub(crate) fn get_or_create<F>(self: &Arc<Self>, name: ChannelName, build: F) -> Arc<T>
    where
        F: FnOnce(ChannelName, Arc<dyn Anchor>) -> T,
    {
        if let Some(found) = self.get(name.as_name_ref()) {
            return found;
        }

        let mut slots = self.slots.write();
        if let Some(found) = slots.get(name.as_name_ref()).and_then(|e| e.target.get()) {
            return found;
        }

        let mut created = None;
        let target = Arc::new_cyclic(|weak| {
            let entry = Arc::new_cyclic(|me| Entry {
                name: name.clone(),
                target: WeakRef::new(weak.clone()),
                table: Arc::downgrade(self),
                me: me.clone(),
            });
            created = Some(Arc::clone(&entry));
            build(name.clone(), entry)
        });

        let replaced = created.and_then(|entry| slots.insert(name, entry));
        drop(slots);
        drop(replaced);
        target
    }

    /// Re-registers an entry that became active again.
    fn restore(&self, entry: Arc<Entry<T>>) {
        let mut slots = self.slots.write();
        let replaced = match slots.get(entry.name.as_name_ref()) {
            Some(existing) if Arc::ptr_eq(existing, &entry) => return,
            Some(existing) if existing.target.is_live() => {
                tracing::debug!(
                    name = %entry.name,
                    "name taken by another live object; not re-registering"
                );
                return;
            }
            _ => slots.insert(entry.name.clone(), entry),
        };
        drop(slots);
        drop(replaced);
    }

    /// Removes `entry` if it is still the registered one.
    fn evict(&self, entry: &Entry<T>) {
        self.remove_if(entry, |_| true);
    }

    /// Removes `entry` once its object is gone.
    fn forget(&self, entry: &Entry<T>) {
        self.remove_if(entry, |e| !e.target.is_live());
    }

    fn remove_if(&self, entry: &Entry<T>, pred: impl FnOnce(&Entry<T>) -> bool) {
        let mut slots = self.slots.write();
        let is_registered = slots
            .get(entry.name.as_name_ref())
            .is_some_and(|existing| std::ptr::eq(Arc::as_ptr(existing), entry));
        let removed = if is_registered && pred(entry) {
            slots.remove(entry.name.as_name_ref())
        } else {
            None
        };
        drop(slots);
        drop(removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal anchored object for table tests.
    struct Probe {
        anchor: Arc<dyn Anchor>,
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            self.anchor.forget();
        }
    }

    fn probe(table: &Arc<Table<Probe>>, name: &str) -> Arc<Probe> {
        table.get_or_create(ChannelName::from(name), |_, anchor| Probe { anchor })
    }

    #[test]
    fn test_same_object_while_held() {
        let table = Table::new();
        let a = probe(&table, "x");
        let b = probe(&table, "x");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.live(), 1);
    }

    #[test]
    fn test_dropped_object_is_forgotten() {
        let table = Table::new();
        let a = probe(&table, "x");
        drop(a);
        assert_eq!(table.live(), 0);
        assert!(table.get(NameRef::Str("x")).is_none());
        assert!(table.slots.read().get(NameRef::Str("x")).is_none());
    }

    #[test]
    fn test_counted_object_survives_handle_drop() {
        let table = Table::new();
        let a = probe(&table, "x");
        a.anchor.inc_ref();
        let weak = Arc::downgrade(&a);
        drop(a);

        let pinned = table.get(NameRef::Str("x")).unwrap();
        assert_eq!(table.count(NameRef::Str("x")), 1);
        pinned.anchor.dec_ref();
        drop(pinned);

        assert!(weak.upgrade().is_none());
        assert_eq!(table.live(), 0);
    }

    #[test]
    fn test_zero_count_evicts_eagerly_and_reactivation_restores() {
        let table = Table::new();
        let a = probe(&table, "x");
        a.anchor.inc_ref();
        a.anchor.dec_ref();
        assert!(table.get(NameRef::Str("x")).is_none(), "evicted at zero");

        a.anchor.inc_ref();
        let again = table.get(NameRef::Str("x")).unwrap();
        assert!(Arc::ptr_eq(&a, &again));
        drop(again);
        a.anchor.dec_ref();
    }

    #[test]
    fn test_restore_does_not_steal_live_name() {
        let table = Table::new();
        let old = probe(&table, "x");
        old.anchor.inc_ref();
        old.anchor.dec_ref();

        let new = probe(&table, "x");
        assert!(!Arc::ptr_eq(&old, &new));

        old.anchor.inc_ref();
        let found = table.get(NameRef::Str("x")).unwrap();
        assert!(Arc::ptr_eq(&found, &new));
        drop(found);
        old.anchor.dec_ref();
    }

    #[test]
    fn test_symbol_names_are_distinct() {
        let table = Table::new();
        let s1 = Symbol::new("x");
        let s2 = Symbol::new("x");
        let a = table.get_or_create(ChannelName::from(&s1), |_, anchor| Probe { anchor });
        let b = table.get_or_create(ChannelName::from(&s2), |_, anchor| Probe { anchor });
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(table.live(), 2);
    }
}
