//! # Channel names.
//!
//! A channel is identified either by a string or by a [`Symbol`]. Symbols are
//! process-unique: two symbols created with the same description are distinct
//! names, which lets libraries publish on channels nobody else can guess.
//!
//! [`NameRef`] is the borrowed form used for lookups so that hot-path checks such
//! as [`Registry::has_subscribers`](crate::Registry::has_subscribers) never allocate.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::error::Error;

/// Global sequence for symbol identities.
static SYMBOL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique, optionally described identifier usable as a channel name.
#[derive(Clone, Debug)]
pub struct Symbol {
    id: u64,
    description: Option<Arc<str>>,
}

impl Symbol {
    /// Creates a new unique symbol with a description (used only for display).
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self {
            id: SYMBOL_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            description: Some(description.into()),
        }
    }

    /// Creates a new unique symbol without a description.
    pub fn anonymous() -> Self {
        Self {
            id: SYMBOL_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            description: None,
        }
    }

    /// Returns the description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Process-unique identity of this symbol.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description.as_deref().unwrap_or(""))
    }
}

/// Name of a channel: a string or a [`Symbol`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChannelName {
    /// Plain string name, e.g. `"http.client.request"`.
    Str(Arc<str>),
    /// Unique symbol name.
    Symbol(Symbol),
}

impl ChannelName {
    /// Converts a dynamically typed value into a channel name.
    ///
    /// Accepts `&'static str`, `String`, `Arc<str>`, [`Symbol`] and `ChannelName`;
    /// anything else fails with [`Error::InvalidArgument`].
    ///
    /// # Example
    /// ```
    /// use diagbus::{ChannelName, Error};
    ///
    /// assert!(ChannelName::from_any(&"db.query").is_ok());
    /// assert!(matches!(
    ///     ChannelName::from_any(&42u32),
    ///     Err(Error::InvalidArgument { .. })
    /// ));
    /// ```
    pub fn from_any(value: &dyn Any) -> Result<Self, Error> {
        if let Some(s) = value.downcast_ref::<&'static str>() {
            Ok(ChannelName::from(*s))
        } else if let Some(s) = value.downcast_ref::<String>() {
            Ok(ChannelName::from(s.as_str()))
        } else if let Some(s) = value.downcast_ref::<Arc<str>>() {
            Ok(ChannelName::Str(Arc::clone(s)))
        } else if let Some(sym) = value.downcast_ref::<Symbol>() {
            Ok(ChannelName::Symbol(sym.clone()))
        } else if let Some(name) = value.downcast_ref::<ChannelName>() {
            Ok(name.clone())
        } else {
            Err(Error::InvalidArgument {
                argument: "name",
                expected: "string or symbol",
                received: "a value of another type".to_string(),
            })
        }
    }

    /// Borrowed view used for lookups.
    #[inline]
    pub fn as_name_ref(&self) -> NameRef<'_> {
        match self {
            ChannelName::Str(s) => NameRef::Str(s),
            ChannelName::Symbol(sym) => NameRef::Symbol(sym),
        }
    }

    /// Returns the string form, or `None` for symbols.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ChannelName::Str(s) => Some(s),
            ChannelName::Symbol(_) => None,
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelName::Str(s) => f.write_str(s),
            ChannelName::Symbol(sym) => sym.fmt(f),
        }
    }
}

impl From<&str> for ChannelName {
    fn from(s: &str) -> Self {
        ChannelName::Str(Arc::from(s))
    }
}

impl From<String> for ChannelName {
    fn from(s: String) -> Self {
        ChannelName::Str(Arc::from(s))
    }
}

impl From<Arc<str>> for ChannelName {
    fn from(s: Arc<str>) -> Self {
        ChannelName::Str(s)
    }
}

impl From<Symbol> for ChannelName {
    fn from(sym: Symbol) -> Self {
        ChannelName::Symbol(sym)
    }
}

impl From<&Symbol> for ChannelName {
    fn from(sym: &Symbol) -> Self {
        ChannelName::Symbol(sym.clone())
    }
}

impl From<&ChannelName> for ChannelName {
    fn from(name: &ChannelName) -> Self {
        name.clone()
    }
}

/// Borrowed channel name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameRef<'a> {
    Str(&'a str),
    Symbol(&'a Symbol),
}

impl NameRef<'_> {
    /// Converts into an owned [`ChannelName`] (allocates for strings).
    pub fn to_owned_name(self) -> ChannelName {
        match self {
            NameRef::Str(s) => ChannelName::from(s),
            NameRef::Symbol(sym) => ChannelName::Symbol(sym.clone()),
        }
    }
}

impl<'a> From<&'a str> for NameRef<'a> {
    fn from(s: &'a str) -> Self {
        NameRef::Str(s)
    }
}

impl<'a> From<&'a String> for NameRef<'a> {
    fn from(s: &'a String) -> Self {
        NameRef::Str(s.as_str())
    }
}

impl<'a> From<&'a Symbol> for NameRef<'a> {
    fn from(sym: &'a Symbol) -> Self {
        NameRef::Symbol(sym)
    }
}

impl<'a> From<&'a ChannelName> for NameRef<'a> {
    fn from(name: &'a ChannelName) -> Self {
        name.as_name_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_with_same_description_differ() {
        let a = Symbol::new("net");
        let b = Symbol::new("net");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(ChannelName::from(&a), ChannelName::from(&b));
    }

    #[test]
    fn test_display() {
        assert_eq!(ChannelName::from("db.query").to_string(), "db.query");
        assert_eq!(ChannelName::from(Symbol::new("x")).to_string(), "Symbol(x)");
        assert_eq!(Symbol::anonymous().to_string(), "Symbol()");
    }

    #[test]
    fn test_from_any_accepts_strings_and_symbols() {
        let owned = String::from("a");
        assert_eq!(ChannelName::from_any(&owned).unwrap(), ChannelName::from("a"));
        let arc: Arc<str> = Arc::from("b");
        assert_eq!(ChannelName::from_any(&arc).unwrap(), ChannelName::from("b"));
        let sym = Symbol::new("c");
        assert_eq!(
            ChannelName::from_any(&sym).unwrap(),
            ChannelName::Symbol(sym.clone())
        );
    }

    #[test]
    fn test_from_any_rejects_other_types() {
        let err = ChannelName::from_any(&1.5f64).unwrap_err();
        assert_eq!(err.as_label(), "invalid_argument");
    }

    #[test]
    fn test_name_ref_roundtrip_to_owned() {
        let name = ChannelName::from("x");
        assert_eq!(name.as_name_ref(), NameRef::Str("x"));
        assert_eq!(name.as_name_ref().to_owned_name(), name);
    }
}
