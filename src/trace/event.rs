//! # Trace events and handler maps.
//!
//! Every tracing channel owns one sub-channel per [`TraceEvent`]. The sub-channel
//! of event `e` on tracing channel `X` is named `tracing:X:e`:
//!
//! ```text
//! tracing:X:start     before the operation runs (inside the start stores)
//! tracing:X:end       after the synchronous part returned or failed
//! tracing:X:asyncEnd  after the callback fired / the future settled
//! tracing:X:error     when the operation failed
//! ```

use std::fmt;
use std::str::FromStr;

use crate::channel::Subscriber;
use crate::error::Error;
use crate::name::ChannelName;

/// Lifecycle event of a traced operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    Start,
    End,
    AsyncEnd,
    Error,
}

impl TraceEvent {
    /// Every event, in sub-channel order.
    pub const ALL: [TraceEvent; 4] = [
        TraceEvent::Start,
        TraceEvent::End,
        TraceEvent::AsyncEnd,
        TraceEvent::Error,
    ];

    /// Returns the key used in sub-channel names.
    pub fn as_str(self) -> &'static str {
        match self {
            TraceEvent::Start => "start",
            TraceEvent::End => "end",
            TraceEvent::AsyncEnd => "asyncEnd",
            TraceEvent::Error => "error",
        }
    }

    /// Name of this event's sub-channel on the tracing channel `base`.
    ///
    /// Symbol bases render as `Symbol(desc)#id`, so symbols sharing a description
    /// still get distinct sub-channels.
    pub fn channel_name(self, base: &ChannelName) -> ChannelName {
        let event = self.as_str();
        match base {
            ChannelName::Str(name) => ChannelName::from(format!("tracing:{name}:{event}")),
            ChannelName::Symbol(sym) => {
                ChannelName::from(format!("tracing:{sym}#{}:{event}", sym.id()))
            }
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraceEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TraceEvent::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| Error::InvalidArgument {
                argument: "event",
                expected: "one of start, end, asyncEnd, error",
                received: format!("{s:?}"),
            })
    }
}

/// Map of trace events to subscribers, used to (un)subscribe a tracing channel.
///
/// Unset events are skipped. Keep the map (or clones of its subscribers) to
/// unsubscribe later.
///
/// ```rust
/// use diagbus::{Subscriber, TraceEvent, TraceHandlers};
///
/// let handlers = TraceHandlers::new()
///     .start(Subscriber::new(|_, _| {}))
///     .on(TraceEvent::Error, Subscriber::new(|_, _| {}));
/// assert!(handlers.get(TraceEvent::Start).is_some());
/// assert!(handlers.get(TraceEvent::End).is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct TraceHandlers {
    start: Option<Subscriber>,
    end: Option<Subscriber>,
    async_end: Option<Subscriber>,
    error: Option<Subscriber>,
}

impl TraceHandlers {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the handler of `event`.
    #[must_use]
    pub fn on(mut self, event: TraceEvent, subscriber: Subscriber) -> Self {
        *self.slot_mut(event) = Some(subscriber);
        self
    }

    /// Sets the `start` handler.
    #[must_use]
    pub fn start(self, subscriber: Subscriber) -> Self {
        self.on(TraceEvent::Start, subscriber)
    }

    /// Sets the `end` handler.
    #[must_use]
    pub fn end(self, subscriber: Subscriber) -> Self {
        self.on(TraceEvent::End, subscriber)
    }

    /// Sets the `asyncEnd` handler.
    #[must_use]
    pub fn async_end(self, subscriber: Subscriber) -> Self {
        self.on(TraceEvent::AsyncEnd, subscriber)
    }

    /// Sets the `error` handler.
    #[must_use]
    pub fn error(self, subscriber: Subscriber) -> Self {
        self.on(TraceEvent::Error, subscriber)
    }

    /// Returns the handler of `event`, if set.
    pub fn get(&self, event: TraceEvent) -> Option<&Subscriber> {
        match event {
            TraceEvent::Start => self.start.as_ref(),
            TraceEvent::End => self.end.as_ref(),
            TraceEvent::AsyncEnd => self.async_end.as_ref(),
            TraceEvent::Error => self.error.as_ref(),
        }
    }

    /// Iterates over the set handlers in event order.
    pub fn iter(&self) -> impl Iterator<Item = (TraceEvent, &Subscriber)> {
        TraceEvent::ALL
            .into_iter()
            .filter_map(move |e| self.get(e).map(|s| (e, s)))
    }

    fn slot_mut(&mut self, event: TraceEvent) -> &mut Option<Subscriber> {
        match event {
            TraceEvent::Start => &mut self.start,
            TraceEvent::End => &mut self.end,
            TraceEvent::AsyncEnd => &mut self.async_end,
            TraceEvent::Error => &mut self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Symbol;

    #[test]
    fn test_channel_names_are_bit_exact() {
        let base = ChannelName::from("http.client");
        let names: Vec<String> = TraceEvent::ALL
            .iter()
            .map(|e| e.channel_name(&base).to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "tracing:http.client:start",
                "tracing:http.client:end",
                "tracing:http.client:asyncEnd",
                "tracing:http.client:error",
            ]
        );
    }

    #[test]
    fn test_symbol_base_includes_identity() {
        let sym = Symbol::new("db");
        let base = ChannelName::from(sym.clone());
        let expected = format!("tracing:Symbol(db)#{}:start", sym.id());
        assert_eq!(
            TraceEvent::Start.channel_name(&base).as_str(),
            Some(expected.as_str())
        );
    }

    #[test]
    fn test_symbols_with_same_description_get_distinct_subchannels() {
        let a = ChannelName::from(Symbol::new("db"));
        let b = ChannelName::from(Symbol::new("db"));
        for event in TraceEvent::ALL {
            assert_ne!(event.channel_name(&a), event.channel_name(&b));
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!("asyncEnd".parse::<TraceEvent>().unwrap(), TraceEvent::AsyncEnd);
        let err = "async_end".parse::<TraceEvent>().unwrap_err();
        assert_eq!(err.as_label(), "invalid_argument");
    }

    #[test]
    fn test_iter_skips_unset_handlers() {
        let handlers = TraceHandlers::new()
            .error(Subscriber::new(|_, _| {}))
            .start(Subscriber::new(|_, _| {}));
        let events: Vec<TraceEvent> = handlers.iter().map(|(e, _)| e).collect();
        assert_eq!(events, vec![TraceEvent::Start, TraceEvent::Error]);
    }
}
