//! Process-wide registry and the free functions that use it.

use std::sync::OnceLock;

use crate::channel::{Channel, Subscriber};
use crate::config::Config;
use crate::error::Error;
use crate::name::{ChannelName, NameRef};
use crate::registry::registry::Registry;
use crate::trace::TracingChannel;

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Returns the process-wide registry, creating it with [`Config::default`] on first use.
pub fn global() -> &'static Registry {
    GLOBAL.get_or_init(Registry::new)
}

/// Installs the process-wide registry with `config`.
///
/// Must run before anything touches the global registry.
///
/// # Errors
/// [`Error::AlreadyInstalled`] if the registry already exists.
pub fn install(config: Config) -> Result<&'static Registry, Error> {
    GLOBAL
        .set(Registry::with_config(config))
        .map_err(|_| Error::AlreadyInstalled)?;
    Ok(global())
}

/// [`Registry::channel`] on the process-wide registry.
pub fn channel(name: impl Into<ChannelName>) -> Channel {
    global().channel(name)
}

/// [`Registry::has_subscribers`] on the process-wide registry.
#[inline]
pub fn has_subscribers<'a>(name: impl Into<NameRef<'a>>) -> bool {
    global().has_subscribers(name)
}

/// [`Registry::subscribe`] on the process-wide registry.
pub fn subscribe(name: impl Into<ChannelName>, subscriber: &Subscriber) {
    global().subscribe(name, subscriber)
}

/// [`Registry::unsubscribe`] on the process-wide registry.
pub fn unsubscribe<'a>(name: impl Into<NameRef<'a>>, subscriber: &Subscriber) -> bool {
    global().unsubscribe(name, subscriber)
}

/// [`Registry::tracing_channel`] on the process-wide registry.
pub fn tracing_channel(name: impl Into<ChannelName>) -> TracingChannel {
    global().tracing_channel(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_after_first_use_fails() {
        let _ = global();
        let err = install(Config::default()).unwrap_err();
        assert!(matches!(err, Error::AlreadyInstalled));
    }

    #[test]
    fn test_free_functions_share_one_registry() {
        let sub = Subscriber::new(|_, _| {});
        subscribe("diagbus.test.global", &sub);
        assert!(has_subscribers("diagbus.test.global"));
        assert!(channel("diagbus.test.global").has_subscribers());
        assert!(unsubscribe("diagbus.test.global", &sub));
        assert!(!has_subscribers("diagbus.test.global"));
    }
}
