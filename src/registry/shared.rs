//! State shared by a registry and every channel it created.

use std::sync::Arc;

use crate::config::Config;
use crate::error::Error;
use crate::registry::index::IndexTable;
use crate::report::{self, Report};

pub(crate) struct Shared {
    reporter: Arc<dyn Report>,
    pub(crate) index: IndexTable,
}

impl Shared {
    pub(crate) fn new(config: &Config) -> Arc<Self> {
        Arc::new(Self {
            reporter: Arc::clone(&config.reporter),
            index: IndexTable::new(config.index_capacity_clamped()),
        })
    }

    /// Hands `error` to the reporter on a later tick.
    pub(crate) fn report(&self, error: Error) {
        report::defer(Arc::clone(&self.reporter), error);
    }
}
