use crate::Error;
use docledger_core::{
    config::Config,
    dispatch::Dispatcher,
    error::{ErrorClass, ErrorOrigin, InternalError},
    ledger::memory::MemoryLedger,
    obs::{EventReport, metrics_report},
};
use std::{fs, path::Path};

///
/// Service
///
/// One configured record model served over the in-process reference
/// ledger. Embedders with their own ledger use `Dispatcher` directly.
///

#[derive(Debug)]
pub struct Service {
    config: Config,
    dispatcher: Dispatcher,
    ledger: MemoryLedger,
}

impl Service {
    pub fn new(config: Config) -> Result<Self, Error> {
        let dispatcher = Dispatcher::from_config(&config)?;
        let ledger = if config.ledger.rich_queries {
            MemoryLedger::with_rich_queries()
        } else {
            MemoryLedger::new()
        };

        tracing::info!(
            kind = %dispatcher.model().kind,
            rich_queries = config.ledger.rich_queries,
            operations = dispatcher.operations().count(),
            "service ready"
        );

        Ok(Self {
            config,
            dispatcher,
            ledger,
        })
    }

    pub fn from_toml_str(source: &str) -> Result<Self, Error> {
        let config = Config::from_toml_str(source).map_err(InternalError::from)?;

        Self::new(config)
    }

    /// Load a TOML config file and build the service from it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|err| {
            Error::new(
                ErrorClass::InvalidArgument,
                ErrorOrigin::Config,
                format!("cannot read {}: {err}", path.display()),
            )
        })?;

        Self::from_toml_str(&source)
    }

    /// Run one named operation.
    pub fn invoke(&mut self, op: &str, args: &[String]) -> Result<Vec<u8>, Error> {
        Ok(self.dispatcher.invoke(&mut self.ledger, op, args)?)
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub const fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    /// Counters accumulated on this thread.
    #[must_use]
    #[expect(clippy::unused_self)]
    pub fn metrics(&self) -> EventReport {
        metrics_report()
    }
}
