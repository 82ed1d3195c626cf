//! Named connector sources available to a binary.

use std::collections::BTreeMap;
use std::sync::Arc;

use syncline_types::error::ConnectorError;

use crate::errors::RuntimeError;
use crate::source::Source;

/// Connector name to source. Built once by the binary and passed around
/// explicitly.
#[derive(Debug, Default)]
pub struct Registry {
    sources: BTreeMap<String, Arc<Source>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validated source under `name`.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken or the source does not validate.
    pub fn register(&mut self, name: impl Into<String>, source: Source) -> Result<(), RuntimeError> {
        let name = name.into();
        if self.sources.contains_key(&name) {
            return Err(RuntimeError::Validation(ConnectorError::config(
                "DUPLICATE_CONNECTOR",
                format!("connector '{name}' is already registered"),
            )));
        }
        source.validate()?;
        tracing::debug!(connector = %name, streams = source.definitions().len(), "Registered connector");
        self.sources.insert(name, Arc::new(source));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Source>> {
        self.sources.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Source>)> {
        self.sources.iter().map(|(name, source)| (name.as_str(), source))
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
