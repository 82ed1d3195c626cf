//! Output protocol adapters.
//!
//! A protocol owns the session for one command invocation and decides how
//! records, state, logs and metadata are encoded on the output. Adapters are
//! registered by format name in [`Protocols`]; `SETTINGS.format` picks one.

pub mod airbyte;
pub mod buffer;
pub mod singer;

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::sync::Arc;

use serde_json::json;
use syncline_sdk::writer::StreamWriter;
use syncline_types::command::Command;
use syncline_types::schema::Schema;
use syncline_types::spec::{ConnectionStatus, ConnectorSpecification};

use crate::errors::RuntimeError;
use crate::session::Session;

pub use airbyte::AirbyteProtocol;
pub use singer::SingerProtocol;

/// Builds a protocol around a decoded session.
pub type ProtocolFactory = fn(Session) -> Arc<dyn Protocol>;

/// One output encoding bound to a session.
pub trait Protocol: Send + Sync {
    fn session(&self) -> &Session;

    /// Open the output channel for `schema`.
    ///
    /// `None` means the stream is excluded by the allow-list and must be
    /// skipped without error.
    fn open(&self, schema: Arc<Schema>) -> Result<Option<Box<dyn StreamWriter>>, RuntimeError>;

    fn emit_spec(&self, spec: &ConnectorSpecification) -> Result<(), RuntimeError> {
        self.session()
            .sink()
            .encode(&json!({"type": "SPEC", "spec": spec}))
            .map_err(|e| RuntimeError::Connector(e.into()))
    }

    fn emit_status(&self, status: &ConnectionStatus) -> Result<(), RuntimeError> {
        self.session()
            .sink()
            .encode(&json!({"type": "CONNECTION_STATUS", "connection_status": status}))
            .map_err(|e| RuntimeError::Connector(e.into()))
    }

    /// Finish the session. Called exactly once per invocation.
    fn close(&self) -> Result<(), RuntimeError>;
}

/// Format name to protocol constructor.
#[derive(Clone)]
pub struct Protocols {
    factories: BTreeMap<String, ProtocolFactory>,
}

impl Default for Protocols {
    fn default() -> Self {
        let mut protocols = Self::empty();
        protocols.register("airbyte", AirbyteProtocol::create);
        protocols.register("singer", SingerProtocol::create);
        // Orchestrators that omit the format get the catalog protocol.
        protocols.register("", AirbyteProtocol::create);
        protocols
    }
}

impl Protocols {
    pub fn empty() -> Self {
        Self { factories: BTreeMap::new() }
    }

    /// Register (or replace) the protocol for `format`.
    pub fn register(&mut self, format: impl Into<String>, factory: ProtocolFactory) -> &mut Self {
        self.factories.insert(format.into(), factory);
        self
    }

    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str).filter(|f| !f.is_empty())
    }

    /// Decode the control stream and bind the requested protocol.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Control` if the control stream is invalid and
    /// `RuntimeError::UnsupportedFormat` if no protocol is registered for
    /// `SETTINGS.format`.
    pub fn open(
        &self,
        reader: impl BufRead,
        writer: impl Write + Send + 'static,
        command: Command,
    ) -> Result<Arc<dyn Protocol>, RuntimeError> {
        let session = Session::read(reader, writer, command)?;
        let format = session.settings().format.clone();
        let factory = self
            .factories
            .get(&format)
            .ok_or_else(|| RuntimeError::UnsupportedFormat(format.clone()))?;
        tracing::debug!(format = %format, %command, "Opened output protocol");
        Ok(factory(session))
    }
}

impl std::fmt::Debug for Protocols {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
