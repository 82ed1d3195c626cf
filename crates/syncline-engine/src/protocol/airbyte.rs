//! Catalog-oriented protocol.
//!
//! Records are written as they are produced. State is held per stream and
//! emitted once, aggregated, when the session closes after `read`; `discover`
//! closes with one `CATALOG` message listing every opened stream.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use syncline_sdk::writer::StreamWriter;
use syncline_types::catalog::{Catalog, CatalogStream};
use syncline_types::command::Command;
use syncline_types::error::ConnectorError;
use syncline_types::log::LogRecord;
use syncline_types::schema::Schema;

use super::buffer::RecordBuffer;
use super::Protocol;
use crate::errors::RuntimeError;
use crate::session::{ConfigStore, Session};

type StateMap = Arc<Mutex<BTreeMap<String, Value>>>;

#[derive(Serialize)]
struct RecordMessage<'a> {
    #[serde(rename = "type")]
    ty: &'static str,
    record: RecordBody<'a>,
}

#[derive(Serialize)]
struct RecordBody<'a> {
    stream: &'a str,
    emitted_at: i64,
    data: &'a Value,
}

pub struct AirbyteProtocol {
    session: Session,
    schemas: Mutex<Vec<Arc<Schema>>>,
    states: StateMap,
}

impl AirbyteProtocol {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            schemas: Mutex::new(Vec::new()),
            states: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn create(session: Session) -> Arc<dyn Protocol> {
        Arc::new(Self::new(session))
    }

    fn emit_catalog(&self) -> Result<(), RuntimeError> {
        let schemas = lock(&self.schemas)?;
        let catalog = Catalog {
            streams: schemas.iter().map(|s| CatalogStream::from(s.as_ref())).collect(),
        };
        self.session
            .sink()
            .encode(&json!({"type": "CATALOG", "catalog": catalog}))
            .map_err(|e| RuntimeError::Connector(e.into()))
    }

    fn emit_states(&self) -> Result<(), RuntimeError> {
        let states = lock(&self.states)?;
        self.session
            .sink()
            .encode(&json!({"type": "STATE", "state": &*states}))
            .map_err(|e| RuntimeError::Connector(e.into()))
    }
}

impl Protocol for AirbyteProtocol {
    fn session(&self) -> &Session {
        &self.session
    }

    fn open(&self, schema: Arc<Schema>) -> Result<Option<Box<dyn StreamWriter>>, RuntimeError> {
        if !self.session.settings().allows(&schema.name) {
            return Ok(None);
        }
        lock(&self.schemas)?.push(schema.clone());
        Ok(Some(Box::new(AirbyteWriter {
            stream: schema.name.clone(),
            store: self.session.store().clone(),
            buffer: RecordBuffer::new(self.session.sink().clone()),
            states: self.states.clone(),
        })))
    }

    fn close(&self) -> Result<(), RuntimeError> {
        match self.session.command() {
            Command::Discover => self.emit_catalog(),
            Command::Read => self.emit_states(),
            Command::Spec | Command::Check => Ok(()),
        }
    }
}

struct AirbyteWriter {
    stream: String,
    store: Arc<ConfigStore>,
    buffer: RecordBuffer,
    states: StateMap,
}

impl StreamWriter for AirbyteWriter {
    fn load_config(&self) -> Option<Bytes> {
        self.store.config()
    }

    fn load_state(&self) -> Option<Bytes> {
        self.store.state(&self.stream)
    }

    fn emit_records(&mut self, records: &[Value]) -> Result<(), ConnectorError> {
        let emitted_at = Utc::now().timestamp_millis();
        for data in records {
            self.buffer.push(&RecordMessage {
                ty: "RECORD",
                record: RecordBody { stream: &self.stream, emitted_at, data },
            })?;
        }
        if self.buffer.flush(false)? {
            tracing::debug!(stream = %self.stream, "Wrote record buffer through");
        }
        Ok(())
    }

    fn emit_state(&mut self, state: Value) -> Result<(), ConnectorError> {
        self.states
            .lock()
            .map_err(|_| ConnectorError::internal("STATE_POISONED", "state map poisoned"))?
            .insert(self.stream.clone(), state);
        Ok(())
    }

    fn emit_log(&mut self, entry: LogRecord) -> Result<(), ConnectorError> {
        self.buffer.sink().encode(&json!({
            "type": "LOG",
            "log": {
                "level": entry.level,
                "message": entry.payload.to_text(),
                "stream": self.stream,
            },
        }))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConnectorError> {
        self.buffer.flush(true)?;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RuntimeError> {
    mutex
        .lock()
        .map_err(|_| RuntimeError::Infrastructure(anyhow::anyhow!("protocol state poisoned")))
}
