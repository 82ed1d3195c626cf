//! Streaming protocol.
//!
//! Each stream announces itself with a `SCHEMA` message when it opens.
//! State and log messages are written as soon as they are emitted, after
//! any pending records of the same stream, so a checkpoint never precedes
//! the records it covers.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use syncline_sdk::writer::StreamWriter;
use syncline_types::error::ConnectorError;
use syncline_types::log::LogRecord;
use syncline_types::schema::{FieldDef, Schema};

use super::buffer::RecordBuffer;
use super::Protocol;
use crate::errors::RuntimeError;
use crate::session::{ConfigStore, Session};

#[derive(Serialize)]
struct SchemaMessage<'a> {
    #[serde(rename = "type")]
    ty: &'static str,
    stream: &'a str,
    schema: &'a Value,
    key_properties: Vec<&'a str>,
    order_by_properties: Vec<&'a str>,
}

#[derive(Serialize)]
struct RecordMessage<'a> {
    #[serde(rename = "type")]
    ty: &'static str,
    stream: &'a str,
    time_extracted: i64,
    record: &'a Value,
}

pub struct SingerProtocol {
    session: Session,
}

impl SingerProtocol {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn create(session: Session) -> Arc<dyn Protocol> {
        Arc::new(Self::new(session))
    }
}

fn top_level_names(keys: &[FieldDef]) -> Vec<&str> {
    keys.iter().filter_map(FieldDef::top_level).collect()
}

impl Protocol for SingerProtocol {
    fn session(&self) -> &Session {
        &self.session
    }

    fn open(&self, schema: Arc<Schema>) -> Result<Option<Box<dyn StreamWriter>>, RuntimeError> {
        if !self.session.settings().allows(&schema.name) {
            return Ok(None);
        }
        self.session
            .sink()
            .encode(&SchemaMessage {
                ty: "SCHEMA",
                stream: &schema.name,
                schema: &schema.json_schema,
                key_properties: top_level_names(&schema.primary_key),
                order_by_properties: top_level_names(&schema.order_by_key),
            })
            .map_err(|e| RuntimeError::Connector(e.into()))?;

        Ok(Some(Box::new(SingerWriter {
            stream: schema.name.clone(),
            store: self.session.store().clone(),
            buffer: RecordBuffer::new(self.session.sink().clone()),
        })))
    }

    fn close(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

struct SingerWriter {
    stream: String,
    store: Arc<ConfigStore>,
    buffer: RecordBuffer,
}

impl StreamWriter for SingerWriter {
    fn load_config(&self) -> Option<Bytes> {
        self.store.config()
    }

    fn load_state(&self) -> Option<Bytes> {
        self.store.state(&self.stream)
    }

    fn emit_records(&mut self, records: &[Value]) -> Result<(), ConnectorError> {
        let time_extracted = Utc::now().timestamp();
        for record in records {
            self.buffer.push(&RecordMessage {
                ty: "RECORD",
                stream: &self.stream,
                time_extracted,
                record,
            })?;
        }
        if self.buffer.flush(false)? {
            tracing::debug!(stream = %self.stream, "Wrote record buffer through");
        }
        Ok(())
    }

    fn emit_state(&mut self, state: Value) -> Result<(), ConnectorError> {
        self.buffer.flush(true)?;
        self.buffer
            .sink()
            .encode(&json!({"type": "STATE", "stream": self.stream, "state": state}))?;
        Ok(())
    }

    fn emit_log(&mut self, entry: LogRecord) -> Result<(), ConnectorError> {
        self.buffer.flush(true)?;
        self.buffer.sink().encode(&json!({
            "type": "LOG",
            "timestamp": Utc::now().to_rfc3339(),
            "stream": self.stream,
            "log": {"level": entry.level, "message": entry.payload},
        }))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConnectorError> {
        self.buffer.flush(true)?;
        Ok(())
    }
}
