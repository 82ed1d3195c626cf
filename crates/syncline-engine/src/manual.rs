//! Context handed to a source's manual job.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use serde_json::Value;
use syncline_sdk::context::{HttpContext, StreamContext};
use syncline_sdk::http::HttpClient;
use syncline_sdk::runner::ManualContext;
use syncline_sdk::writer::StreamWriter;
use syncline_types::error::ConnectorError;
use syncline_types::log::LogRecord;
use syncline_types::schema::Schema;
use tokio_util::sync::CancellationToken;

use crate::errors::RuntimeError;
use crate::protocol::Protocol;

type WriterHandle = Arc<Mutex<Box<dyn StreamWriter>>>;

/// Writer shared between the job's context and the engine, so the engine
/// can flush it after the job returns.
struct SharedWriter(WriterHandle);

impl SharedWriter {
    fn lock(&self) -> Result<MutexGuard<'_, Box<dyn StreamWriter>>, ConnectorError> {
        self.0
            .lock()
            .map_err(|_| ConnectorError::internal("WRITER_POISONED", "stream writer poisoned"))
    }
}

impl StreamWriter for SharedWriter {
    fn load_config(&self) -> Option<Bytes> {
        self.lock().ok()?.load_config()
    }

    fn load_state(&self) -> Option<Bytes> {
        self.lock().ok()?.load_state()
    }

    fn emit_records(&mut self, records: &[Value]) -> Result<(), ConnectorError> {
        self.lock()?.emit_records(records)
    }

    fn emit_state(&mut self, state: Value) -> Result<(), ConnectorError> {
        self.lock()?.emit_state(state)
    }

    fn emit_log(&mut self, entry: LogRecord) -> Result<(), ConnectorError> {
        self.lock()?.emit_log(entry)
    }

    fn flush(&mut self) -> Result<(), ConnectorError> {
        self.lock()?.flush()
    }
}

pub(crate) struct EngineManualContext {
    protocol: Arc<dyn Protocol>,
    client: Arc<dyn HttpClient>,
    cancel: CancellationToken,
    opened: Mutex<Vec<(String, WriterHandle)>>,
}

impl EngineManualContext {
    pub(crate) fn new(
        protocol: Arc<dyn Protocol>,
        client: Arc<dyn HttpClient>,
        cancel: CancellationToken,
    ) -> Self {
        Self { protocol, client, cancel, opened: Mutex::new(Vec::new()) }
    }

    /// Flush every writer the job opened. Returns the first failure.
    pub(crate) fn flush_all(&self) -> Result<(), ConnectorError> {
        let opened = self
            .opened
            .lock()
            .map_err(|_| ConnectorError::internal("WRITER_POISONED", "opened writers poisoned"))?;
        let mut first_error = None;
        for (stream, handle) in opened.iter() {
            let mut writer = SharedWriter(handle.clone());
            if let Err(e) = writer.flush() {
                tracing::error!(stream = %stream, error = %e, "Failed to flush manual stream");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl ManualContext for EngineManualContext {
    fn raw_config(&self) -> Option<Bytes> {
        self.protocol.session().load_config()
    }

    fn open(&self, schema: Arc<Schema>) -> Result<Option<Box<dyn HttpContext>>, ConnectorError> {
        let writer = self.protocol.open(schema.clone()).map_err(into_connector_error)?;
        let Some(writer) = writer else {
            return Ok(None);
        };
        let handle: WriterHandle = Arc::new(Mutex::new(writer));
        self.opened
            .lock()
            .map_err(|_| ConnectorError::internal("WRITER_POISONED", "opened writers poisoned"))?
            .push((schema.name.clone(), handle.clone()));
        tracing::debug!(stream = %schema.name, "Manual job opened stream");

        Ok(Some(Box::new(StreamContext::new(
            schema,
            Box::new(SharedWriter(handle)),
            self.client.clone(),
            self.cancel.clone(),
        ))))
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

fn into_connector_error(err: RuntimeError) -> ConnectorError {
    match err.as_connector_error() {
        Some(e) => e.clone(),
        None => ConnectorError::internal("OPEN_FAILED", err.to_string()),
    }
}
