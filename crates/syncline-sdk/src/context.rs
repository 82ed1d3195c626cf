//! Stream execution context.
//!
//! A [`StreamContext`] binds one stream's schema, its writer, the HTTP client
//! and the run's cancellation token into the object a runner works against.
//! Runners see it through the object-safe [`GeneralContext`] and
//! [`HttpContext`] traits; typed helpers live on [`ContextExt`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use syncline_types::error::ConnectorError;
use syncline_types::log::LogRecord;
use syncline_types::schema::Schema;
use tokio_util::sync::CancellationToken;

use crate::decode::{decode_config, decode_state};
use crate::http::{HttpClient, JsonResponse, Request};
use crate::writer::StreamWriter;

/// Operations available to every runner shape.
///
/// ```ignore
/// let (config, state): (ApiConfig, Option<Cursor>) = ctx.load()?;
/// ctx.emit_records(vec![json!({"id": 1})])?;
/// ctx.checkpoint(&Cursor { offset: 1 })?;
/// ```
pub trait GeneralContext: Send {
    fn schema(&self) -> &Arc<Schema>;

    fn stream_name(&self) -> &str {
        &self.schema().name
    }

    /// Raw configuration bytes.
    fn raw_config(&self) -> Option<Bytes>;

    /// Raw state bytes for this stream.
    fn raw_state(&self) -> Option<Bytes>;

    fn emit_records(&mut self, records: Vec<Value>) -> Result<(), ConnectorError>;

    /// Emit one value as a one-element batch.
    fn emit_one(&mut self, record: Value) -> Result<(), ConnectorError> {
        self.emit_records(vec![record])
    }

    fn emit_state(&mut self, state: Value) -> Result<(), ConnectorError>;

    fn emit_log(&mut self, entry: LogRecord) -> Result<(), ConnectorError>;

    fn cancellation(&self) -> &CancellationToken;

    fn is_cancelled(&self) -> bool {
        self.cancellation().is_cancelled()
    }
}

/// Context for runners that paginate over HTTP.
#[async_trait]
pub trait HttpContext: GeneralContext {
    /// Execute `request`, extract the records at `path` and emit them.
    ///
    /// Fails fast with a cancellation error if the run is already cancelled,
    /// and abandons the request if cancellation arrives while it is in flight.
    /// The decoded body stays in `response` for pagination.
    async fn emit_batch(
        &mut self,
        request: &Request,
        response: &mut JsonResponse,
        path: &[&str],
    ) -> Result<(), ConnectorError>;
}

/// Typed helpers over [`GeneralContext`].
pub trait ContextExt: GeneralContext {
    /// Decode the connector configuration.
    fn config<C: DeserializeOwned>(&self) -> Result<C, ConnectorError> {
        decode_config(self.raw_config().as_deref())
    }

    /// Decode this stream's state, `None` on the first run.
    fn state<S: DeserializeOwned>(&self) -> Result<Option<S>, ConnectorError> {
        decode_state(self.raw_state().as_deref())
    }

    /// Decode config and state together.
    fn load<C: DeserializeOwned, S: DeserializeOwned>(
        &self,
    ) -> Result<(C, Option<S>), ConnectorError> {
        Ok((self.config()?, self.state()?))
    }

    /// Serialize and emit a checkpoint.
    fn checkpoint<S: Serialize>(&mut self, state: &S) -> Result<(), ConnectorError> {
        let value = serde_json::to_value(state)
            .map_err(|e| ConnectorError::internal("STATE_ENCODE", e.to_string()))?;
        self.emit_state(value)
    }
}

impl<T: GeneralContext + ?Sized> ContextExt for T {}

/// The runtime's context for one stream.
pub struct StreamContext {
    schema: Arc<Schema>,
    writer: Box<dyn StreamWriter>,
    client: Arc<dyn HttpClient>,
    cancel: CancellationToken,
}

impl StreamContext {
    pub fn new(
        schema: Arc<Schema>,
        writer: Box<dyn StreamWriter>,
        client: Arc<dyn HttpClient>,
        cancel: CancellationToken,
    ) -> Self {
        Self { schema, writer, client, cancel }
    }

    /// Write buffered records through to the sink.
    pub fn flush(&mut self) -> Result<(), ConnectorError> {
        self.writer.flush()
    }
}

/// Execute `request` on `client` unless `cancel` fires first.
///
/// # Errors
///
/// Returns a cancellation error naming `stream`, or the client's error.
pub async fn execute_cancellable(
    client: &dyn HttpClient,
    cancel: &CancellationToken,
    stream: &str,
    request: &Request,
    response: &mut JsonResponse,
) -> Result<(), ConnectorError> {
    if cancel.is_cancelled() {
        return Err(ConnectorError::cancelled(format!("stream '{stream}' cancelled")));
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            Err(ConnectorError::cancelled(format!("stream '{stream}' cancelled mid-request")))
        }
        result = client.execute(request, response) => result,
    }
}

impl GeneralContext for StreamContext {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn raw_config(&self) -> Option<Bytes> {
        self.writer.load_config()
    }

    fn raw_state(&self) -> Option<Bytes> {
        self.writer.load_state()
    }

    fn emit_records(&mut self, records: Vec<Value>) -> Result<(), ConnectorError> {
        self.writer.emit_records(&records)
    }

    fn emit_state(&mut self, state: Value) -> Result<(), ConnectorError> {
        self.writer.emit_state(state)
    }

    fn emit_log(&mut self, entry: LogRecord) -> Result<(), ConnectorError> {
        self.writer.emit_log(entry)
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[async_trait]
impl HttpContext for StreamContext {
    async fn emit_batch(
        &mut self,
        request: &Request,
        response: &mut JsonResponse,
        path: &[&str],
    ) -> Result<(), ConnectorError> {
        execute_cancellable(&*self.client, &self.cancel, &self.schema.name, request, response)
            .await?;
        let records = response.records(path);
        self.writer.emit_records(&records)
    }
}
