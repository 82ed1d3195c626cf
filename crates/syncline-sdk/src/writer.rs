//! The per-stream output contract implemented by each output protocol.

use bytes::Bytes;
use serde_json::Value;
use syncline_types::error::ConnectorError;
use syncline_types::log::LogRecord;

/// Per-stream writer handed out by an output protocol when a stream opens.
///
/// A writer is owned by exactly one stream task. Records are buffered and
/// written through to the session's shared sink on [`StreamWriter::flush`]
/// or when the buffer grows past its threshold.
pub trait StreamWriter: Send {
    /// Raw configuration bytes from the control plane, if any were sent.
    fn load_config(&self) -> Option<Bytes>;

    /// Raw state bytes for this stream, if any.
    fn load_state(&self) -> Option<Bytes>;

    /// Append records to the stream's buffer.
    fn emit_records(&mut self, records: &[Value]) -> Result<(), ConnectorError>;

    /// Record a checkpoint for this stream.
    fn emit_state(&mut self, state: Value) -> Result<(), ConnectorError>;

    /// Write a stream-scoped log entry.
    fn emit_log(&mut self, entry: LogRecord) -> Result<(), ConnectorError>;

    /// Write any buffered records through to the sink.
    fn flush(&mut self) -> Result<(), ConnectorError>;
}
