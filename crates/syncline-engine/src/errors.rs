//! Runtime error model.

use syncline_types::error::ConnectorError;

// ---------------------------------------------------------------------------
// ControlError: control-plane decoding failures
// ---------------------------------------------------------------------------

/// Failure to decode the control stream. Always fatal before any stream runs.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("failed to read control stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: malformed control message: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: control message must be a JSON object with a 'type'")]
    NotAnObject { line: usize },

    #[error("line {line}: invalid message type '{ty}'")]
    UnknownType { line: usize, ty: String },

    #[error("line {line}: invalid settings: {source}")]
    InvalidSettings {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("control stream has no SETTINGS message")]
    MissingSettings,

    #[error("global state must map stream names to state: {0}")]
    InvalidGlobalState(#[source] serde_json::Error),
}

// ---------------------------------------------------------------------------
// RuntimeError: everything a command can fail with
// ---------------------------------------------------------------------------

/// Categorized runtime error.
///
/// `Control` and `UnsupportedFormat` happen before any stream starts.
/// `Validation` is raised at startup. `Stream` wraps a failure that was also
/// logged on the stream's own output.
#[derive(Debug)]
pub enum RuntimeError {
    /// Control stream could not be decoded.
    Control(ControlError),
    /// SETTINGS named a format with no registered protocol.
    UnsupportedFormat(String),
    /// Source definition is invalid.
    Validation(ConnectorError),
    /// A stream runner failed or panicked.
    Stream {
        stream: String,
        error: ConnectorError,
    },
    /// Check could not reach a verdict on any stream.
    Check(String),
    /// Connector error outside any single stream (manual job, output writes).
    Connector(ConnectorError),
    /// Infrastructure error (I/O, closed semaphore, join failures).
    Infrastructure(anyhow::Error),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Control(e) => write!(f, "{e}"),
            Self::UnsupportedFormat(name) => write!(f, "unsupported format '{name}'"),
            Self::Validation(e) => write!(f, "invalid source: {e}"),
            Self::Stream { stream, error } => write!(f, "stream '{stream}' failed: {error}"),
            Self::Check(reason) => write!(f, "{reason}"),
            Self::Connector(e) => write!(f, "{e}"),
            Self::Infrastructure(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Control(e) => Some(e),
            Self::Validation(e) | Self::Connector(e) => Some(e),
            Self::Stream { error, .. } => Some(error),
            Self::Infrastructure(e) => Some(&**e),
            Self::UnsupportedFormat(_) | Self::Check(_) => None,
        }
    }
}

impl From<ControlError> for RuntimeError {
    fn from(e: ControlError) -> Self {
        Self::Control(e)
    }
}

impl From<anyhow::Error> for RuntimeError {
    fn from(e: anyhow::Error) -> Self {
        Self::Infrastructure(e)
    }
}

impl From<ConnectorError> for RuntimeError {
    fn from(e: ConnectorError) -> Self {
        Self::Connector(e)
    }
}

impl RuntimeError {
    /// The typed connector error, if this error carries one.
    pub fn as_connector_error(&self) -> Option<&ConnectorError> {
        match self {
            Self::Validation(e) | Self::Connector(e) => Some(e),
            Self::Stream { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Whether this only reports cancellation caused by another failure.
    pub fn is_cancelled(&self) -> bool {
        self.as_connector_error()
            .is_some_and(ConnectorError::is_cancelled)
    }
}
