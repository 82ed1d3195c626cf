//! Typed decoding of control-plane config and state payloads.

use serde::de::DeserializeOwned;
use syncline_types::error::ConnectorError;

/// Decode the connector configuration.
///
/// # Errors
///
/// Returns a config error when no config was sent or it does not match `C`.
pub fn decode_config<C: DeserializeOwned>(raw: Option<&[u8]>) -> Result<C, ConnectorError> {
    let raw = raw.ok_or_else(|| ConnectorError::config("MISSING_CONFIG", "expected config"))?;
    serde_json::from_slice(raw)
        .map_err(|e| ConnectorError::config("INVALID_CONFIG", format!("invalid config: {e}")))
}

/// Decode a stream's state. Absent or `null` state yields `None`.
///
/// # Errors
///
/// Returns a data error when the state does not match `S`.
pub fn decode_state<S: DeserializeOwned>(raw: Option<&[u8]>) -> Result<Option<S>, ConnectorError> {
    match raw {
        None => Ok(None),
        Some(bytes) if bytes.trim_ascii() == b"null" => Ok(None),
        Some(bytes) => serde_json::from_slice(bytes)
            .map(Some)
            .map_err(|e| ConnectorError::data("INVALID_STATE", format!("invalid state: {e}"))),
    }
}
