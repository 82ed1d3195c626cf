//! Control-plane codec and per-invocation session.
//!
//! [`Session::read`] consumes the newline-delimited control stream
//! (`SETTINGS`, `CONFIG`, `STATE`, `CATALOG`) and produces the session an
//! output protocol is built on. Global state (a `STATE` message with an empty
//! stream name) is fanned out into per-stream entries before the session is
//! returned, so no stream can observe it unexpanded.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};
use syncline_types::command::Command;
use syncline_types::control::{ControlType, Settings};

use crate::errors::ControlError;
use crate::sink::Sink;

/// Decoded config and per-stream state for one invocation.
#[derive(Debug, Default)]
pub struct ConfigStore {
    config: Option<Bytes>,
    states: HashMap<String, Bytes>,
}

impl ConfigStore {
    /// Raw config bytes as sent on the control plane.
    pub fn config(&self) -> Option<Bytes> {
        self.config.clone()
    }

    /// Raw state bytes for `stream`.
    pub fn state(&self, stream: &str) -> Option<Bytes> {
        self.states.get(stream).cloned()
    }
}

/// One command invocation: what to run, how to encode it, where to write.
#[derive(Debug)]
pub struct Session {
    command: Command,
    settings: Settings,
    store: Arc<ConfigStore>,
    sink: Sink,
}

impl Session {
    /// Decode the control stream from `reader` and bind output to `writer`.
    ///
    /// # Errors
    ///
    /// Fails on unreadable input, malformed or unknown messages, a missing
    /// `SETTINGS` message, or a global state that is not an object.
    pub fn read(
        reader: impl BufRead,
        writer: impl Write + Send + 'static,
        command: Command,
    ) -> Result<Self, ControlError> {
        let mut settings = None;
        let mut config = None;
        let mut states: HashMap<String, Bytes> = HashMap::new();
        let mut global_state = None;

        for (index, line) in reader.lines().enumerate() {
            let line_no = index + 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let message: Value = serde_json::from_str(&line)
                .map_err(|source| ControlError::Malformed { line: line_no, source })?;
            let Value::Object(mut message) = message else {
                return Err(ControlError::NotAnObject { line: line_no });
            };
            let ty = message.get("type").and_then(Value::as_str).unwrap_or_default();
            let Some(kind) = ControlType::from_name(ty) else {
                return Err(ControlError::UnknownType { line: line_no, ty: ty.to_owned() });
            };

            match kind {
                ControlType::Settings => {
                    let payload = message.remove("settings").unwrap_or(Value::Null);
                    let parsed = serde_json::from_value::<Settings>(payload).map_err(|source| {
                        ControlError::InvalidSettings { line: line_no, source }
                    })?;
                    settings = Some(parsed);
                }
                ControlType::Config => {
                    config = message.remove("config").filter(|v| !v.is_null());
                }
                ControlType::State => {
                    let stream = message
                        .get("stream")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned();
                    let Some(state) = message.remove("state").filter(|v| !v.is_null()) else {
                        continue;
                    };
                    if stream.is_empty() {
                        global_state = Some(state);
                    } else {
                        states.insert(stream, encode(&state));
                    }
                }
                ControlType::Catalog => {}
            }
        }

        let settings = settings.ok_or(ControlError::MissingSettings)?;

        if let Some(global) = global_state {
            let per_stream: Map<String, Value> =
                serde_json::from_value(global).map_err(ControlError::InvalidGlobalState)?;
            for (stream, state) in per_stream {
                if state.is_null() {
                    continue;
                }
                states.insert(stream, encode(&state));
            }
        }

        tracing::debug!(
            %command,
            format = %settings.format,
            streams = states.len(),
            has_config = config.is_some(),
            "Decoded control stream"
        );

        Ok(Self {
            command,
            settings,
            store: Arc::new(ConfigStore {
                config: config.map(|c| encode(&c)),
                states,
            }),
            sink: Sink::new(writer),
        })
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Raw config bytes, `None` when no CONFIG message was sent.
    pub fn load_config(&self) -> Option<Bytes> {
        self.store.config()
    }

    /// Raw state bytes for `stream`, `None` when absent.
    pub fn load_state(&self, stream: &str) -> Option<Bytes> {
        self.store.state(stream)
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }
}

fn encode(value: &Value) -> Bytes {
    Bytes::from(value.to_string())
}
