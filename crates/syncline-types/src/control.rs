//! Control-plane message payloads.
//!
//! The orchestrator configures one invocation with newline-delimited JSON
//! messages (`SETTINGS`, `CONFIG`, `STATE`, `CATALOG`). Only `SETTINGS`
//! has a fixed shape; config and state payloads are opaque to the runtime.

use serde::{Deserialize, Serialize};

/// Control-plane message discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlType {
    Settings,
    Config,
    State,
    Catalog,
}

impl ControlType {
    /// Resolve a wire `type` name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SETTINGS" => Some(Self::Settings),
            "CONFIG" => Some(Self::Config),
            "STATE" => Some(Self::State),
            "CATALOG" => Some(Self::Catalog),
            _ => None,
        }
    }
}

/// Payload of a `SETTINGS` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Output format name, resolved against the registered protocols.
    #[serde(default)]
    pub format: String,
    /// Optional stream allow-list. Empty means every stream runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<StreamSelector>,
}

/// One allow-list entry: a bare stream name or an object with a `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamSelector {
    Name(String),
    Named { name: String },
}

impl StreamSelector {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Named { name } => name,
        }
    }
}

impl Settings {
    /// Whether the stream passes the allow-list.
    pub fn allows(&self, stream: &str) -> bool {
        self.streams.is_empty() || self.streams.iter().any(|s| s.name() == stream)
    }
}
