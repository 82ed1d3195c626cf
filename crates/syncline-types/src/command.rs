//! The four commands a connector answers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Command requested by the orchestrator for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Emit the connector specification.
    Spec,
    /// Validate configuration and connectivity.
    Check,
    /// Emit stream schemas without running any stream.
    Discover,
    /// Run every allowed stream.
    Read,
}

/// Returned when a command name is not one of the four known commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid command '{0}'")]
pub struct InvalidCommand(pub String);

impl FromStr for Command {
    type Err = InvalidCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spec" => Ok(Self::Spec),
            "check" => Ok(Self::Check),
            "discover" => Ok(Self::Discover),
            "read" => Ok(Self::Read),
            _ => Err(InvalidCommand(s.into())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Spec => "spec",
            Self::Check => "check",
            Self::Discover => "discover",
            Self::Read => "read",
        };
        f.write_str(s)
    }
}
