use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use syncline_engine::Registry;

/// Airbyte-style command arguments. Each value is a file path or inline JSON.
#[derive(Debug, Default)]
pub struct AirbyteArgs {
    pub config: Option<String>,
    pub state: Option<String>,
    pub catalog: Option<String>,
}

/// Execute the `airbyte` command: translate arguments into a control stream.
pub async fn execute(
    registry: &Registry,
    connector: &str,
    command: &str,
    args: &AirbyteArgs,
) -> Result<()> {
    let control = control_stream(args)?;
    super::dispatch(registry, connector, command, Cursor::new(control)).await
}

/// SETTINGS for the airbyte format followed by CONFIG, STATE and CATALOG.
///
/// State is sent as global state, keyed by stream name.
fn control_stream(args: &AirbyteArgs) -> Result<String> {
    let mut messages = vec![json!({"type": "SETTINGS", "settings": {"format": "airbyte"}})];

    if let Some(arg) = &args.config {
        let config = load_json(arg).context("Failed to load --config")?;
        messages.push(json!({"type": "CONFIG", "config": config}));
    }
    if let Some(arg) = &args.state {
        let state = load_json(arg).context("Failed to load --state")?;
        messages.push(json!({"type": "STATE", "stream": "", "state": state}));
    }
    if let Some(arg) = &args.catalog {
        let catalog = load_json(arg).context("Failed to load --catalog")?;
        messages.push(json!({"type": "CATALOG", "catalog": catalog}));
    }

    Ok(messages.iter().map(Value::to_string).collect::<Vec<_>>().join("\n"))
}

/// Read `arg` as a JSON file if it names one, otherwise parse it as JSON.
fn load_json(arg: &str) -> Result<Value> {
    let path = Path::new(arg);
    if path.is_file() {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON in {}", path.display()));
    }
    serde_json::from_str(arg).context("Argument is neither an existing file nor valid JSON")
}
