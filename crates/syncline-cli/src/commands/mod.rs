pub mod airbyte;
pub mod connectors;
pub mod run;

use std::io::BufRead;

use anyhow::{Context, Result};
use syncline_engine::{Protocols, Registry, RunOptions};
use syncline_types::command::Command;

/// Run `command` on `connector`, decoding control messages from `input` and
/// writing protocol messages to stdout. Ctrl-C cancels running streams.
pub(crate) async fn dispatch(
    registry: &Registry,
    connector: &str,
    command: &str,
    input: impl BufRead,
) -> Result<()> {
    let source = registry.get(connector).with_context(|| {
        format!("Unknown connector '{connector}'. Run `syncline connectors` to list them.")
    })?;
    let command: Command = command.parse()?;

    let options = RunOptions::default();
    let cancel = options.cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling streams");
            cancel.cancel();
        }
    });

    tracing::info!(connector, %command, "Running connector command");
    let result = source
        .handle(command, input, std::io::stdout(), &Protocols::default(), &options)
        .await;
    interrupt.abort();

    result.with_context(|| format!("{connector} {command} failed"))
}
