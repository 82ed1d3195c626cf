//! Command dispatch.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use syncline_types::command::Command;
use tokio_util::sync::CancellationToken;

use crate::check;
use crate::errors::RuntimeError;
use crate::protocol::{Protocol, Protocols};
use crate::scheduler;
use crate::source::Source;

/// Per-invocation knobs supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Cancelling this token stops every running stream at its next request.
    ///
    /// Each command runs under a child of this token, so a failing stream
    /// never cancels the caller's token.
    pub cancel: CancellationToken,
}

impl Source {
    /// Answer one command: decode the control stream from `reader`, run the
    /// command and write protocol messages to `writer`.
    ///
    /// The protocol is closed exactly once whatever the outcome. A command
    /// error takes precedence over a close error.
    ///
    /// # Errors
    ///
    /// Returns the first validation, control-plane, stream or output error.
    pub async fn handle(
        &self,
        command: Command,
        reader: impl BufRead,
        writer: impl Write + Send + 'static,
        protocols: &Protocols,
        options: &RunOptions,
    ) -> Result<(), RuntimeError> {
        self.validate()?;
        let protocol = protocols.open(reader, writer, command)?;

        let started = Instant::now();
        let result = self.dispatch(command, protocol.clone(), options).await;
        let closed = protocol.close();

        match (&result, &closed) {
            (Ok(()), Ok(())) => tracing::info!(
                %command,
                elapsed_ms = millis(started.elapsed()),
                "Command completed"
            ),
            (Err(_), Err(close_err)) => {
                tracing::warn!(error = %close_err, "Protocol close failed after command error");
            }
            _ => {}
        }
        result.and(closed)
    }

    async fn dispatch(
        &self,
        command: Command,
        protocol: Arc<dyn Protocol>,
        options: &RunOptions,
    ) -> Result<(), RuntimeError> {
        let cancel = options.cancel.child_token();
        match command {
            Command::Spec => protocol.emit_spec(&self.spec()),
            Command::Check => {
                let client = self.http_client()?;
                check::check(self, protocol.as_ref(), client, cancel).await
            }
            Command::Discover => self.discover(protocol.as_ref()),
            Command::Read => {
                let client = self.http_client()?;
                scheduler::run_streams(self, protocol, client, cancel).await
            }
        }
    }

    /// Open and flush every allowed stream without running it.
    fn discover(&self, protocol: &dyn Protocol) -> Result<(), RuntimeError> {
        for def in self.definitions() {
            if let Some(mut writer) = protocol.open(def.schema.clone())? {
                writer.flush()?;
                tracing::debug!(stream = %def.name(), "Discovered stream");
            }
        }
        Ok(())
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
