//! Connectivity check.
//!
//! Each HTTP stream is run against a [`ProbeContext`] whose first
//! `emit_batch` performs the real request and then stops the runner. The
//! first stream that reaches a verdict decides the reported status.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use syncline_sdk::context::{execute_cancellable, GeneralContext, HttpContext};
use syncline_sdk::http::{HttpClient, JsonResponse, Request};
use syncline_sdk::runner::HttpRunner;
use syncline_types::error::ConnectorError;
use syncline_types::log::LogRecord;
use syncline_types::schema::Schema;
use syncline_types::spec::ConnectionStatus;
use tokio_util::sync::CancellationToken;

use crate::errors::RuntimeError;
use crate::panic;
use crate::protocol::Protocol;
use crate::session::ConfigStore;
use crate::source::{Runner, Source};

const PROBE_COMPLETE: &str = "PROBE_COMPLETE";

/// Verdict of probing one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The first request succeeded.
    Connected,
    /// The first request, or the runner before it, failed.
    Failed(String),
    /// The runner returned without issuing a request.
    NotAttempted,
}

/// Probe HTTP streams in order and emit one `CONNECTION_STATUS`.
///
/// # Errors
///
/// Returns `RuntimeError::Check` when no stream reaches a verdict, or an
/// output error if the status cannot be written.
pub(crate) async fn check(
    source: &Source,
    protocol: &dyn Protocol,
    client: Arc<dyn HttpClient>,
    cancel: CancellationToken,
) -> Result<(), RuntimeError> {
    let session = protocol.session();
    for def in source.definitions() {
        let Some(Runner::Http(runner)) = &def.runner else {
            continue;
        };
        if !session.settings().allows(def.name()) {
            continue;
        }

        let outcome = probe(
            def.schema.clone(),
            runner.as_ref(),
            session.store().clone(),
            client.clone(),
            cancel.clone(),
        )
        .await;
        tracing::info!(stream = %def.name(), outcome = ?outcome, "Probed stream");

        match outcome {
            CheckOutcome::Connected => {
                return protocol.emit_status(&ConnectionStatus::succeeded());
            }
            CheckOutcome::Failed(reason) => {
                return protocol
                    .emit_status(&ConnectionStatus::failed(format!("validation failed: {reason}")));
            }
            CheckOutcome::NotAttempted => {}
        }
    }
    Err(RuntimeError::Check("validation failed: unexpected error".into()))
}

/// Run `runner` until its first request completes.
pub async fn probe(
    schema: Arc<Schema>,
    runner: &dyn HttpRunner,
    store: Arc<ConfigStore>,
    client: Arc<dyn HttpClient>,
    cancel: CancellationToken,
) -> CheckOutcome {
    let mut ctx = ProbeContext { schema, store, client, cancel, verdict: None };
    let result = panic::contain(runner.run(&mut ctx)).await;
    match (ctx.verdict, result) {
        (Some(Ok(())), _) => CheckOutcome::Connected,
        (Some(Err(reason)), _) => CheckOutcome::Failed(reason),
        (None, Err(err)) => CheckOutcome::Failed(err.to_string()),
        (None, Ok(())) => CheckOutcome::NotAttempted,
    }
}

struct ProbeContext {
    schema: Arc<Schema>,
    store: Arc<ConfigStore>,
    client: Arc<dyn HttpClient>,
    cancel: CancellationToken,
    verdict: Option<Result<(), String>>,
}

fn probe_complete() -> ConnectorError {
    ConnectorError::internal(PROBE_COMPLETE, "probe complete")
}

impl GeneralContext for ProbeContext {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn raw_config(&self) -> Option<Bytes> {
        self.store.config()
    }

    fn raw_state(&self) -> Option<Bytes> {
        self.store.state(&self.schema.name)
    }

    fn emit_records(&mut self, _records: Vec<Value>) -> Result<(), ConnectorError> {
        Ok(())
    }

    fn emit_state(&mut self, _state: Value) -> Result<(), ConnectorError> {
        Ok(())
    }

    fn emit_log(&mut self, _entry: LogRecord) -> Result<(), ConnectorError> {
        Ok(())
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[async_trait]
impl HttpContext for ProbeContext {
    async fn emit_batch(
        &mut self,
        request: &Request,
        response: &mut JsonResponse,
        _path: &[&str],
    ) -> Result<(), ConnectorError> {
        if self.verdict.is_some() {
            return Err(probe_complete());
        }
        match execute_cancellable(&*self.client, &self.cancel, &self.schema.name, request, response)
            .await
        {
            Ok(()) => {
                self.verdict = Some(Ok(()));
                Err(probe_complete())
            }
            Err(err) => {
                self.verdict = Some(Err(err.to_string()));
                Err(err)
            }
        }
    }
}
