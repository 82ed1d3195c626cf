//! Concurrent stream execution for `read`.
//!
//! Every allowed stream gets one task on a [`JoinSet`]. Tasks wait for a
//! semaphore permit before opening their writer, so at most
//! `Source::concurrency` runner bodies execute at once. The group is
//! fail-fast: the first failure cancels the shared token, siblings observe it
//! at their next request, and the scheduler still joins every task before
//! returning.
//!
//! Admission does not look at the token. A stream queued behind a failed one
//! still gets its permit and starts; if the run was cancelled it stops at its
//! first request.

use std::sync::Arc;

use syncline_sdk::context::{GeneralContext, StreamContext};
use syncline_sdk::http::HttpClient;
use syncline_sdk::runner::ManualRunner;
use syncline_types::error::ConnectorError;
use syncline_types::log::LogRecord;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::errors::RuntimeError;
use crate::manual::EngineManualContext;
use crate::panic;
use crate::protocol::Protocol;
use crate::source::{Runner, Source, StreamDefinition};

const MANUAL_JOB: &str = "manual";

/// Run every allowed stream of `source` plus its manual job.
///
/// # Errors
///
/// Returns the first non-cancellation failure, or a cancellation error if
/// that is all there is.
pub(crate) async fn run_streams(
    source: &Source,
    protocol: Arc<dyn Protocol>,
    client: Arc<dyn HttpClient>,
    cancel: CancellationToken,
) -> Result<(), RuntimeError> {
    let semaphore = Arc::new(Semaphore::new(source.concurrency()));
    let mut join_set: JoinSet<Result<(), RuntimeError>> = JoinSet::new();
    let settings = protocol.session().settings().clone();

    for def in source.definitions() {
        if !settings.allows(def.name()) {
            tracing::debug!(stream = %def.name(), "Stream filtered out");
            continue;
        }
        join_set.spawn(run_stream(
            def.clone(),
            protocol.clone(),
            client.clone(),
            semaphore.clone(),
            cancel.clone(),
        ));
    }

    if let Some(manual) = source.manual_runner() {
        join_set.spawn(run_manual(
            manual.clone(),
            protocol.clone(),
            client,
            semaphore.clone(),
            cancel.clone(),
        ));
    }

    tracing::info!(
        streams = join_set.len(),
        concurrency = source.concurrency(),
        "Scheduled stream tasks"
    );

    collect_stream_task_results(join_set, &cancel).await
}

/// Wait for a permit. The permit is released when dropped, on every exit
/// path of the task including a contained panic.
async fn admit(semaphore: Arc<Semaphore>) -> Result<OwnedSemaphorePermit, RuntimeError> {
    semaphore
        .acquire_owned()
        .await
        .map_err(|e| RuntimeError::Infrastructure(anyhow::anyhow!("Semaphore closed: {e}")))
}

async fn run_stream(
    def: StreamDefinition,
    protocol: Arc<dyn Protocol>,
    client: Arc<dyn HttpClient>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
) -> Result<(), RuntimeError> {
    let stream = def.name().to_owned();
    let _permit = admit(semaphore).await?;

    let Some(writer) = protocol.open(def.schema.clone())? else {
        return Ok(());
    };
    let mut ctx = StreamContext::new(def.schema.clone(), writer, client, cancel);
    tracing::info!(stream = %stream, "Stream started");

    let result = match &def.runner {
        Some(Runner::Http(runner)) => panic::contain(runner.run(&mut ctx)).await,
        Some(Runner::General(runner)) => panic::contain(runner.run(&mut ctx)).await,
        None => Err(ConnectorError::internal(
            "RUNNER_NOT_IMPLEMENTED",
            format!("runner not implemented for stream '{stream}'"),
        )),
    };
    let flushed = ctx.flush();

    match result.and(flushed) {
        Ok(()) => {
            tracing::info!(stream = %stream, "Stream completed");
            Ok(())
        }
        Err(error) => {
            if error.is_cancelled() {
                tracing::warn!(stream = %stream, "Stream cancelled");
            } else {
                match error.backtrace() {
                    Some(trace) => tracing::error!(
                        stream = %stream,
                        error = %error,
                        backtrace = %trace,
                        "Stream panicked"
                    ),
                    None => tracing::error!(stream = %stream, error = %error, "Stream failed"),
                }
                if let Err(log_err) = ctx.emit_log(LogRecord::failure(&error)) {
                    tracing::warn!(stream = %stream, error = %log_err, "Failed to log stream error");
                }
            }
            Err(RuntimeError::Stream { stream, error })
        }
    }
}

async fn run_manual(
    runner: Arc<dyn ManualRunner>,
    protocol: Arc<dyn Protocol>,
    client: Arc<dyn HttpClient>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
) -> Result<(), RuntimeError> {
    let _permit = admit(semaphore).await?;
    let ctx = EngineManualContext::new(protocol, client, cancel);
    tracing::info!("Manual job started");

    let result = panic::contain(runner.run(&ctx)).await;
    let flushed = ctx.flush_all();

    match result.and(flushed) {
        Ok(()) => {
            tracing::info!("Manual job completed");
            Ok(())
        }
        Err(error) => {
            if let Some(trace) = error.backtrace() {
                tracing::error!(error = %error, backtrace = %trace, "Manual job panicked");
            } else if !error.is_cancelled() {
                tracing::error!(error = %error, "Manual job failed");
            }
            Err(RuntimeError::Stream { stream: MANUAL_JOB.to_owned(), error })
        }
    }
}

/// Join every task, cancelling the rest on the first failure.
///
/// Errors that only report the cancellation are kept only if no task failed
/// for a real reason.
async fn collect_stream_task_results(
    mut join_set: JoinSet<Result<(), RuntimeError>>,
    cancel: &CancellationToken,
) -> Result<(), RuntimeError> {
    let mut first_error: Option<RuntimeError> = None;

    while let Some(joined) = join_set.join_next().await {
        let error = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(error)) => error,
            Err(join_err) => RuntimeError::Infrastructure(anyhow::anyhow!(
                "Stream task failed to join: {join_err}"
            )),
        };
        cancel.cancel();
        first_error = match first_error {
            None => Some(error),
            Some(prev) if prev.is_cancelled() && !error.is_cancelled() => Some(error),
            keep => keep,
        };
    }

    first_error.map_or(Ok(()), Err)
}
