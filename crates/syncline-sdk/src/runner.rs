//! Runner traits implemented by connector authors.
//!
//! A stream is driven by exactly one runner shape: [`HttpRunner`] for
//! request/response pagination or [`GeneralRunner`] for anything else.
//! A source may also carry one [`ManualRunner`] that is not tied to a
//! single schema and opens stream contexts itself.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use syncline_types::error::ConnectorError;
use syncline_types::schema::Schema;
use tokio_util::sync::CancellationToken;

use crate::context::{GeneralContext, HttpContext};

/// Runs one stream by issuing HTTP requests through its context.
#[async_trait]
pub trait HttpRunner: Send + Sync {
    async fn run(&self, ctx: &mut dyn HttpContext) -> Result<(), ConnectorError>;
}

/// Runs one stream that produces records by other means.
#[async_trait]
pub trait GeneralRunner: Send + Sync {
    async fn run(&self, ctx: &mut dyn GeneralContext) -> Result<(), ConnectorError>;
}

/// Runs an unstructured job that opens its own streams.
#[async_trait]
pub trait ManualRunner: Send + Sync {
    async fn run(&self, ctx: &dyn ManualContext) -> Result<(), ConnectorError>;
}

/// What a [`ManualRunner`] can do.
///
/// Every stream opened here is flushed by the runtime when the job returns,
/// whether or not it succeeded.
pub trait ManualContext: Send + Sync {
    /// Raw configuration bytes.
    fn raw_config(&self) -> Option<Bytes>;

    /// Open a context for `schema`. `None` means the stream is filtered out.
    fn open(
        &self,
        schema: Arc<Schema>,
    ) -> Result<Option<Box<dyn HttpContext>>, ConnectorError>;

    fn cancellation(&self) -> &CancellationToken;
}
