//! Stream definitions and the source builder.
//!
//! A [`Source`] is the immutable description of one connector: its streams,
//! their runners, an optional manual job and the metadata reported by `spec`.
//! It is assembled once with [`SourceBuilder`] and never mutated afterwards.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use syncline_sdk::http::{HttpClient, ReqwestClient};
use syncline_sdk::runner::{GeneralRunner, HttpRunner, ManualRunner};
use syncline_sdk::JsonSchema;
use syncline_types::error::ConnectorError;
use syncline_types::schema::Schema;
use syncline_types::spec::ConnectorSpecification;

use crate::errors::RuntimeError;

/// Timeout of the default HTTP client.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// How a stream's records are produced.
#[derive(Clone)]
pub enum Runner {
    Http(Arc<dyn HttpRunner>),
    General(Arc<dyn GeneralRunner>),
}

impl Runner {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::General(_) => "general",
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// One stream: its schema and the runner that produces it.
///
/// A definition without a runner is accepted at build time and fails when
/// the stream is read.
#[derive(Debug, Clone)]
pub struct StreamDefinition {
    pub schema: Arc<Schema>,
    pub runner: Option<Runner>,
}

impl StreamDefinition {
    pub fn name(&self) -> &str {
        &self.schema.name
    }
}

enum PendingRunner {
    Resolved(Option<Runner>),
    SharedHttp,
}

/// Accumulates stream definitions and connector metadata.
///
/// ```ignore
/// let source = SourceBuilder::new::<ApiConfig>()
///     .http_stream(SchemaBuilder::non_incremental::<User>("users"), UsersRunner)
///     .concurrency(4)
///     .build();
/// ```
pub struct SourceBuilder {
    config_schema: Value,
    streams: Vec<(Arc<Schema>, PendingRunner)>,
    shared_http: Option<Arc<dyn HttpRunner>>,
    manual: Option<Arc<dyn ManualRunner>>,
    documentation: Vec<String>,
    notes: Vec<String>,
    version: Option<String>,
    concurrency: usize,
    client: Option<Arc<dyn HttpClient>>,
}

impl SourceBuilder {
    /// Start a source whose configuration is described by `C`.
    pub fn new<C: JsonSchema>() -> Self {
        Self {
            config_schema: C::json_schema(),
            streams: Vec::new(),
            shared_http: None,
            manual: None,
            documentation: Vec::new(),
            notes: Vec::new(),
            version: None,
            concurrency: 1,
            client: None,
        }
    }

    #[must_use]
    pub fn http_stream(
        mut self,
        schema: impl Into<Arc<Schema>>,
        runner: impl HttpRunner + 'static,
    ) -> Self {
        let runner = Runner::Http(Arc::new(runner));
        self.streams.push((schema.into(), PendingRunner::Resolved(Some(runner))));
        self
    }

    /// An HTTP stream driven by the runner set with [`Self::shared_http_runner`].
    #[must_use]
    pub fn http_stream_shared(mut self, schema: impl Into<Arc<Schema>>) -> Self {
        self.streams.push((schema.into(), PendingRunner::SharedHttp));
        self
    }

    #[must_use]
    pub fn general_stream(
        mut self,
        schema: impl Into<Arc<Schema>>,
        runner: impl GeneralRunner + 'static,
    ) -> Self {
        let runner = Runner::General(Arc::new(runner));
        self.streams.push((schema.into(), PendingRunner::Resolved(Some(runner))));
        self
    }

    /// A stream with no runner; reading it fails.
    #[must_use]
    pub fn stream(mut self, schema: impl Into<Arc<Schema>>) -> Self {
        self.streams.push((schema.into(), PendingRunner::Resolved(None)));
        self
    }

    #[must_use]
    pub fn shared_http_runner(mut self, runner: impl HttpRunner + 'static) -> Self {
        self.shared_http = Some(Arc::new(runner));
        self
    }

    #[must_use]
    pub fn manual_runner(mut self, runner: impl ManualRunner + 'static) -> Self {
        self.manual = Some(Arc::new(runner));
        self
    }

    #[must_use]
    pub fn documentation<I, S>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.documentation.extend(links.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn notes<I, S>(mut self, notes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.notes.extend(notes.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Maximum number of streams running at once. Values below 1 are raised to 1.
    #[must_use]
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Replace the default reqwest-backed client.
    #[must_use]
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Source {
        let shared_http = self.shared_http;
        let definitions = self
            .streams
            .into_iter()
            .map(|(schema, pending)| {
                let runner = match pending {
                    PendingRunner::Resolved(runner) => runner,
                    PendingRunner::SharedHttp => shared_http.clone().map(Runner::Http),
                };
                StreamDefinition { schema, runner }
            })
            .collect();

        Source {
            config_schema: self.config_schema,
            definitions,
            manual: self.manual,
            documentation: self.documentation,
            notes: self.notes,
            version: self.version,
            concurrency: self.concurrency,
            client: self.client,
        }
    }
}

/// An immutable connector definition.
pub struct Source {
    config_schema: Value,
    definitions: Vec<StreamDefinition>,
    manual: Option<Arc<dyn ManualRunner>>,
    documentation: Vec<String>,
    notes: Vec<String>,
    version: Option<String>,
    concurrency: usize,
    client: Option<Arc<dyn HttpClient>>,
}

impl Source {
    pub fn definitions(&self) -> &[StreamDefinition] {
        &self.definitions
    }

    pub fn manual_runner(&self) -> Option<&Arc<dyn ManualRunner>> {
        self.manual.as_ref()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Check every stream schema and reject duplicate names.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Validation` for the first problem found.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        let mut seen = HashSet::new();
        for def in &self.definitions {
            def.schema.validate().map_err(RuntimeError::Validation)?;
            if !seen.insert(def.name()) {
                return Err(RuntimeError::Validation(ConnectorError::schema(
                    "DUPLICATE_STREAM",
                    format!("stream '{}' is defined more than once", def.name()),
                )));
            }
        }
        Ok(())
    }

    /// The connector specification reported by `spec`.
    pub fn spec(&self) -> ConnectorSpecification {
        ConnectorSpecification {
            documentation_url: self.documentation.join(","),
            supports_incremental: self.definitions.iter().any(|d| d.schema.incremental),
            connection_specification: self.config_schema.clone(),
            notes: self.notes.clone(),
            version: self.version.clone(),
        }
    }

    /// The configured HTTP client, or a fresh default client.
    ///
    /// # Errors
    ///
    /// Fails if the default client cannot be constructed.
    pub fn http_client(&self) -> Result<Arc<dyn HttpClient>, RuntimeError> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let client = ReqwestClient::new(DEFAULT_HTTP_TIMEOUT).map_err(RuntimeError::Connector)?;
        Ok(Arc::new(client))
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("definitions", &self.definitions)
            .field("manual", &self.manual.is_some())
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}
