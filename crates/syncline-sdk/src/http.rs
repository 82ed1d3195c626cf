//! Request/response abstraction used by HTTP stream runners.
//!
//! Runners describe a [`Request`]; the runtime executes it through an
//! [`HttpClient`] and fills a reusable [`JsonResponse`]. [`ReqwestClient`]
//! is the default client. Retry and backoff are left to the orchestrator.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use syncline_types::error::ConnectorError;

use crate::masked::MaskedString;

pub use reqwest::Method;

const ERROR_BODY_SNIPPET: usize = 256;

/// Description of one outbound request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    secret_headers: Vec<(String, MaskedString)>,
    body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            secret_headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Header whose value is kept out of `Debug` output.
    #[must_use]
    pub fn secret_header(mut self, name: impl Into<String>, value: &MaskedString) -> Self {
        self.secret_headers.push((name.into(), value.clone()));
        self
    }

    #[must_use]
    pub fn bearer_auth(self, token: &MaskedString) -> Self {
        let value = MaskedString::new(format!("Bearer {}", token.expose()));
        self.secret_header("Authorization", &value)
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// All headers with secret values exposed, for the transport only.
    pub fn header_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(self.secret_headers.iter().map(|(k, v)| (k.as_str(), v.expose())))
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// A decoded JSON response, reused across pages.
#[derive(Debug, Clone, Default)]
pub struct JsonResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl JsonResponse {
    /// The value at `path`. Numeric segments index into arrays; an empty
    /// path addresses the whole body.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.body, |value, segment| match value {
            Value::Object(map) => map.get(*segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    pub fn string(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Records at `path`: every element of an array, a single non-null value
    /// as a one-element batch, or nothing when the path is missing or null.
    pub fn records(&self, path: &[&str]) -> Vec<Value> {
        match self.get(path) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Replace the contents in place, keeping allocations where possible.
    pub fn reset(&mut self, status: u16, headers: BTreeMap<String, String>, body: Value) {
        self.status = status;
        self.headers = headers;
        self.body = body;
    }
}

/// Executes requests on behalf of stream runners.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute `request` and decode the body into `response`.
    ///
    /// # Errors
    ///
    /// Non-success statuses and transport failures are returned as
    /// categorized [`ConnectorError`]s.
    async fn execute(&self, request: &Request, response: &mut JsonResponse)
        -> Result<(), ConnectorError>;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Build a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, ConnectorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("syncline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConnectorError::internal("HTTP_CLIENT", e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(
        &self,
        request: &Request,
        response: &mut JsonResponse,
    ) -> Result<(), ConnectorError> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url())
            .query(request.query_pairs());
        for (name, value) in request.header_pairs() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        tracing::debug!(method = %request.method(), url = request.url(), "Executing request");
        let resp = builder.send().await.map_err(transport_error)?;

        let status = resp.status().as_u16();
        let headers: BTreeMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_owned(), v.to_owned())))
            .collect();
        let text = resp.text().await.map_err(transport_error)?;

        if !(200..300).contains(&status) {
            let retry_after = headers.get("retry-after").and_then(|v| retry_after_ms(v));
            return Err(status_error(status, retry_after, &text));
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                ConnectorError::data("INVALID_JSON", format!("response is not JSON: {e}"))
            })?
        };
        response.reset(status, headers, body);
        Ok(())
    }
}

fn transport_error(err: reqwest::Error) -> ConnectorError {
    if err.is_timeout() {
        ConnectorError::transient_network("TIMEOUT", err.to_string())
    } else if err.is_connect() {
        ConnectorError::transient_network("CONNECT", err.to_string())
    } else {
        ConnectorError::internal("REQUEST_FAILED", err.to_string())
    }
}

/// Parse a delay-seconds `Retry-After` value into milliseconds.
fn retry_after_ms(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().map(|secs| secs.saturating_mul(1000))
}

/// Map a non-success HTTP status onto an error category.
pub fn status_error(status: u16, retry_after_ms: Option<u64>, body: &str) -> ConnectorError {
    let snippet: String = body.chars().take(ERROR_BODY_SNIPPET).collect();
    let code = format!("HTTP_{status}");
    let message = format!("HTTP {status}: {snippet}");
    match status {
        401 => ConnectorError::auth(code, message),
        403 => ConnectorError::permission(code, message),
        429 => ConnectorError::rate_limit(code, message, retry_after_ms),
        408 | 500..=599 => ConnectorError::transient_network(code, message),
        _ => ConnectorError::data(code, message),
    }
}
