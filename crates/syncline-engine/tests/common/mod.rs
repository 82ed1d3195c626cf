//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use syncline_engine::{Protocols, RunOptions, RuntimeError, Source};
use syncline_sdk::http::{status_error, HttpClient, JsonResponse, Request};
use syncline_types::command::Command;
use syncline_types::error::ConnectorError;

/// Output buffer shared with the engine's sink.
#[derive(Clone, Default)]
pub struct Output(Arc<Mutex<Vec<u8>>>);

impl Output {
    pub fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    /// Lines of `ty` belonging to `stream`, in output order.
    pub fn of_type(&self, ty: &str) -> Vec<Value> {
        self.lines().into_iter().filter(|l| l["type"] == ty).collect()
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer that refuses STATE lines and keeps everything else.
#[derive(Clone, Default)]
pub struct StateRejectingOutput(pub Output);

impl Write for StateRejectingOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if String::from_utf8_lossy(buf).contains(r#""type":"STATE""#) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "state sink closed"));
        }
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
    pub delay: Duration,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body, delay: Duration::ZERO }
    }

    pub fn status(status: u16) -> Self {
        Self { status, body: json!({"error": "denied"}), delay: Duration::ZERO }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// HTTP client answering from a fixed URL table. Unknown URLs get a 404.
#[derive(Default)]
pub struct ScriptedClient {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<String>>,
    pub in_flight: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, url: &str, reply: Reply) -> Self {
        self.replies.insert(url.to_owned(), reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn execute(&self, request: &Request, response: &mut JsonResponse) -> Result<(), ConnectorError> {
        self.calls.lock().unwrap().push(request.url().to_owned());
        let reply = self
            .replies
            .get(request.url())
            .cloned()
            .unwrap_or_else(|| Reply::status(404));

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(reply.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if reply.status >= 400 {
            return Err(status_error(reply.status, None, &reply.body.to_string()));
        }
        response.reset(reply.status, Default::default(), reply.body);
        Ok(())
    }
}

/// Control stream with SETTINGS for `format` followed by `extra` messages.
pub fn control(format: &str, streams: &[&str], extra: &[Value]) -> String {
    let mut lines = vec![json!({
        "type": "SETTINGS",
        "settings": {"format": format, "streams": streams},
    })
    .to_string()];
    lines.extend(extra.iter().map(Value::to_string));
    lines.join("\n")
}

/// Run `command` against `source` and capture the output.
pub async fn run(source: &Source, command: Command, input: String) -> (Result<(), RuntimeError>, Output) {
    run_with(source, command, input, &RunOptions::default()).await
}

pub async fn run_with(
    source: &Source,
    command: Command,
    input: String,
    options: &RunOptions,
) -> (Result<(), RuntimeError>, Output) {
    let output = Output::default();
    let result = source
        .handle(command, Cursor::new(input), output.clone(), &Protocols::default(), options)
        .await;
    (result, output)
}
