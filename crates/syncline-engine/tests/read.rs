//! End-to-end `read` runs through both output protocols.

mod common;

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use syncline_engine::{Protocols, RunOptions, RuntimeError, Source, SourceBuilder};
use syncline_sdk::prelude::*;
use syncline_types::command::Command;

use common::{control, run, run_with, Reply, ScriptedClient, StateRejectingOutput};

#[derive(JsonSchema, Deserialize)]
struct ApiConfig {
    base_url: String,
}

#[derive(JsonSchema, Serialize)]
#[allow(dead_code)]
struct User {
    id: i64,
    name: String,
}

#[derive(JsonSchema, Serialize)]
#[allow(dead_code)]
struct Order {
    id: i64,
    updated_at: String,
}

#[derive(Serialize, Deserialize)]
struct OrderCursor {
    cursor: String,
}

/// Follows `next` links until the API stops returning one.
struct UsersRunner;

#[async_trait]
impl HttpRunner for UsersRunner {
    async fn run(&self, ctx: &mut dyn HttpContext) -> Result<(), ConnectorError> {
        let config: ApiConfig = ctx.config()?;
        let mut next = Some(format!("{}/users", config.base_url));
        let mut response = JsonResponse::default();
        let mut pages = 0;
        while let Some(url) = next.take() {
            ctx.emit_batch(&Request::get(url), &mut response, &["results"]).await?;
            pages += 1;
            next = response.string(&["next"]).map(str::to_owned);
        }
        ctx.checkpoint(&json!({ "pages": pages }))
    }
}

/// Emits two orders after the stored cursor.
struct OrdersRunner;

#[async_trait]
impl GeneralRunner for OrdersRunner {
    async fn run(&self, ctx: &mut dyn GeneralContext) -> Result<(), ConnectorError> {
        let since = ctx
            .state::<OrderCursor>()?
            .map(|c| c.cursor)
            .unwrap_or_else(|| "1970-01-01".into());
        ctx.emit_records(vec![
            json!({"id": 10, "updated_at": "2024-02-01", "since": since}),
            json!({"id": 11, "updated_at": "2024-02-02", "since": since}),
        ])?;
        ctx.checkpoint(&OrderCursor { cursor: "2024-02-02".into() })
    }
}

fn users_client() -> ScriptedClient {
    ScriptedClient::new()
        .reply(
            "https://api.test/users",
            Reply::ok(json!({
                "results": [{"id": 1, "name": "ada"}, {"id": 2, "name": "bob"}],
                "next": "https://api.test/users?page=2",
            })),
        )
        .reply(
            "https://api.test/users?page=2",
            Reply::ok(json!({"results": [{"id": 3, "name": "cy"}], "next": null})),
        )
}

fn source(client: ScriptedClient) -> Source {
    SourceBuilder::new::<ApiConfig>()
        .http_stream(SchemaBuilder::non_incremental::<User>("users").primary([field(["id"])]), UsersRunner)
        .general_stream(
            SchemaBuilder::incremental::<Order>("orders")
                .primary([field(["id"])])
                .order_by([field(["updated_at"]).asc()]),
            OrdersRunner,
        )
        .concurrency(2)
        .http_client(Arc::new(client))
        .build()
}

fn read_input(format: &str, streams: &[&str]) -> String {
    control(
        format,
        streams,
        &[
            json!({"type": "CONFIG", "config": {"base_url": "https://api.test"}}),
            json!({"type": "STATE", "stream": "", "state": {"orders": {"cursor": "2024-01-15"}}}),
        ],
    )
}

fn stream_lines(lines: &[Value], stream: &str) -> Vec<Value> {
    lines
        .iter()
        .filter(|l| l["stream"] == stream)
        .cloned()
        .collect()
}

#[tokio::test]
async fn singer_read_orders_schema_records_state_per_stream() {
    let source = source(users_client());
    let (result, output) = run(&source, Command::Read, read_input("singer", &[])).await;
    result.unwrap();

    let lines = output.lines();
    for stream in ["users", "orders"] {
        let own = stream_lines(&lines, stream);
        let types: Vec<&str> = own.iter().map(|l| l["type"].as_str().unwrap()).collect();
        assert_eq!(types.first(), Some(&"SCHEMA"), "{stream}: {types:?}");
        assert_eq!(types.last(), Some(&"STATE"), "{stream}: {types:?}");
        assert_eq!(types.iter().filter(|t| **t == "SCHEMA").count(), 1);
        assert_eq!(types.iter().filter(|t| **t == "STATE").count(), 1);
        assert!(types[1..types.len() - 1].iter().all(|t| *t == "RECORD"));
    }

    let users = stream_lines(&lines, "users");
    assert_eq!(users.len(), 1 + 3 + 1);
    assert_eq!(users[0]["key_properties"], json!(["id"]));
    assert_eq!(users[3]["record"]["name"], "cy");
    assert_eq!(users[4]["state"], json!({"pages": 2}));

    let orders = stream_lines(&lines, "orders");
    assert_eq!(orders[0]["order_by_properties"], json!(["updated_at"]));
    assert_eq!(orders[1]["record"]["since"], "2024-01-15");
    assert_eq!(orders[3]["state"], json!({"cursor": "2024-02-02"}));
}

#[tokio::test]
async fn airbyte_read_aggregates_state_at_close() {
    let source = source(users_client());
    let (result, output) = run(&source, Command::Read, read_input("airbyte", &[])).await;
    result.unwrap();

    let lines = output.lines();
    let last = lines.last().unwrap();
    assert_eq!(last["type"], "STATE");
    assert_eq!(
        last["state"],
        json!({"users": {"pages": 2}, "orders": {"cursor": "2024-02-02"}})
    );
    assert_eq!(output.of_type("STATE").len(), 1);

    let records = output.of_type("RECORD");
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r["record"]["emitted_at"].is_i64()));
}

#[tokio::test]
async fn allow_list_limits_streams() {
    let client = Arc::new(users_client());
    let source = SourceBuilder::new::<ApiConfig>()
        .http_stream(SchemaBuilder::non_incremental::<User>("users"), UsersRunner)
        .general_stream(SchemaBuilder::non_incremental::<Order>("orders"), OrdersRunner)
        .http_client(client.clone())
        .build();

    let (result, output) = run(&source, Command::Read, read_input("singer", &["orders"])).await;
    result.unwrap();
    assert!(output.lines().iter().all(|l| l["stream"] == "orders"));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn failing_stream_cancels_in_flight_sibling() {
    let client = ScriptedClient::new()
        .reply("https://api.test/users", Reply::status(401))
        .reply(
            "https://api.test/orders",
            Reply::ok(json!({"results": []})).delayed(Duration::from_secs(30)),
        );

    struct Fetch(&'static str);

    #[async_trait]
    impl HttpRunner for Fetch {
        async fn run(&self, ctx: &mut dyn HttpContext) -> Result<(), ConnectorError> {
            if self.0 == "users" {
                // Let the sibling get its request in flight first.
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            let mut response = JsonResponse::default();
            let url = format!("https://api.test/{}", self.0);
            ctx.emit_batch(&Request::get(url), &mut response, &["results"]).await
        }
    }

    let source = SourceBuilder::new::<ApiConfig>()
        .http_stream(SchemaBuilder::non_incremental::<Order>("orders"), Fetch("orders"))
        .http_stream(SchemaBuilder::non_incremental::<User>("users"), Fetch("users"))
        .concurrency(2)
        .http_client(Arc::new(client))
        .build();

    let started = Instant::now();
    let (result, output) = run(&source, Command::Read, read_input("singer", &[])).await;
    assert!(started.elapsed() < Duration::from_secs(10));

    let err = result.unwrap_err();
    assert!(
        matches!(err, RuntimeError::Stream { ref stream, ref error } if stream == "users" && error.code == "HTTP_401"),
        "{err}"
    );

    let logs = output.of_type("LOG");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["stream"], "users");
    assert_eq!(logs[0]["log"]["level"], "ERROR");
    assert!(logs[0]["log"]["message"].as_str().unwrap().contains("HTTP_401"));
}

#[tokio::test]
async fn external_cancellation_stops_the_run() {
    let client = ScriptedClient::new().reply(
        "https://api.test/users",
        Reply::ok(json!({"results": []})).delayed(Duration::from_secs(30)),
    );
    let source = SourceBuilder::new::<ApiConfig>()
        .http_stream(SchemaBuilder::non_incremental::<User>("users"), UsersRunner)
        .http_client(Arc::new(client))
        .build();

    let options = RunOptions::default();
    let token = options.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
    });

    let (result, output) = run_with(&source, Command::Read, read_input("airbyte", &[]), &options).await;
    let err = result.unwrap_err();
    assert!(err.is_cancelled(), "{err}");
    // Cancellation is not logged as a stream failure; close still runs.
    assert!(output.of_type("LOG").is_empty());
    assert_eq!(output.of_type("STATE").len(), 1);
}

#[tokio::test]
async fn concurrency_bound_is_respected() {
    struct Counting {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GeneralRunner for Counting {
        async fn run(&self, ctx: &mut dyn GeneralContext) -> Result<(), ConnectorError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            ctx.emit_one(json!({"id": 1}))
        }
    }

    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut builder = SourceBuilder::new::<ApiConfig>().concurrency(2);
    for i in 0..6 {
        builder = builder.general_stream(
            SchemaBuilder::non_incremental::<Order>(format!("s{i}")),
            Counting { active: active.clone(), peak: peak.clone() },
        );
    }
    let source = builder.http_client(Arc::new(ScriptedClient::new())).build();

    let (result, output) = run(&source, Command::Read, read_input("singer", &[])).await;
    result.unwrap();
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(output.of_type("RECORD").len(), 6);
}

struct Boom;

#[async_trait]
impl GeneralRunner for Boom {
    async fn run(&self, _ctx: &mut dyn GeneralContext) -> Result<(), ConnectorError> {
        panic!("index out of range on page 4")
    }
}

/// Fails without touching the network.
struct Broken;

#[async_trait]
impl GeneralRunner for Broken {
    async fn run(&self, _ctx: &mut dyn GeneralContext) -> Result<(), ConnectorError> {
        Err(ConnectorError::data("BAD_ROW", "row 3 has no id"))
    }
}

#[tokio::test]
async fn panicking_runner_is_contained_and_logged() {
    let source = SourceBuilder::new::<ApiConfig>()
        .general_stream(SchemaBuilder::non_incremental::<Order>("boom"), Boom)
        .general_stream(SchemaBuilder::non_incremental::<Order>("orders"), OrdersRunner)
        .general_stream(SchemaBuilder::non_incremental::<Order>("later"), OrdersRunner)
        .concurrency(1)
        .http_client(Arc::new(ScriptedClient::new()))
        .build();

    let started = Instant::now();
    let (result, output) = run(&source, Command::Read, read_input("singer", &[])).await;
    assert!(started.elapsed() < Duration::from_secs(5));

    let err = result.unwrap_err();
    let connector_err = err.as_connector_error().unwrap();
    assert_eq!(connector_err.code, "PANIC");
    assert!(connector_err.message.contains("index out of range on page 4"));
    assert!(connector_err.backtrace().is_some());

    let logs = output.of_type("LOG");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["stream"], "boom");
    let entry = &logs[0]["log"]["message"];
    assert!(entry["error"].as_str().unwrap().contains("index out of range on page 4"));
    assert!(!entry["backtrace"].as_str().unwrap().is_empty());

    // The permit is released and every queued stream still runs.
    let lines = output.lines();
    for stream in ["orders", "later"] {
        let records = stream_lines(&lines, stream)
            .into_iter()
            .filter(|l| l["type"] == "RECORD")
            .count();
        assert_eq!(records, 2, "{stream}");
    }
}

#[tokio::test]
async fn failed_run_leaves_caller_token_usable() {
    let options = RunOptions::default();

    let failing = SourceBuilder::new::<ApiConfig>()
        .general_stream(SchemaBuilder::non_incremental::<Order>("broken"), Broken)
        .http_client(Arc::new(ScriptedClient::new()))
        .build();
    let (result, _) = run_with(&failing, Command::Read, read_input("singer", &[]), &options).await;
    assert_eq!(result.unwrap_err().as_connector_error().unwrap().code, "BAD_ROW");
    assert!(!options.cancel.is_cancelled());

    let healthy = source(users_client());
    let (result, output) = run_with(&healthy, Command::Read, read_input("singer", &[]), &options).await;
    result.unwrap();
    assert_eq!(output.of_type("RECORD").len(), 5);
}

#[tokio::test]
async fn close_error_is_returned_when_read_succeeds() {
    let source = source(users_client());
    let output = StateRejectingOutput::default();
    let err = source
        .handle(
            Command::Read,
            Cursor::new(read_input("airbyte", &[])),
            output.clone(),
            &Protocols::default(),
            &RunOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.as_connector_error().unwrap().code, "WRITE_FAILED");
    assert_eq!(output.0.of_type("RECORD").len(), 5);
    assert!(output.0.of_type("STATE").is_empty());
}

#[tokio::test]
async fn read_error_takes_precedence_over_close_error() {
    let source = SourceBuilder::new::<ApiConfig>()
        .general_stream(SchemaBuilder::non_incremental::<Order>("broken"), Broken)
        .http_client(Arc::new(ScriptedClient::new()))
        .build();
    let output = StateRejectingOutput::default();
    let err = source
        .handle(
            Command::Read,
            Cursor::new(read_input("airbyte", &[])),
            output.clone(),
            &Protocols::default(),
            &RunOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, RuntimeError::Stream { ref stream, ref error } if stream == "broken" && error.code == "BAD_ROW"),
        "{err}"
    );
    assert_eq!(output.0.of_type("LOG").len(), 1);
    assert!(output.0.of_type("STATE").is_empty());
}

#[tokio::test]
async fn stream_without_runner_fails_at_read() {
    let source = SourceBuilder::new::<ApiConfig>()
        .stream(SchemaBuilder::non_incremental::<Order>("orders"))
        .http_client(Arc::new(ScriptedClient::new()))
        .build();

    let (result, output) = run(&source, Command::Read, read_input("singer", &[])).await;
    let err = result.unwrap_err();
    assert_eq!(err.as_connector_error().unwrap().code, "RUNNER_NOT_IMPLEMENTED");
    assert!(err.to_string().contains("runner not implemented"));
    assert_eq!(output.of_type("LOG").len(), 1);
}

#[tokio::test]
async fn manual_job_streams_are_flushed() {
    struct Backfill;

    #[async_trait]
    impl ManualRunner for Backfill {
        async fn run(&self, ctx: &dyn ManualContext) -> Result<(), ConnectorError> {
            let schema = SchemaBuilder::non_incremental::<Order>("backfill").build();
            let Some(mut stream) = ctx.open(schema)? else {
                return Ok(());
            };
            stream.emit_records(vec![json!({"id": 1}), json!({"id": 2})])?;
            Ok(())
        }
    }

    let source = SourceBuilder::new::<ApiConfig>()
        .manual_runner(Backfill)
        .http_client(Arc::new(ScriptedClient::new()))
        .build();

    let (result, output) = run(&source, Command::Read, read_input("airbyte", &[])).await;
    result.unwrap();
    let records = output.of_type("RECORD");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["record"]["stream"], "backfill");
}
