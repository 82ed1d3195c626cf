//! Source for the public PokeAPI.
//!
//! Every stream is a paginated list endpoint returning named resources, so
//! one shared runner serves all of them.

use serde::{Deserialize, Serialize};
use syncline_engine::{Source, SourceBuilder};
use syncline_sdk::prelude::*;

const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PokeApiConfig {
    /// API root, without a trailing slash.
    #[serde(default = "default_base_url")]
    #[schema(default = "https://pokeapi.co/api/v2")]
    pub base_url: String,

    /// Resources per page.
    #[serde(default = "default_page_size")]
    #[schema(default = 100)]
    pub page_size: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

fn default_page_size() -> u32 {
    100
}

/// A `{name, url}` entry of a list endpoint.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct NamedResource {
    pub name: String,
    pub url: String,
}

/// Follows `next` links of a list endpoint named after the stream.
struct ListRunner;

#[async_trait]
impl HttpRunner for ListRunner {
    async fn run(&self, ctx: &mut dyn HttpContext) -> Result<(), ConnectorError> {
        let config: PokeApiConfig = ctx.config()?;
        let base = config.base_url.trim_end_matches('/');
        let mut next = Some(format!(
            "{base}/{}?limit={}",
            ctx.stream_name(),
            config.page_size.max(1)
        ));
        let mut response = JsonResponse::default();
        let mut pages = 0u32;

        while let Some(url) = next.take() {
            ctx.emit_batch(&Request::get(url), &mut response, &["results"])
                .await?;
            pages += 1;
            next = response.string(&["next"]).map(str::to_owned);
        }

        ctx.emit_log(LogRecord::info(format!("read {pages} page(s)")))?;
        Ok(())
    }
}

fn builder() -> SourceBuilder {
    SourceBuilder::new::<PokeApiConfig>()
        .shared_http_runner(ListRunner)
        .http_stream_shared(
            SchemaBuilder::non_incremental::<NamedResource>("pokemon").primary([field(["name"])]),
        )
        .http_stream_shared(
            SchemaBuilder::non_incremental::<NamedResource>("berry").primary([field(["name"])]),
        )
        .http_stream_shared(
            SchemaBuilder::non_incremental::<NamedResource>("move").primary([field(["name"])]),
        )
        .documentation(["https://pokeapi.co/docs/v2"])
        .notes(["Public API; no authentication required."])
        .version(env!("CARGO_PKG_VERSION"))
        .concurrency(3)
}

pub fn source() -> Source {
    builder().build()
}
