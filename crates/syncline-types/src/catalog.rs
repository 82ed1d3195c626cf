//! Catalog descriptors emitted by the catalog-oriented output format.
//!
//! A [`Catalog`] lists one [`CatalogStream`] per discovered stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::Schema;

/// How a stream can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Full read of all records on every run.
    FullRefresh,
    /// Cursor-based reads since the last checkpoint.
    Incremental,
}

/// A discoverable stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStream {
    pub name: String,
    pub json_schema: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_sync_modes: Vec<SyncMode>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub source_defined_cursor: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_cursor_field: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_defined_primary_key: Vec<Vec<String>>,
    #[serde(default)]
    pub namespace: String,
}

/// Collection of discovered streams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<CatalogStream>,
}

impl From<&Schema> for CatalogStream {
    fn from(schema: &Schema) -> Self {
        let mut supported_sync_modes = vec![SyncMode::FullRefresh];
        if schema.incremental {
            supported_sync_modes.push(SyncMode::Incremental);
        }
        let default_cursor_field = schema
            .order_by_key
            .first()
            .map(|f| f.path.clone())
            .unwrap_or_default();

        Self {
            name: schema.name.clone(),
            json_schema: schema.json_schema.clone(),
            supported_sync_modes,
            source_defined_cursor: schema.incremental && !default_cursor_field.is_empty(),
            default_cursor_field,
            source_defined_primary_key: schema.primary_key.iter().map(|f| f.path.clone()).collect(),
            namespace: schema.namespace.clone().unwrap_or_default(),
        }
    }
}
