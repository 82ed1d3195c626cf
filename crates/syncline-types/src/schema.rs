//! Stream schema descriptors.
//!
//! A [`Schema`] names one stream, carries the JSON schema document derived
//! from its record type and declares key fields. Schemas are built once at
//! startup and shared read-only behind an `Arc`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConnectorError;

/// Sort direction of an order-by or iterate-by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A key field addressed by its path into the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

/// Build a [`FieldDef`] from path segments.
///
/// ```
/// use syncline_types::schema::field;
///
/// let key = field(["customer", "id"]).asc();
/// assert_eq!(key.path, vec!["customer", "id"]);
/// ```
pub fn field<I, S>(path: I) -> FieldDef
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    FieldDef {
        path: path.into_iter().map(Into::into).collect(),
        encoding: None,
        sort_order: None,
    }
}

impl FieldDef {
    #[must_use]
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    #[must_use]
    pub fn asc(mut self) -> Self {
        self.sort_order = Some(SortOrder::Asc);
        self
    }

    #[must_use]
    pub fn desc(mut self) -> Self {
        self.sort_order = Some(SortOrder::Desc);
        self
    }

    /// First path segment, i.e. the top-level property holding the key.
    pub fn top_level(&self) -> Option<&str> {
        self.path.first().map(String::as_str)
    }
}

/// Descriptor of one logical stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub json_schema: Value,
    pub incremental: bool,
    #[serde(default)]
    pub primary_key: Vec<FieldDef>,
    #[serde(default)]
    pub order_by_key: Vec<FieldDef>,
    #[serde(default)]
    pub iterate_by_key: Vec<FieldDef>,
    #[serde(default)]
    pub custom_primary_key: bool,
    #[serde(default)]
    pub custom_order_by: bool,
    #[serde(default)]
    pub custom_iterate_by: bool,
}

impl Schema {
    /// Create a full-refresh schema with no keys.
    pub fn new(name: impl Into<String>, json_schema: Value) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            json_schema,
            incremental: false,
            primary_key: Vec::new(),
            order_by_key: Vec::new(),
            iterate_by_key: Vec::new(),
            custom_primary_key: false,
            custom_order_by: false,
            custom_iterate_by: false,
        }
    }

    /// Sorted top-level property names of the schema document.
    pub fn field_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .json_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Check the schema is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns a schema-category [`ConnectorError`] describing the first
    /// problem found.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.name.trim().is_empty() {
            return Err(ConnectorError::schema("EMPTY_NAME", "stream name must not be empty"));
        }
        if !self.json_schema.is_object() {
            return Err(self.invalid("INVALID_DOCUMENT", "schema document must be a JSON object"));
        }
        if self.incremental && self.custom_primary_key && self.primary_key.is_empty() {
            return Err(self.invalid(
                "MISSING_PRIMARY_KEY",
                "incremental stream declares a custom primary key but provides none",
            ));
        }
        if self.incremental && self.custom_order_by && self.order_by_key.is_empty() {
            return Err(self.invalid(
                "MISSING_ORDER_BY",
                "incremental stream declares a custom order-by key but provides none",
            ));
        }
        if self.custom_iterate_by && self.iterate_by_key.is_empty() {
            return Err(self.invalid(
                "MISSING_ITERATE_BY",
                "stream declares a custom iterate-by key but provides none",
            ));
        }

        let known = self.field_keys();
        let keys = [
            ("primary", &self.primary_key, self.custom_primary_key),
            ("order-by", &self.order_by_key, self.custom_order_by),
            ("iterate-by", &self.iterate_by_key, self.custom_iterate_by),
        ];
        for (kind, fields, custom) in keys {
            for f in fields {
                let Some(top) = f.top_level() else {
                    return Err(self.invalid("EMPTY_KEY_PATH", format!("{kind} key has an empty path")));
                };
                // Connector-supplied keys need not appear in the derived document.
                if !custom && !known.iter().any(|k| k == top) {
                    return Err(self.invalid(
                        "UNKNOWN_KEY_FIELD",
                        format!("{kind} key '{top}' is not a property of the stream"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn invalid(&self, code: &str, message: impl std::fmt::Display) -> ConnectorError {
        ConnectorError::schema(code, format!("stream '{}': {message}", self.name))
    }
}
