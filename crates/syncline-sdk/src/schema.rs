//! Schema derivation for configuration and record types.
//!
//! [`JsonSchema`] is implemented with `#[derive(JsonSchema)]`; the document is
//! produced at compile time from the struct's fields. [`SchemaBuilder`] turns a
//! record type into a stream [`Schema`].

use std::sync::Arc;

use serde_json::Value;
use syncline_types::schema::{FieldDef, Schema};

/// A type with a compile-time JSON schema document.
pub trait JsonSchema {
    /// The schema document, serialized.
    const SCHEMA_JSON: &'static str;

    /// The schema document as a JSON value.
    ///
    /// Yields `Value::Null` if the document does not parse, which stream
    /// validation then rejects.
    fn json_schema() -> Value {
        serde_json::from_str(Self::SCHEMA_JSON).unwrap_or(Value::Null)
    }
}

/// Builds a [`Schema`] for a stream from its record type.
///
/// ```ignore
/// let schema = SchemaBuilder::incremental::<Order>("orders")
///     .primary([field(["id"])])
///     .order_by([field(["updated_at"]).asc()])
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// A stream of `T` records that is fully re-read on every run.
    pub fn non_incremental<T: JsonSchema>(name: impl Into<String>) -> Self {
        Self { schema: Schema::new(name, T::json_schema()) }
    }

    /// A stream of `T` records that resumes from its checkpoint.
    pub fn incremental<T: JsonSchema>(name: impl Into<String>) -> Self {
        let mut builder = Self::non_incremental::<T>(name);
        builder.schema.incremental = true;
        builder
    }

    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.schema.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn primary(mut self, keys: impl IntoIterator<Item = FieldDef>) -> Self {
        self.schema.primary_key = keys.into_iter().collect();
        self
    }

    #[must_use]
    pub fn order_by(mut self, keys: impl IntoIterator<Item = FieldDef>) -> Self {
        self.schema.order_by_key = keys.into_iter().collect();
        self
    }

    #[must_use]
    pub fn iterate_by(mut self, keys: impl IntoIterator<Item = FieldDef>) -> Self {
        self.schema.iterate_by_key = keys.into_iter().collect();
        self
    }

    /// Mark the primary key as supplied by the connector rather than derived.
    #[must_use]
    pub fn custom_primary(mut self) -> Self {
        self.schema.custom_primary_key = true;
        self
    }

    #[must_use]
    pub fn custom_order_by(mut self) -> Self {
        self.schema.custom_order_by = true;
        self
    }

    #[must_use]
    pub fn custom_iterate_by(mut self) -> Self {
        self.schema.custom_iterate_by = true;
        self
    }

    pub fn build(self) -> Arc<Schema> {
        Arc::new(self.schema)
    }
}

impl From<SchemaBuilder> for Arc<Schema> {
    fn from(builder: SchemaBuilder) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JsonSchema;
    use syncline_types::schema::field;

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct User {
        id: i64,
        name: String,
        email: Option<String>,
    }

    #[test]
    fn non_incremental_derives_document() {
        let schema = SchemaBuilder::non_incremental::<User>("users").build();
        assert_eq!(schema.name, "users");
        assert!(!schema.incremental);
        assert_eq!(schema.field_keys(), vec!["email", "id", "name"]);
        assert_eq!(schema.json_schema["properties"]["id"]["type"], "integer");
    }

    #[test]
    fn incremental_with_keys() {
        let schema = SchemaBuilder::incremental::<User>("users")
            .namespace("crm")
            .primary([field(["id"])])
            .order_by([field(["id"]).asc()])
            .custom_iterate_by()
            .iterate_by([field(["page"])])
            .build();
        assert!(schema.incremental);
        assert_eq!(schema.namespace.as_deref(), Some("crm"));
        assert_eq!(schema.primary_key[0].path, vec!["id"]);
        assert!(schema.custom_iterate_by);
        schema.validate().unwrap();
    }

    #[test]
    fn custom_primary_without_keys_fails_validation() {
        let schema = SchemaBuilder::incremental::<User>("users").custom_primary().build();
        assert!(schema.validate().is_err());
    }
}
