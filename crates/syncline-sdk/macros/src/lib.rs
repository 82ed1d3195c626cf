//! Proc macros for the syncline connector SDK.
//!
//! This crate is an internal implementation detail of `syncline-sdk`.
//! Depend on `syncline_sdk::JsonSchema` instead.

mod schema;

use proc_macro::TokenStream;

/// Derive a JSON Schema (Draft 7) document from a struct at compile time.
///
/// Generates `impl JsonSchema for T` with `const SCHEMA_JSON: &'static str`.
/// Used both for connector configuration types (the `connectionSpecification`
/// of the `spec` command) and for stream record types.
///
/// # Supported `#[schema(...)]` attributes
///
/// - `secret`: marks field as sensitive (`"x-secret": true`)
/// - `default = <value>`: sets JSON Schema default
/// - `advanced`: marks as advanced setting (`"x-advanced": true`)
/// - `example = <value>`: adds to `"examples"` array
/// - `env = "<VAR>"`: documents env var fallback (`"x-env-var"`)
/// - `values("<a>", "<b>")`: string enum constraint
/// - `kind = "<json type>"`: overrides the inferred JSON type
/// - `format = "<format>"`: sets the string `format`
///
/// `#[serde(rename = "..")]` renames a property and `#[serde(skip)]`
/// removes it from the document.
#[proc_macro_derive(JsonSchema, attributes(schema))]
pub fn derive_json_schema(input: TokenStream) -> TokenStream {
    schema::expand(input.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
