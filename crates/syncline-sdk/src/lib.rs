//! Connector authoring SDK for syncline.
//!
//! Connectors describe their streams with [`SchemaBuilder`], implement one of
//! the runner traits per stream and hand everything to the engine's source
//! builder. Configuration and record types derive [`JsonSchema`].
//!
//! ```ignore
//! use syncline_sdk::prelude::*;
//! ```

extern crate self as syncline_sdk;

pub mod context;
pub mod decode;
pub mod http;
pub mod masked;
pub mod prelude;
pub mod runner;
pub mod schema;
pub mod writer;

pub use syncline_sdk_macros::JsonSchema;
pub use syncline_types as types;

pub use crate::masked::MaskedString;
pub use crate::schema::{JsonSchema, SchemaBuilder};
