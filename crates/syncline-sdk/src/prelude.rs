//! Convenience re-exports for connector authors.
//!
//! ```ignore
//! use syncline_sdk::prelude::*;
//! ```

// Runner traits
pub use crate::runner::{GeneralRunner, HttpRunner, ManualContext, ManualRunner};

// Context
pub use crate::context::{ContextExt, GeneralContext, HttpContext};

// HTTP
pub use crate::http::{JsonResponse, Method, Request};

// Schemas and config
pub use crate::masked::MaskedString;
pub use crate::schema::SchemaBuilder;
pub use crate::JsonSchema;
pub use syncline_types::schema::{field, FieldDef, Schema, SortOrder};

// Errors and logging
pub use syncline_types::error::{ConnectorError, ErrorCategory};
pub use syncline_types::log::{LogLevel, LogPayload, LogRecord};

pub use async_trait::async_trait;
