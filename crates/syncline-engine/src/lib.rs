//! Connector runtime for syncline.
//!
//! Decodes the control stream, binds an output protocol, and runs a
//! [`Source`]'s streams concurrently under a shared cancellation token.

pub(crate) mod check;
mod dispatch;
pub mod errors;
pub(crate) mod manual;
pub mod panic;
pub mod protocol;
pub mod registry;
pub(crate) mod scheduler;
pub mod session;
pub mod sink;
pub mod source;

// Re-export public API for convenience
pub use check::{probe, CheckOutcome};
pub use dispatch::RunOptions;
pub use errors::{ControlError, RuntimeError};
pub use protocol::{Protocol, Protocols};
pub use registry::Registry;
pub use session::Session;
pub use source::{Runner, Source, SourceBuilder, StreamDefinition};
