//! Shared syncline wire, schema and error model types.
//!
//! This crate is used by the connector SDK, the runtime engine and the CLI,
//! and stays free of async or I/O dependencies.

pub mod catalog;
pub mod command;
pub mod control;
pub mod error;
pub mod log;
pub mod schema;
pub mod spec;
