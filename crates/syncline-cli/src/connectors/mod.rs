//! Connectors compiled into the `syncline` binary.

pub mod pokeapi;

use anyhow::Result;
use syncline_engine::Registry;

/// Build the registry of built-in connectors.
pub fn registry() -> Result<Registry> {
    let mut registry = Registry::new();
    registry.register("pokeapi", pokeapi::source())?;
    Ok(registry)
}
