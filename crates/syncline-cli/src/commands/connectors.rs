use anyhow::Result;
use syncline_engine::{Protocols, Registry};

/// Execute the `connectors` command: list registered connectors and their streams.
pub fn execute(registry: &Registry) -> Result<()> {
    if registry.is_empty() {
        println!("No connectors registered.");
        return Ok(());
    }

    for (name, source) in registry.iter() {
        let spec = source.spec();
        match &spec.version {
            Some(version) => println!("  {name}@{version}"),
            None => println!("  {name}"),
        }
        if !spec.documentation_url.is_empty() {
            println!("    Docs:    {}", spec.documentation_url);
        }
        for def in source.definitions() {
            let mode = if def.schema.incremental { "incremental" } else { "full refresh" };
            println!("    Stream:  {} ({mode})", def.name());
        }
    }

    let protocols = Protocols::default();
    println!("\nOutput formats: {}", protocols.formats().collect::<Vec<_>>().join(", "));
    Ok(())
}
