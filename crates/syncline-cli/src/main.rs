mod commands;
mod connectors;
mod logging;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "syncline",
    version,
    about = "Run data-extraction connectors over a line-delimited JSON protocol"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered connectors
    Connectors,
    /// Run a connector command, reading control messages from stdin
    Run {
        /// Connector name (see `syncline connectors`)
        connector: String,
        /// One of spec, check, discover, read
        command: String,
    },
    /// Run a connector command with airbyte-style arguments
    Airbyte {
        /// Connector name (see `syncline connectors`)
        connector: String,
        /// One of spec, check, discover, read
        command: String,
        /// Config file path or inline JSON
        #[arg(long)]
        config: Option<String>,
        /// State file path or inline JSON
        #[arg(long)]
        state: Option<String>,
        /// Catalog file path or inline JSON
        #[arg(long)]
        catalog: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    let registry = connectors::registry()?;

    match cli.command {
        Commands::Connectors => commands::connectors::execute(&registry),
        Commands::Run { connector, command } => {
            commands::run::execute(&registry, &connector, &command).await
        }
        Commands::Airbyte { connector, command, config, state, catalog } => {
            let args = commands::airbyte::AirbyteArgs { config, state, catalog };
            commands::airbyte::execute(&registry, &connector, &command, &args).await
        }
    }
}
