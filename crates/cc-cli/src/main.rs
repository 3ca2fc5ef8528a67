// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use cc_cli::commands::{self, SchemaKind};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exit code for runtime errors.
const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "cc", version, about = "Connector execution core CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dispatch a single operation against an empty handler registry.
    ///
    /// Useful for local adapter development: register your handler in
    /// code, then smoke-test it without standing up `cc-server`.
    Execute {
        /// Operation id to dispatch.
        operation: String,

        /// Parameters as a JSON string.
        #[arg(long, default_value = "{}")]
        params: String,
    },

    /// Inspect built-in metadata resolvers.
    #[command(subcommand)]
    Metadata(MetadataCommands),

    /// Inspect the handler/metadata registries.
    #[command(subcommand)]
    Registry(RegistryCommands),

    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Print a JSON schema to stdout.
    Schema {
        /// Which schema to print.
        #[arg(value_enum)]
        kind: SchemaArg,
    },
}

#[derive(Subcommand, Debug)]
enum MetadataCommands {
    /// Resolve metadata for one connector.
    Resolve {
        /// Connector id (e.g. `google-sheets`, `hubspot`).
        connector: String,

        /// Parameters as a JSON string (e.g. `{"spreadsheetId":"..."}`).
        #[arg(long, default_value = "{}")]
        params: String,
    },
}

#[derive(Subcommand, Debug)]
enum RegistryCommands {
    /// List connectors with a registered metadata resolver.
    List,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Load and validate a configuration file.
    Check {
        /// Path to a TOML config file. Defaults to built-in defaults.
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum SchemaArg {
    /// ServiceConfig schema.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug { EnvFilter::new("cc=debug") } else { EnvFilter::new("cc=info") };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = run(cli.command).await;

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(EXIT_RUNTIME_ERROR);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Execute { operation, params } => {
            let params: serde_json::Value = serde_json::from_str(&params)?;
            let registry = cc_registry::HandlerRegistry::new();
            println!("{}", commands::execute(&registry, &operation, params).await?);
        }
        Commands::Metadata(MetadataCommands::Resolve { connector, params }) => {
            let params: serde_json::Value = serde_json::from_str(&params)?;
            let registry = commands::default_metadata_registry();
            println!("{}", commands::resolve_metadata(&registry, &connector, params).await?);
        }
        Commands::Registry(RegistryCommands::List) => {
            let registry = commands::default_metadata_registry();
            for id in commands::list_metadata_connectors(&registry) {
                println!("{id}");
            }
        }
        Commands::Config(ConfigCommands::Check { file }) => {
            for line in commands::config_check(file.as_deref())? {
                println!("{line}");
            }
        }
        Commands::Schema { kind } => {
            let sk = match kind {
                SchemaArg::Config => SchemaKind::Config,
            };
            println!("{}", commands::schema_json(sk)?);
        }
    }
    Ok(())
}
