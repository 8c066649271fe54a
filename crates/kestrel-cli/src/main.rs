//! Kestrel node CLI.
//!
//! A replicated, multi-tenant configuration store.
//!
//! # Quick Start
//!
//! ```bash
//! # Initialize a node directory
//! kestrel init ./node1 --node-id n1 --bind-addr 127.0.0.1:7070
//!
//! # Start it as the first node of a new cluster
//! kestrel start ./node1 --bootstrap
//!
//! # Inspect its effective configuration
//! kestrel config show ./node1
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kestrel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Initialize a new node directory.
    Init {
        /// Path to the node directory to create.
        path: String,

        /// Identifier this node advertises to the rest of the cluster.
        #[arg(long, default_value = "node-1")]
        node_id: String,

        /// Address this node binds to (and advertises, unless overridden later).
        #[arg(long, default_value = "127.0.0.1:7070")]
        bind_addr: String,
    },

    /// Start a node in this process.
    Start {
        /// Path to the node directory.
        path: String,

        /// Bootstrap a brand new single-node cluster (only ever use this once).
        #[arg(long)]
        bootstrap: bool,
    },

    /// Inspect a node's effective configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the fully merged configuration.
    Show {
        /// Path to the node directory.
        path: String,

        /// Output format: text, toml or json.
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Check that the configuration loads and merges without error.
    Validate {
        /// Path to the node directory.
        path: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Init { path, node_id, bind_addr } => commands::init::run(&path, &node_id, &bind_addr),
        Commands::Start { path, bootstrap } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::start::run(&path, bootstrap))
        }
        Commands::Config(ConfigCommands::Show { path, format }) => commands::config::show(&path, &format),
        Commands::Config(ConfigCommands::Validate { path }) => commands::config::validate(&path),
    }
}
