//! Configuration inspection commands.

use std::path::Path;

use anyhow::{bail, Context, Result};
use kestrel_config::{NodeConfig, Paths};

/// Prints the effective, fully-merged configuration for a project
/// directory (spec §6, "Environment configuration").
pub fn show(project: &str, format: &str) -> Result<()> {
    let project_path = Path::new(project);

    if !Paths::is_initialized(project_path) {
        bail!("{} is not initialized. Run 'kestrel init {project}' first.", project_path.display());
    }

    let config = NodeConfig::load_from_dir(project_path).context("failed to load configuration")?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        "toml" => println!("{}", toml::to_string_pretty(&config)?),
        _ => {
            println!("Node:");
            println!("  node_id:        {}", config.node.node_id);
            println!("  bind_addr:      {}", config.node.bind_addr);
            println!("  advertise_addr: {}", config.node.advertise_addr);
            println!("  data_dir:       {}", config.node.data_dir.display());
            println!();
            println!("Consensus:");
            println!("  bootstrap:           {}", config.consensus.bootstrap);
            println!("  join_addresses:      {:?}", config.consensus.join_addresses);
            println!("  heartbeat_timeout:   {:?}", config.consensus.heartbeat_timeout());
            println!("  election_timeout:    {:?}", config.consensus.election_timeout());
            println!("  snapshot_interval:   {:?}", config.consensus.snapshot_interval());
            println!("  snapshot_threshold:  {}", config.consensus.snapshot_threshold);
            println!("  trailing_logs:       {}", config.consensus.trailing_logs);
            println!();
            println!("Relational:");
            println!("  host: {}:{}", config.relational.host, config.relational.port);
            println!("  db:   {}", config.relational.db);
        }
    }

    Ok(())
}

/// Validates that a project directory's configuration merges cleanly.
pub fn validate(project: &str) -> Result<()> {
    let project_path = Path::new(project);
    if !Paths::is_initialized(project_path) {
        bail!("{} is not initialized. Run 'kestrel init {project}' first.", project_path.display());
    }

    match NodeConfig::load_from_dir(project_path) {
        Ok(_) => {
            println!("configuration is valid");
            Ok(())
        }
        Err(err) => {
            println!("configuration validation failed: {err}");
            Err(err)
        }
    }
}
