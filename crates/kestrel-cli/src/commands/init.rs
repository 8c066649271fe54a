//! Initialize command — creates a new Kestrel node directory.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use kestrel_config::{NodeConfig, Paths};

pub fn run(path: &str, node_id: &str, bind_addr: &str) -> Result<()> {
    let project_dir = Path::new(path);

    if Paths::is_initialized(project_dir) {
        bail!("{} is already initialized (kestrel.toml already exists)", project_dir.display());
    }

    fs::create_dir_all(project_dir).context("failed to create project directory")?;
    let state_dir = Paths::state_dir(project_dir);
    fs::create_dir_all(state_dir.join("data")).context("failed to create data directory")?;

    let mut config = NodeConfig::default();
    config.node.node_id = node_id.to_string();
    config.node.bind_addr = bind_addr.to_string();
    config.node.advertise_addr = bind_addr.to_string();

    let config_path = Paths::project_config_file(project_dir);
    let config_toml = toml::to_string_pretty(&config).context("failed to serialize configuration")?;
    fs::write(&config_path, config_toml).context("failed to write kestrel.toml")?;

    let gitignore_path = project_dir.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(&gitignore_path, ".kestrel/\nkestrel.local.toml\n").context("failed to write .gitignore")?;
    }

    println!("Initialized node '{node_id}' in {}", project_dir.display());
    println!("  config: {}", config_path.display());
    println!();
    println!("Start it with:");
    println!("  kestrel start --bootstrap {path}");

    Ok(())
}
