//! Layered configuration loading for a Kestrel node (spec §6, "Environment
//! configuration").
//!
//! Precedence, highest first: CLI flags (merged in by the caller, since
//! this crate has no `clap` dependency of its own) > `KESTREL_*`
//! environment variables > `kestrel.local.toml` (gitignored, local
//! overrides) > `kestrel.toml` (project config) > `~/.config/kestrel/config.toml`
//! (user defaults) > built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// The full set of options a Kestrel node reads at startup (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeIdentity,
    pub consensus: ConsensusConfig,
    pub relational: RelationalConfig,
    pub auth: AuthConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node: NodeIdentity::default(),
            consensus: ConsensusConfig::default(),
            relational: RelationalConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeIdentity {
    pub node_id: String,
    pub bind_addr: String,
    pub advertise_addr: String,
    pub data_dir: PathBuf,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            node_id: "node-1".to_string(),
            bind_addr: "127.0.0.1:7070".to_string(),
            advertise_addr: "127.0.0.1:7070".to_string(),
            data_dir: PathBuf::from(".kestrel/data"),
        }
    }
}

/// Options `kestrel_consensus::NodeConfig` needs that are not identity
/// (spec §4.2, `Start(config)`; §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub bootstrap: bool,
    pub join_addresses: Vec<String>,
    pub heartbeat_timeout_ms: u64,
    pub election_timeout_ms: u64,
    pub snapshot_interval_secs: u64,
    pub snapshot_threshold: usize,
    pub trailing_logs: usize,
}

impl ConsensusConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn election_timeout(&self) -> Duration {
        Duration::from_millis(self.election_timeout_ms)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            bootstrap: false,
            join_addresses: Vec::new(),
            heartbeat_timeout_ms: 1_000,
            election_timeout_ms: 1_000,
            snapshot_interval_secs: 120,
            snapshot_threshold: 8_192,
            trailing_logs: 10_240,
        }
    }
}

/// Connection parameters for the relational collaborator (spec §6,
/// "Relational: host, port, user, password, db, sslmode, ..."). The
/// relational store's physical schema is out of scope; only how a
/// client reaches it is this crate's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationalConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub db: String,
    pub sslmode: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub conn_max_lifetime_secs: u64,
    pub conn_max_idle_time_secs: u64,
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            user: "kestrel".to_string(),
            password: String::new(),
            db: "kestrel".to_string(),
            sslmode: "prefer".to_string(),
            max_open_conns: 32,
            max_idle_conns: 8,
            conn_max_lifetime_secs: 3600,
            conn_max_idle_time_secs: 300,
        }
    }
}

/// Token signing secret and TTLs (spec §6, "delegated to collaborator" —
/// this crate only carries the values through, it never issues tokens).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub signing_secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_secret: String::new(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 1_209_600,
        }
    }
}

impl NodeConfig {
    /// Loads configuration from the default locations, rooted at the
    /// current directory.
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Loads configuration rooted at a specific project directory.
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Resolves `data_dir` to an absolute path relative to `base_dir` if
    /// it was given as relative.
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        if self.node.data_dir.is_relative() {
            self.node.data_dir = base_dir.as_ref().join(&self.node.data_dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_consensus_timeouts() {
        let config = NodeConfig::default();
        assert_eq!(config.consensus.heartbeat_timeout(), Duration::from_secs(1));
        assert!(!config.consensus.bootstrap);
    }

    #[test]
    fn path_resolution_anchors_relative_data_dir() {
        let mut config = NodeConfig::default();
        config.resolve_paths("/srv/kestrel");
        assert_eq!(config.node.data_dir, PathBuf::from("/srv/kestrel/.kestrel/data"));
    }
}
