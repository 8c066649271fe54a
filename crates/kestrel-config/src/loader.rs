//! Multi-source configuration merging, layering environment variables and
//! TOML files over built-in defaults.

use crate::{NodeConfig, Paths};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Builder for loading a [`NodeConfig`] with precedence: environment
/// variables override every file source, project-local overrides
/// override the project file, which overrides the user default, which
/// overrides built-in defaults. CLI-flag precedence above env vars is
/// the caller's responsibility — `kestrel-cli` merges parsed flags into
/// the result after `load()` returns.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "KESTREL".to_string(),
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn load(self) -> Result<NodeConfig> {
        let mut builder = config::Config::builder();

        let defaults = NodeConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        let paths = Paths::new();
        if let Ok(user_config_file) = paths.user_config_file() {
            if user_config_file.exists() {
                builder = builder
                    .add_source(config::File::from(user_config_file).required(false).format(config::FileFormat::Toml));
            }
        }

        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder
                .add_source(config::File::from(project_config_file).required(false).format(config::FileFormat::Toml));
        }

        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder
                .add_source(config::File::from(local_config_file).required(false).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix).separator("_").try_parsing(true),
        );

        let built = builder.build().context("failed to build configuration")?;
        let mut node_config: NodeConfig = built.try_deserialize().context("failed to deserialize configuration")?;
        node_config.resolve_paths(&self.project_dir);
        Ok(node_config)
    }

    pub fn load_or_default(self) -> NodeConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_with_no_files_returns_defaults() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config = ConfigLoader::new().with_project_dir(temp_dir.path()).load().expect("failed to load config");
        assert_eq!(config.node.bind_addr, "127.0.0.1:7070");
        assert_eq!(config.consensus.snapshot_threshold, 8_192);
    }

    #[test]
    fn project_file_overrides_defaults() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("kestrel.toml"),
            r#"
[node]
node_id = "n1"
bind_addr = "0.0.0.0:9000"

[consensus]
bootstrap = true
"#,
        )
        .expect("failed to write project config");

        let config = ConfigLoader::new().with_project_dir(project_dir).load().expect("failed to load config");
        assert_eq!(config.node.node_id, "n1");
        assert_eq!(config.node.bind_addr, "0.0.0.0:9000");
        assert!(config.consensus.bootstrap);
    }

    #[test]
    fn local_file_overrides_project_file() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(project_dir.join("kestrel.toml"), "[node]\nbind_addr = \"127.0.0.1:7070\"\n")
            .expect("failed to write project config");
        fs::write(project_dir.join("kestrel.local.toml"), "[node]\nbind_addr = \"localhost:9999\"\n")
            .expect("failed to write local config");

        let config = ConfigLoader::new().with_project_dir(project_dir).load().expect("failed to load config");
        assert_eq!(config.node.bind_addr, "localhost:9999");
    }

    #[test]
    fn relative_data_dir_is_resolved_to_project_dir() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        let config = ConfigLoader::new().with_project_dir(project_dir).load().expect("failed to load config");
        assert!(config.node.data_dir.is_absolute());
    }
}
