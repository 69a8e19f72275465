//! `kura` configuration file.
//!
//! Looked up at `--config`, then `$KURA_CONFIG`, then
//! `<config_dir>/kura/config.toml`. A missing file means defaults.

use anyhow::{Context, Result};
use kura_vfs::{MergeBehavior, SnapshotFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "KURA_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory the local adapter serves.
    pub root: PathBuf,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Create `root` if it is missing.
    pub create_root: bool,
    pub migration: MigrationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            log_filter: "info".to_string(),
            create_root: false,
            migration: MigrationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub merge: MergeBehavior,
    pub format: SnapshotFormat,
    /// Indent JSON snapshots.
    pub pretty: bool,
}

impl Config {
    /// Config path from an explicit flag, the environment, or the platform config dir.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|p| p.join("kura").join("config.toml"))
    }

    /// Load the config at `path`. A missing file yields defaults unless the
    /// path was given explicitly.
    pub fn load(path: Option<&Path>, required: bool) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).with_context(|| format!("parsing {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
