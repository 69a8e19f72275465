//! kura: operate on a directory tree through the kura VFS.
//!
//! ## Usage
//!
//! ```bash
//! kura --root ./data ls /docs
//! kura --root ./data tree --max-depth 1
//! echo hi | kura --root ./data put /notes/hi.txt --parents
//! kura --root ./data export backup.json --include /docs
//! kura --root ./restore --create-root import backup.json --merge skip
//! ```

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use commands::Command;
use config::Config;
use kura_vfs::{Adapter, LocalAdapter};

/// Browse, copy and migrate file trees through the kura VFS.
#[derive(Parser, Debug)]
#[command(name = "kura", version)]
struct Args {
    /// Config file (default: $KURA_CONFIG, then <config dir>/kura/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory to operate on (overrides `root` in the config)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Create the root directory if it does not exist
    #[arg(long, global = true, conflicts_with = "read_only")]
    create_root: bool,

    /// Refuse every modification
    #[arg(long, global = true)]
    read_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let explicit = args.config.is_some() || std::env::var_os(config::CONFIG_ENV).is_some();
    let config_path = Config::locate(args.config.as_deref());
    let config = Config::load(config_path.as_deref(), explicit)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let root = args.root.clone().unwrap_or_else(|| config.root.clone());
    let adapter = LocalAdapter::new(&root)
        .create_root(args.create_root || config.create_root)
        .read_only(args.read_only);

    if !adapter.is_available().await {
        anyhow::bail!("{} is not a usable directory", root.display());
    }
    adapter
        .init()
        .await
        .with_context(|| format!("opening {}", root.display()))?;
    tracing::debug!(root = %root.display(), config = ?config_path, "kura ready");

    let adapter: Arc<dyn Adapter> = Arc::new(adapter);
    let result = commands::run(args.command, adapter.clone(), &config).await;
    adapter.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_root_conflicts_with_read_only() {
        let err = Args::try_parse_from(["kura", "--create-root", "--read-only", "ls"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);

        let args = Args::try_parse_from(["kura", "--read-only", "ls", "/docs"]).unwrap();
        assert!(args.read_only);
        assert!(!args.create_root);
    }
}
