//! Subcommands.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use futures::StreamExt;
use tracing::info;

use crate::config::Config;
use kura_vfs::{
    Adapter, CopyOptions, Directory, Entry, ExportOptions, ImportOptions, MergeBehavior, Snapshot,
    SnapshotFormat, SourceFile, VfsPath, WalkOptions,
};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },

    /// Walk a directory depth-first
    Tree {
        #[arg(default_value = "/")]
        path: String,

        /// Deepest level to show; direct children are level 0
        #[arg(long)]
        max_depth: Option<usize>,

        #[arg(long, conflicts_with = "dirs_only")]
        files_only: bool,

        #[arg(long)]
        dirs_only: bool,
    },

    /// Print a file to stdout
    Cat { path: String },

    /// Write stdin (or --from) to a file, replacing it
    Put {
        path: String,

        /// Read content from this host file instead of stdin
        #[arg(long)]
        from: Option<PathBuf>,

        /// Create missing parent directories
        #[arg(short, long)]
        parents: bool,

        /// Fail if the file already exists
        #[arg(long)]
        no_clobber: bool,
    },

    /// Export the tree to a snapshot file
    Export {
        output: PathBuf,

        /// Only export under this path (repeatable)
        #[arg(long)]
        include: Vec<String>,

        /// Skip everything under this path (repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        #[arg(long)]
        format: Option<SnapshotFormat>,

        /// Indent JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Import a snapshot file into the tree
    Import {
        input: PathBuf,

        #[arg(long)]
        merge: Option<MergeBehavior>,

        #[arg(long)]
        format: Option<SnapshotFormat>,
    },

    /// Show storage usage
    Quota,
}

pub async fn run(command: Command, adapter: Arc<dyn Adapter>, config: &Config) -> Result<()> {
    match command {
        Command::Ls { path } => ls(adapter, &path).await,
        Command::Tree {
            path,
            max_depth,
            files_only,
            dirs_only,
        } => {
            let mut options = WalkOptions::default();
            options.max_depth = max_depth;
            if files_only {
                options = options.files_only();
            }
            if dirs_only {
                options = options.directories_only();
            }
            tree(adapter, &path, options).await
        }
        Command::Cat { path } => {
            let bytes = adapter.read_bytes(&path).await?;
            std::io::stdout().write_all(&bytes)?;
            Ok(())
        }
        Command::Put {
            path,
            from,
            parents,
            no_clobber,
        } => put(adapter, &path, from, parents, no_clobber).await,
        Command::Export {
            output,
            include,
            exclude,
            format,
            pretty,
        } => {
            let options = ExportOptions {
                include_paths: include,
                exclude_paths: exclude,
            };
            let format = format.unwrap_or(config.migration.format);
            let pretty = pretty || config.migration.pretty;
            export(adapter, &output, &options, format, pretty).await
        }
        Command::Import {
            input,
            merge,
            format,
        } => {
            let merge = merge.unwrap_or(config.migration.merge);
            let format = format.unwrap_or_else(|| format_for(&input, config.migration.format));
            import(adapter, &input, merge, format).await
        }
        Command::Quota => {
            let quota = adapter.quota().await?;
            println!("usage:     {}", quota.usage);
            println!("capacity:  {}", quota.capacity);
            println!("available: {}", quota.available);
            println!("used:      {:.2}%", quota.percent_used);
            Ok(())
        }
    }
}

async fn ls(adapter: Arc<dyn Adapter>, path: &str) -> Result<()> {
    let dir = Directory::open_at(adapter, path).await?;
    for entry in dir.entries().await? {
        match entry {
            Entry::Directory(d) => println!("{:>10}  {}/", "-", d.name()),
            Entry::File(f) => {
                let meta = f.metadata().await?;
                println!("{:>10}  {}", meta.size, f.name());
            }
        }
    }
    Ok(())
}

async fn tree(adapter: Arc<dyn Adapter>, path: &str, options: WalkOptions) -> Result<()> {
    let dir = Directory::open_at(adapter, path).await?;
    let mut stream = Box::pin(dir.walk(options).into_stream());
    while let Some(item) = stream.next().await {
        let item = item?;
        let suffix = if item.entry.is_dir() { "/" } else { "" };
        println!("{}{}{suffix}", "  ".repeat(item.depth), item.entry.name());
    }
    Ok(())
}

async fn put(
    adapter: Arc<dyn Adapter>,
    path: &str,
    from: Option<PathBuf>,
    parents: bool,
    no_clobber: bool,
) -> Result<()> {
    let target = VfsPath::parse(path)?;
    let Some(parent) = target.parent() else {
        bail!("cannot write to the root directory");
    };

    let data = match &from {
        Some(file) => std::fs::read(file).with_context(|| format!("reading {}", file.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let root = Directory::open(adapter).await?;
    let segments: Vec<&str> = parent.segments().iter().map(String::as_str).collect();
    let dir = if parents {
        root.create_path(&segments).await?
    } else {
        match root.resolve_path(&segments).await? {
            Some(Entry::Directory(dir)) => dir,
            _ => bail!("{parent} does not exist (use --parents)"),
        }
    };

    let source = SourceFile::new(target.name(), data);
    let options = CopyOptions {
        overwrite: !no_clobber,
    };
    let file = dir.create_file_from(target.name(), &source, options).await?;
    info!(path = %file.path(), bytes = source.size(), "wrote file");
    Ok(())
}

async fn export(
    adapter: Arc<dyn Adapter>,
    output: &Path,
    options: &ExportOptions,
    format: SnapshotFormat,
    pretty: bool,
) -> Result<()> {
    let snapshot = adapter.export(options).await?;
    let bytes = snapshot.encode(format, pretty)?;
    std::fs::write(output, bytes).with_context(|| format!("writing {}", output.display()))?;

    let summary = snapshot.summary();
    println!(
        "exported {} directories, {} files ({} bytes) to {}",
        summary.directories,
        summary.files,
        summary.bytes,
        output.display()
    );
    Ok(())
}

async fn import(adapter: Arc<dyn Adapter>, input: &Path, merge: MergeBehavior, format: SnapshotFormat) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let snapshot = Snapshot::decode(format, &bytes).with_context(|| format!("decoding {}", input.display()))?;
    let report = adapter.import(&snapshot, &ImportOptions::merge(merge)).await?;
    println!(
        "imported {} directories, {} files; skipped {}",
        report.directories_created, report.files_written, report.skipped
    );
    Ok(())
}

/// Guess the snapshot format from a file extension.
fn format_for(path: &Path, fallback: SnapshotFormat) -> SnapshotFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => SnapshotFormat::Json,
        Some("postcard" | "bin") => SnapshotFormat::Postcard,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use kura_vfs::LocalAdapter;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(subcommand)]
        command: Command,
    }

    #[test]
    fn parse_tree_flags() {
        let cli = Cli::try_parse_from(["kura", "tree", "/docs", "--max-depth", "2", "--files-only"]).unwrap();
        match cli.command {
            Command::Tree {
                path,
                max_depth,
                files_only,
                dirs_only,
            } => {
                assert_eq!(path, "/docs");
                assert_eq!(max_depth, Some(2));
                assert!(files_only);
                assert!(!dirs_only);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Cli::try_parse_from(["kura", "tree", "--files-only", "--dirs-only"]).is_err());
    }

    #[test]
    fn parse_import_merge() {
        let cli = Cli::try_parse_from(["kura", "import", "snap.bin", "--merge", "skip"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Import {
                merge: Some(MergeBehavior::Skip),
                ..
            }
        ));
        assert!(Cli::try_parse_from(["kura", "import", "snap.bin", "--merge", "maybe"]).is_err());
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(format_for(Path::new("a.json"), SnapshotFormat::Postcard), SnapshotFormat::Json);
        assert_eq!(format_for(Path::new("a.bin"), SnapshotFormat::Json), SnapshotFormat::Postcard);
        assert_eq!(format_for(Path::new("a"), SnapshotFormat::Postcard), SnapshotFormat::Postcard);
    }

    #[tokio::test]
    async fn export_then_import_between_roots() {
        let src = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("docs")).unwrap();
        std::fs::write(src.path().join("docs/a.txt"), "alpha").unwrap();
        let dst = tempfile::TempDir::new().unwrap();
        let snapshot_file = dst.path().join("snap.json");

        let from = LocalAdapter::new(src.path());
        from.init().await.unwrap();
        let from: Arc<dyn Adapter> = Arc::new(from);
        export(from, &snapshot_file, &ExportOptions::default(), SnapshotFormat::Json, true)
            .await
            .unwrap();

        let to = LocalAdapter::new(dst.path().join("restored")).create_root(true);
        to.init().await.unwrap();
        let to: Arc<dyn Adapter> = Arc::new(to);
        import(to, &snapshot_file, MergeBehavior::Replace, SnapshotFormat::Json)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dst.path().join("restored/docs/a.txt")).unwrap(), "alpha");
    }

    #[tokio::test]
    async fn put_from_file_with_parents() {
        let root = tempfile::TempDir::new().unwrap();
        let input = root.path().join("input.txt");
        std::fs::write(&input, "payload").unwrap();
        let adapter = LocalAdapter::new(root.path());
        adapter.init().await.unwrap();
        let adapter: Arc<dyn Adapter> = Arc::new(adapter);

        put(adapter.clone(), "/a/b/out.txt", Some(input.clone()), true, false)
            .await
            .unwrap();
        assert_eq!(adapter.read_text("/a/b/out.txt").await.unwrap(), "payload");

        assert!(put(adapter.clone(), "/a/b/out.txt", Some(input.clone()), false, true).await.is_err());
        assert!(put(adapter, "/missing/out.txt", Some(input), false, false).await.is_err());
    }
}
