//! Backend-agnostic tree snapshots.
//!
//! [`export_tree`] walks an adapter and flattens it into a [`Snapshot`];
//! [`import_tree`] replays a snapshot into another (or the same) adapter,
//! directories strictly before files.
//!
//! Export output is sorted by path, segment by segment, so parents always
//! precede their children and the result is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, info, warn};

use crate::adapter::Adapter;
use crate::error::{ErrorKind, VfsError, VfsResult};
use crate::path::VfsPath;
use crate::types::{EntryKind, RemoveOptions, WriteOptions, now_millis};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A flat, versioned export of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    /// Epoch milliseconds.
    pub exported_at: i64,
    pub entries: Vec<SnapshotEntry>,
}

/// One exported entry. Paths are absolute (`/name` for root children).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SnapshotEntry {
    #[serde(rename_all = "camelCase")]
    File {
        path: VfsPath,
        name: String,
        #[serde(with = "base64_content")]
        content: Vec<u8>,
        last_modified: i64,
    },
    Directory { path: VfsPath, name: String },
}

impl SnapshotEntry {
    pub fn file(path: VfsPath, content: Vec<u8>, last_modified: i64) -> Self {
        SnapshotEntry::File {
            name: path.name().to_string(),
            path,
            content,
            last_modified,
        }
    }

    pub fn directory(path: VfsPath) -> Self {
        SnapshotEntry::Directory {
            name: path.name().to_string(),
            path,
        }
    }

    pub fn path(&self) -> &VfsPath {
        match self {
            SnapshotEntry::File { path, .. } | SnapshotEntry::Directory { path, .. } => path,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SnapshotEntry::File { name, .. } | SnapshotEntry::Directory { name, .. } => name,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            SnapshotEntry::File { .. } => EntryKind::File,
            SnapshotEntry::Directory { .. } => EntryKind::Directory,
        }
    }
}

/// Entry counts for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub files: usize,
    pub directories: usize,
    /// Total file content in bytes.
    pub bytes: u64,
}

/// On-disk snapshot encoding.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SnapshotFormat {
    /// JSON with base64 file content.
    #[default]
    Json,
    /// Compact binary with raw file content.
    Postcard,
}

impl Snapshot {
    /// A snapshot of the current format version, stamped now.
    pub fn new(entries: Vec<SnapshotEntry>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            exported_at: now_millis(),
            entries,
        }
    }

    pub fn summary(&self) -> SnapshotSummary {
        self.entries
            .iter()
            .fold(SnapshotSummary::default(), |mut summary, entry| {
                match entry {
                    SnapshotEntry::File { content, .. } => {
                        summary.files += 1;
                        summary.bytes += content.len() as u64;
                    }
                    SnapshotEntry::Directory { .. } => summary.directories += 1,
                }
                summary
            })
    }

    pub fn to_json(&self, pretty: bool) -> VfsResult<String> {
        let result = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        result.map_err(malformed)
    }

    pub fn from_json(json: &str) -> VfsResult<Self> {
        serde_json::from_str(json).map_err(malformed)
    }

    pub fn to_bytes(&self) -> VfsResult<Vec<u8>> {
        postcard::to_stdvec(&BinarySnapshot::from(self)).map_err(malformed)
    }

    pub fn from_bytes(bytes: &[u8]) -> VfsResult<Self> {
        let binary: BinarySnapshot = postcard::from_bytes(bytes).map_err(malformed)?;
        Ok(binary.into())
    }

    /// Encode in the given format. `pretty` only affects JSON.
    pub fn encode(&self, format: SnapshotFormat, pretty: bool) -> VfsResult<Vec<u8>> {
        match format {
            SnapshotFormat::Json => self.to_json(pretty).map(String::into_bytes),
            SnapshotFormat::Postcard => self.to_bytes(),
        }
    }

    pub fn decode(format: SnapshotFormat, bytes: &[u8]) -> VfsResult<Self> {
        match format {
            SnapshotFormat::Json => {
                let json = std::str::from_utf8(bytes)
                    .map_err(|e| VfsError::new(ErrorKind::Encoding, "snapshot is not UTF-8").with_source(e))?;
                Self::from_json(json)
            }
            SnapshotFormat::Postcard => Self::from_bytes(bytes),
        }
    }
}

fn malformed(err: impl std::error::Error + Send + Sync + 'static) -> VfsError {
    VfsError::new(ErrorKind::Encoding, "malformed snapshot").with_source(err)
}

/// Base64 file content for the JSON shape.
mod base64_content {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

// Postcard is not self-describing, so it cannot decode the internally
// tagged JSON shape. The binary form uses an externally tagged mirror.

#[derive(Serialize, Deserialize)]
struct BinarySnapshot {
    version: u32,
    exported_at: i64,
    entries: Vec<BinaryEntry>,
}

#[derive(Serialize, Deserialize)]
enum BinaryEntry {
    File {
        path: VfsPath,
        name: String,
        content: Vec<u8>,
        last_modified: i64,
    },
    Directory {
        path: VfsPath,
        name: String,
    },
}

impl From<&Snapshot> for BinarySnapshot {
    fn from(snapshot: &Snapshot) -> Self {
        let entries = snapshot
            .entries
            .iter()
            .map(|entry| match entry.clone() {
                SnapshotEntry::File {
                    path,
                    name,
                    content,
                    last_modified,
                } => BinaryEntry::File {
                    path,
                    name,
                    content,
                    last_modified,
                },
                SnapshotEntry::Directory { path, name } => BinaryEntry::Directory { path, name },
            })
            .collect();
        Self {
            version: snapshot.version,
            exported_at: snapshot.exported_at,
            entries,
        }
    }
}

impl From<BinarySnapshot> for Snapshot {
    fn from(binary: BinarySnapshot) -> Self {
        let entries = binary
            .entries
            .into_iter()
            .map(|entry| match entry {
                BinaryEntry::File {
                    path,
                    name,
                    content,
                    last_modified,
                } => SnapshotEntry::File {
                    path,
                    name,
                    content,
                    last_modified,
                },
                BinaryEntry::Directory { path, name } => SnapshotEntry::Directory { path, name },
            })
            .collect();
        Self {
            version: binary.version,
            exported_at: binary.exported_at,
            entries,
        }
    }
}

// ============================================================================
// Export
// ============================================================================

/// Export scope. Both lists hold path prefixes, matched per segment:
/// `/keep` covers `/keep/a.txt` but not `/keeper`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Only export entries under one of these. Empty means everything.
    pub include_paths: Vec<String>,
    /// Never export entries under any of these. Wins over includes.
    pub exclude_paths: Vec<String>,
}

impl ExportOptions {
    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    pub fn exclude(mut self, path: impl Into<String>) -> Self {
        self.exclude_paths.push(path.into());
        self
    }
}

/// Walk `adapter` depth-first and flatten it into a snapshot.
pub async fn export_tree<A: Adapter + ?Sized>(adapter: &A, options: &ExportOptions) -> VfsResult<Snapshot> {
    let includes = parse_all(&options.include_paths)?;
    let excludes = parse_all(&options.exclude_paths)?;

    let included = |path: &VfsPath| includes.is_empty() || includes.iter().any(|p| path.starts_with(p));
    let leads_to_include = |path: &VfsPath| includes.iter().any(|p| p.starts_with(path));
    let excluded = |path: &VfsPath| excludes.iter().any(|p| path.starts_with(p));

    let mut entries = Vec::new();
    let mut stack = vec![VfsPath::root()];

    while let Some(dir) = stack.pop() {
        for child in adapter.list(&dir.to_string()).await? {
            let path = dir.join(&child.name)?;
            if excluded(&path) {
                continue;
            }

            match child.kind {
                EntryKind::Directory => {
                    if included(&path) {
                        entries.push(SnapshotEntry::directory(path.clone()));
                        stack.push(path);
                    } else if leads_to_include(&path) {
                        stack.push(path);
                    }
                }
                EntryKind::File if included(&path) => {
                    let key = path.to_string();
                    let content = adapter.read_bytes(&key).await?;
                    let last_modified = adapter.metadata(&key).await?.last_modified;
                    entries.push(SnapshotEntry::file(path, content, last_modified));
                }
                EntryKind::File => {}
            }
        }
    }

    entries.sort_by(|a, b| a.path().cmp(b.path()));
    let snapshot = Snapshot::new(entries);

    let summary = snapshot.summary();
    info!(
        adapter = adapter.name(),
        files = summary.files,
        directories = summary.directories,
        bytes = summary.bytes,
        "exported snapshot"
    );
    Ok(snapshot)
}

fn parse_all(paths: &[String]) -> VfsResult<Vec<VfsPath>> {
    paths.iter().map(|p| VfsPath::parse(p)).collect()
}

// ============================================================================
// Import
// ============================================================================

/// What to do when a snapshot entry collides with an existing one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MergeBehavior {
    /// Overwrite existing entries.
    #[default]
    Replace,
    /// Leave existing entries untouched.
    Skip,
    /// Refuse the import if anything collides.
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub merge: MergeBehavior,
}

impl ImportOptions {
    pub fn merge(merge: MergeBehavior) -> Self {
        Self { merge }
    }
}

/// What an import did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub directories_created: usize,
    pub files_written: usize,
    /// Entries left out because of a conflict under [`MergeBehavior::Skip`].
    pub skipped: usize,
}

/// Replay `snapshot` into `adapter`.
///
/// A directory landing on an existing directory merges into it and is
/// never a conflict. A file landing on an existing file, or any entry
/// landing on an entry of the other kind, is.
///
/// With [`MergeBehavior::Error`] every conflict is checked before the
/// first write, so a refused import changes nothing. Backend failures
/// part way through are not rolled back under any behavior.
pub async fn import_tree<A: Adapter + ?Sized>(
    adapter: &A,
    snapshot: &Snapshot,
    options: &ImportOptions,
) -> VfsResult<ImportReport> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(VfsError::not_supported(format!(
            "snapshot version {} (expected {SNAPSHOT_VERSION})",
            snapshot.version
        )));
    }

    let mut directories: Vec<&SnapshotEntry> = snapshot
        .entries
        .iter()
        .filter(|e| e.kind().is_dir())
        .collect();
    let mut files: Vec<&SnapshotEntry> = snapshot
        .entries
        .iter()
        .filter(|e| e.kind().is_file())
        .collect();
    directories.sort_by(|a, b| a.path().cmp(b.path()));
    files.sort_by(|a, b| a.path().cmp(b.path()));

    if options.merge == MergeBehavior::Error {
        for entry in directories.iter().chain(files.iter()) {
            if conflict(adapter, entry).await?.is_some() {
                return Err(VfsError::already_exists(entry.path().to_string()));
            }
        }
    }

    let mut report = ImportReport::default();
    // Directories left alone under `Skip`; nothing below them is written.
    let mut blocked: HashSet<VfsPath> = HashSet::new();
    let is_blocked =
        |blocked: &HashSet<VfsPath>, path: &VfsPath| path.ancestors().any(|a| blocked.contains(&a));

    for entry in directories {
        let path = entry.path();
        let key = path.to_string();
        if path.is_root() {
            continue;
        }
        if is_blocked(&blocked, path) {
            report.skipped += 1;
            continue;
        }

        match existing(adapter, path).await? {
            Some(EntryKind::Directory) => continue,
            Some(EntryKind::File) => match options.merge {
                MergeBehavior::Skip => {
                    warn!(path = %path, "import skipped directory: file in the way");
                    blocked.insert(path.clone());
                    report.skipped += 1;
                    continue;
                }
                _ => adapter.remove(&key).await?,
            },
            None => {}
        }

        adapter.mkdir(&key).await?;
        report.directories_created += 1;
        debug!(path = %path, "imported directory");
    }

    for entry in files {
        let SnapshotEntry::File { path, content, .. } = entry else {
            continue;
        };
        let key = path.to_string();
        if is_blocked(&blocked, path) {
            report.skipped += 1;
            continue;
        }

        if let Some(kind) = existing(adapter, path).await? {
            match options.merge {
                MergeBehavior::Skip => {
                    warn!(path = %path, existing = %kind, "import skipped file");
                    report.skipped += 1;
                    continue;
                }
                _ if kind.is_dir() => adapter.rmdir(&key, RemoveOptions::recursive()).await?,
                _ => {}
            }
        }

        if let Some(parent) = path.parent().filter(|p| !p.is_root()) {
            adapter.mkdir(&parent.to_string()).await?;
        }
        adapter.write(&key, content, WriteOptions::replace()).await?;
        report.files_written += 1;
        debug!(path = %path, bytes = content.len(), "imported file");
    }

    info!(
        adapter = adapter.name(),
        merge = %options.merge,
        directories = report.directories_created,
        files = report.files_written,
        skipped = report.skipped,
        "imported snapshot"
    );
    Ok(report)
}

async fn existing<A: Adapter + ?Sized>(adapter: &A, path: &VfsPath) -> VfsResult<Option<EntryKind>> {
    let key = path.to_string();
    if adapter.dir_exists(&key).await? {
        Ok(Some(EntryKind::Directory))
    } else if adapter.exists(&key).await? {
        Ok(Some(EntryKind::File))
    } else {
        Ok(None)
    }
}

/// Kind of the existing entry `entry` would collide with, if any.
async fn conflict<A: Adapter + ?Sized>(adapter: &A, entry: &SnapshotEntry) -> VfsResult<Option<EntryKind>> {
    let found = existing(adapter, entry.path()).await?;
    Ok(match (entry.kind(), found) {
        (EntryKind::Directory, Some(EntryKind::Directory)) => None,
        (_, found) => found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryAdapter;

    async fn sample() -> MemoryAdapter {
        let fs = MemoryAdapter::ready().await.unwrap();
        fs.mkdir("/docs/notes").await.unwrap();
        fs.write("/docs/readme.md", b"# hi", WriteOptions::replace())
            .await
            .unwrap();
        fs.write("/docs/notes/a.txt", b"alpha", WriteOptions::replace())
            .await
            .unwrap();
        fs.write("/top.bin", &[0, 1, 2, 255], WriteOptions::replace())
            .await
            .unwrap();
        fs
    }

    #[tokio::test]
    async fn test_export_sorted_parents_first() {
        let fs = sample().await;
        let snapshot = fs.export(&ExportOptions::default()).await.unwrap();

        let paths: Vec<String> = snapshot.entries.iter().map(|e| e.path().to_string()).collect();
        assert_eq!(
            paths,
            ["/docs", "/docs/notes", "/docs/notes/a.txt", "/docs/readme.md", "/top.bin"]
        );
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(
            snapshot.summary(),
            SnapshotSummary {
                files: 3,
                directories: 2,
                bytes: 13
            }
        );
    }

    #[tokio::test]
    async fn test_export_exclude() {
        let fs = sample().await;
        let snapshot = fs
            .export(&ExportOptions::default().exclude("/docs/notes"))
            .await
            .unwrap();
        assert!(snapshot.entries.iter().all(|e| !e.path().to_string().starts_with("/docs/notes")));
        assert_eq!(snapshot.summary().files, 2);
    }

    #[tokio::test]
    async fn test_nested_include_keeps_only_subtree() {
        let fs = sample().await;
        let snapshot = fs
            .export(&ExportOptions::default().include("/docs/notes"))
            .await
            .unwrap();
        let paths: Vec<String> = snapshot.entries.iter().map(|e| e.path().to_string()).collect();
        assert_eq!(paths, ["/docs/notes", "/docs/notes/a.txt"]);
    }

    #[test]
    fn test_json_shape() {
        let snapshot = Snapshot {
            version: 1,
            exported_at: 42,
            entries: vec![
                SnapshotEntry::directory(VfsPath::parse("/d").unwrap()),
                SnapshotEntry::file(VfsPath::parse("/d/f.txt").unwrap(), b"hi".to_vec(), 7),
            ],
        };
        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json(false).unwrap()).unwrap();
        assert_eq!(value["exportedAt"], 42);
        assert_eq!(value["entries"][0]["kind"], "directory");
        assert_eq!(value["entries"][0]["path"], "/d");
        assert_eq!(value["entries"][1]["kind"], "file");
        assert_eq!(value["entries"][1]["name"], "f.txt");
        assert_eq!(value["entries"][1]["content"], "aGk=");
        assert_eq!(value["entries"][1]["lastModified"], 7);

        assert_eq!(Snapshot::from_json(&snapshot.to_json(true).unwrap()).unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_postcard_encoding() {
        let snapshot = sample().await.export(&ExportOptions::default()).await.unwrap();
        let bytes = snapshot.encode(SnapshotFormat::Postcard, false).unwrap();
        assert_eq!(Snapshot::decode(SnapshotFormat::Postcard, &bytes).unwrap(), snapshot);
        assert!(Snapshot::decode(SnapshotFormat::Json, &bytes).is_err());
    }

    #[test]
    fn test_malformed_is_encoding_error() {
        let err = Snapshot::from_json("{\"version\": 1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        let err = Snapshot::from_json(
            r#"{"version":1,"exportedAt":0,"entries":[{"kind":"file","path":"/a","name":"a","content":"!!","lastModified":0}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
    }

    #[tokio::test]
    async fn test_import_rejects_unknown_version() {
        let fs = MemoryAdapter::ready().await.unwrap();
        let mut snapshot = Snapshot::new(vec![]);
        snapshot.version = 2;
        let err = fs.import(&snapshot, &ImportOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotSupported);
    }

    #[tokio::test]
    async fn test_import_files_before_directories_in_input() {
        // Files listed first still land after their directories.
        let snapshot = Snapshot::new(vec![
            SnapshotEntry::file(VfsPath::parse("/a/b/c.txt").unwrap(), b"c".to_vec(), 0),
            SnapshotEntry::directory(VfsPath::parse("/a/b").unwrap()),
            SnapshotEntry::directory(VfsPath::parse("/a").unwrap()),
        ]);
        let fs = MemoryAdapter::ready().await.unwrap();
        let report = fs.import(&snapshot, &ImportOptions::default()).await.unwrap();
        assert_eq!(report.directories_created, 2);
        assert_eq!(report.files_written, 1);
        assert_eq!(fs.read_bytes("/a/b/c.txt").await.unwrap(), b"c");
    }

    #[tokio::test]
    async fn test_merge_behaviors() {
        let snapshot = sample().await.export(&ExportOptions::default()).await.unwrap();

        let target = MemoryAdapter::ready().await.unwrap();
        target.mkdir("/docs").await.unwrap();
        target
            .write("/docs/readme.md", b"local", WriteOptions::replace())
            .await
            .unwrap();

        let err = target
            .import(&snapshot, &ImportOptions::merge(MergeBehavior::Error))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoModificationAllowed);
        assert!(!target.exists("/top.bin").await.unwrap());

        let report = target
            .import(&snapshot, &ImportOptions::merge(MergeBehavior::Skip))
            .await
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(target.read_bytes("/docs/readme.md").await.unwrap(), b"local");
        assert!(target.exists("/top.bin").await.unwrap());

        target
            .import(&snapshot, &ImportOptions::merge(MergeBehavior::Replace))
            .await
            .unwrap();
        assert_eq!(target.read_bytes("/docs/readme.md").await.unwrap(), b"# hi");
    }

    #[tokio::test]
    async fn test_kind_conflicts() {
        let snapshot = sample().await.export(&ExportOptions::default()).await.unwrap();

        // A file where the snapshot has a directory.
        let target = MemoryAdapter::ready().await.unwrap();
        target.write("/docs", b"x", WriteOptions::replace()).await.unwrap();
        let report = target
            .import(&snapshot, &ImportOptions::merge(MergeBehavior::Skip))
            .await
            .unwrap();
        // docs itself, then notes, a.txt and readme.md below it.
        assert_eq!(report.skipped, 4);
        assert!(target.exists("/docs").await.unwrap());

        target
            .import(&snapshot, &ImportOptions::default())
            .await
            .unwrap();
        assert!(target.dir_exists("/docs").await.unwrap());
        assert_eq!(target.read_text("/docs/notes/a.txt").await.unwrap(), "alpha");

        // A directory where the snapshot has a file.
        target.remove("/top.bin").await.unwrap();
        target.mkdir("/top.bin/inner").await.unwrap();
        target
            .import(&snapshot, &ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(target.read_bytes("/top.bin").await.unwrap(), [0, 1, 2, 255]);
    }

    #[test]
    fn test_merge_behavior_parse() {
        assert_eq!("skip".parse::<MergeBehavior>().unwrap(), MergeBehavior::Skip);
        assert_eq!(MergeBehavior::Error.to_string(), "error");
        assert_eq!("postcard".parse::<SnapshotFormat>().unwrap(), SnapshotFormat::Postcard);
    }
}
