//! Local filesystem adapter.
//!
//! Provides access to a real directory tree, with path security to
//! prevent escaping the root directory.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::adapter::{Adapter, Lifecycle};
use crate::error::{ErrorKind, VfsError, VfsResult};
use crate::path::VfsPath;
use crate::types::{
    DirEntry, EntryId, EntryKind, Metadata, Quota, RemoveOptions, WriteOptions, system_time_millis,
};

#[derive(Debug, Default)]
struct LocalState {
    lifecycle: Lifecycle,
    /// Canonical root, set by `init`.
    root: Option<PathBuf>,
}

/// Local filesystem adapter.
///
/// All paths are relative to `root`. For example, if `root` is
/// `/home/amy/project`, then `read_bytes("/src/main.rs")` reads
/// `/home/amy/project/src/main.rs`.
///
/// `.` and `..` never reach this adapter (they are rejected by
/// [`VfsPath`]); symlinks that point outside the root are refused.
#[derive(Debug)]
pub struct LocalAdapter {
    root: PathBuf,
    create_root: bool,
    read_only: bool,
    state: RwLock<LocalState>,
}

impl LocalAdapter {
    /// Create an idle adapter rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            create_root: false,
            read_only: false,
            state: RwLock::new(LocalState::default()),
        }
    }

    /// Create the root directory on `init` if it does not exist.
    pub fn create_root(mut self, create: bool) -> Self {
        self.create_root = create;
        self
    }

    /// Refuse every mutating operation.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Get the configured root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn canonical_root(&self) -> VfsResult<PathBuf> {
        let state = self.state.read();
        state.lifecycle.ensure_ready(self.name())?;
        state
            .root
            .clone()
            .ok_or_else(|| VfsError::invalid_state("local adapter has no root"))
    }

    /// Map a VFS path to a host path within the root.
    ///
    /// Returns `Security` if the path, or whatever a write to it would
    /// create, lands outside the root. Dangling symlinks are followed to
    /// where they point.
    fn resolve(&self, path: &VfsPath) -> VfsResult<PathBuf> {
        let root = self.canonical_root()?;
        let full = path.segments().iter().fold(root.clone(), |acc, s| acc.join(s));

        match within_root(&full, &root, MAX_LINK_HOPS) {
            Ok(true) => Ok(full),
            Ok(false) => Err(VfsError::new(ErrorKind::Security, "path escapes root")
                .with_path(path.to_string())),
            Err(e) => Err(VfsError::wrap_io(path.to_string(), e)),
        }
    }

    /// Check if write operations are allowed.
    fn check_writable(&self, path: &VfsPath) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::read_only(path.to_string()))
        } else {
            Ok(())
        }
    }

    async fn stat(&self, path: &VfsPath) -> VfsResult<(PathBuf, std::fs::Metadata)> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full)
            .await
            .map_err(|e| VfsError::wrap_io(path.to_string(), e))?;
        Ok((full, meta))
    }

    async fn stat_file(&self, path: &VfsPath) -> VfsResult<(PathBuf, std::fs::Metadata)> {
        let (full, meta) = self.stat(path).await?;
        if meta.is_dir() {
            return Err(VfsError::not_a_file(path.to_string()));
        }
        Ok((full, meta))
    }

    async fn stat_dir(&self, path: &VfsPath) -> VfsResult<PathBuf> {
        let (full, meta) = self.stat(path).await?;
        if !meta.is_dir() {
            return Err(VfsError::not_a_directory(path.to_string()));
        }
        Ok(full)
    }

    /// Kind at `path`, or `None` if nothing is there.
    async fn probe(&self, path: &VfsPath) -> VfsResult<Option<EntryKind>> {
        let full = self.resolve(path)?;
        match fs::metadata(&full).await {
            Ok(meta) if meta.is_dir() => Ok(Some(EntryKind::Directory)),
            Ok(_) => Ok(Some(EntryKind::File)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VfsError::wrap_io(path.to_string(), e)),
        }
    }

    /// Total size of the files under the root, walked with an explicit stack.
    async fn usage(&self, root: &Path) -> u64 {
        let mut total = 0;
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(mut entries) = fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                match entry.metadata().await {
                    Ok(meta) if meta.is_dir() => stack.push(entry.path()),
                    Ok(meta) => total += meta.len(),
                    Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping in usage scan"),
                }
            }
        }
        total
    }

    #[cfg(unix)]
    fn identity(meta: &std::fs::Metadata) -> EntryId {
        use std::os::unix::fs::MetadataExt;
        EntryId {
            device: meta.dev(),
            object: meta.ino(),
        }
    }

    #[cfg(not(unix))]
    fn identity(full: &Path, meta: &std::fs::Metadata) -> EntryId {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        full.hash(&mut hasher);
        meta.created().ok().hash(&mut hasher);
        EntryId {
            device: 0,
            object: hasher.finish(),
        }
    }
}

/// Dangling links followed before giving up.
const MAX_LINK_HOPS: u32 = 40;

/// True if `path` stays under `root` once symlinks are followed.
///
/// The deepest existing ancestor is canonicalized and the missing tail
/// appended; the tail holds plain names only. A dangling link is replaced
/// by its target and checked again.
fn within_root(path: &Path, root: &Path, hops: u32) -> std::io::Result<bool> {
    let mut existing = path;
    let mut tail = Vec::new();
    loop {
        match std::fs::symlink_metadata(existing) {
            Ok(_) => break,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Ok(false);
                };
                tail.push(name);
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    }

    match dunce::canonicalize(existing) {
        Ok(base) => Ok(base.starts_with(root)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if hops == 0 {
                return Ok(false);
            }
            let link = std::fs::read_link(existing)?;
            let mut target = match existing.parent() {
                Some(parent) => parent.join(link),
                None => link,
            };
            for name in tail.iter().rev() {
                target.push(name);
            }
            within_root(&target, root, hops - 1)
        }
        Err(e) => Err(e),
    }
}

#[async_trait]
impl Adapter for LocalAdapter {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn is_available(&self) -> bool {
        match fs::metadata(&self.root).await {
            Ok(meta) => meta.is_dir(),
            Err(_) if self.create_root && !self.read_only => match self.root.parent() {
                Some(parent) => fs::metadata(parent).await.is_ok_and(|m| m.is_dir()),
                None => false,
            },
            Err(_) => false,
        }
    }

    async fn init(&self) -> VfsResult<()> {
        if self.state.read().lifecycle == Lifecycle::Ready {
            return Ok(());
        }

        let display = self.root.display().to_string();
        if self.create_root && !self.read_only {
            fs::create_dir_all(&self.root)
                .await
                .map_err(|e| VfsError::wrap_io(display.clone(), e))?;
        }

        // Canonicalize to handle symlinked roots (e.g. macOS `/tmp` → `/private/tmp`).
        let canonical = dunce::canonicalize(&self.root).map_err(|e| VfsError::wrap_io(display.clone(), e))?;
        if !canonical.is_dir() {
            return Err(VfsError::not_a_directory(display));
        }

        let mut state = self.state.write();
        state.root = Some(canonical);
        state.lifecycle = Lifecycle::Ready;
        info!(root = %self.root.display(), read_only = self.read_only, "local adapter ready");
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.state.write();
        if state.lifecycle == Lifecycle::Ready {
            info!(root = %self.root.display(), "local adapter closed");
        }
        if state.lifecycle != Lifecycle::Idle {
            state.lifecycle = Lifecycle::Closed;
            state.root = None;
        }
    }

    async fn metadata(&self, path: &str) -> VfsResult<Metadata> {
        let path = VfsPath::parse(path)?;
        let (_, meta) = self.stat(&path).await?;
        let modified = meta.modified().map(system_time_millis).unwrap_or(0);
        Ok(if meta.is_dir() {
            Metadata::directory(path.name(), modified)
        } else {
            Metadata::file(path.name(), meta.len(), modified)
        })
    }

    async fn entry_id(&self, path: &str) -> VfsResult<EntryId> {
        let path = VfsPath::parse(path)?;
        let (_full, meta) = self.stat(&path).await?;
        #[cfg(unix)]
        return Ok(Self::identity(&meta));
        #[cfg(not(unix))]
        return Ok(Self::identity(&_full, &meta));
    }

    async fn read_bytes(&self, path: &str) -> VfsResult<Vec<u8>> {
        let path = VfsPath::parse(path)?;
        let (full, _) = self.stat_file(&path).await?;
        fs::read(&full)
            .await
            .map_err(|e| VfsError::wrap_io(path.to_string(), e))
    }

    async fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let path = VfsPath::parse(path)?;
        let full = self.stat_dir(&path).await?;

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full)
            .await
            .map_err(|e| VfsError::wrap_io(path.to_string(), e))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| VfsError::wrap_io(path.to_string(), e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                warn!(path = %entry.path().display(), "skipping entry with a non-UTF-8 name");
                continue;
            };
            // Follows symlinks; dangling links and special files are skipped.
            let kind = match fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_dir() => EntryKind::Directory,
                Ok(meta) if meta.is_file() => EntryKind::File,
                _ => continue,
            };
            entries.push(DirEntry::new(name, kind));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn exists(&self, path: &str) -> VfsResult<bool> {
        let path = VfsPath::parse(path)?;
        Ok(self.probe(&path).await? == Some(EntryKind::File))
    }

    async fn dir_exists(&self, path: &str) -> VfsResult<bool> {
        let path = VfsPath::parse(path)?;
        Ok(self.probe(&path).await? == Some(EntryKind::Directory))
    }

    async fn write(&self, path: &str, data: &[u8], options: WriteOptions) -> VfsResult<()> {
        let path = VfsPath::parse(path)?;
        self.check_writable(&path)?;
        if path.is_root() {
            return Err(VfsError::not_a_file(path.to_string()));
        }
        if let Some(parent) = path.parent() {
            self.stat_dir(&parent).await?;
        }
        if self.probe(&path).await? == Some(EntryKind::Directory) {
            return Err(VfsError::not_a_file(path.to_string()));
        }

        let full = self.resolve(&path)?;
        let wrap = |e| VfsError::wrap_io(path.to_string(), e);

        match options.position {
            None => fs::write(&full, data).await.map_err(wrap)?,
            Some(position) => {
                let mut file = fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(!options.keep_existing)
                    .open(&full)
                    .await
                    .map_err(wrap)?;
                // Seeking past the end and writing zero-fills the gap.
                file.seek(SeekFrom::Start(position)).await.map_err(wrap)?;
                file.write_all(data).await.map_err(wrap)?;
                file.flush().await.map_err(wrap)?;
            }
        }

        debug!(path = %path, bytes = data.len(), position = ?options.position, "local write");
        Ok(())
    }

    async fn truncate(&self, path: &str, size: u64) -> VfsResult<()> {
        let path = VfsPath::parse(path)?;
        self.check_writable(&path)?;
        let (full, _) = self.stat_file(&path).await?;
        let wrap = |e| VfsError::wrap_io(path.to_string(), e);

        let file = fs::OpenOptions::new()
            .write(true)
            .open(&full)
            .await
            .map_err(wrap)?;
        file.set_len(size).await.map_err(wrap)?;

        debug!(path = %path, size, "local truncate");
        Ok(())
    }

    async fn remove(&self, path: &str) -> VfsResult<()> {
        let path = VfsPath::parse(path)?;
        self.check_writable(&path)?;
        let (full, _) = self.stat_file(&path).await?;
        fs::remove_file(&full)
            .await
            .map_err(|e| VfsError::wrap_io(path.to_string(), e))?;
        debug!(path = %path, "local remove");
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> VfsResult<()> {
        let path = VfsPath::parse(path)?;
        self.check_writable(&path)?;

        for step in path.ancestors().chain(std::iter::once(path.clone())) {
            if self.probe(&step).await? == Some(EntryKind::File) {
                return Err(VfsError::not_a_directory(step.to_string()));
            }
        }

        let full = self.resolve(&path)?;
        fs::create_dir_all(&full)
            .await
            .map_err(|e| VfsError::wrap_io(path.to_string(), e))?;
        debug!(path = %path, "local mkdir");
        Ok(())
    }

    async fn rmdir(&self, path: &str, options: RemoveOptions) -> VfsResult<()> {
        let path = VfsPath::parse(path)?;
        self.check_writable(&path)?;
        if path.is_root() {
            return Err(VfsError::new(ErrorKind::NotAllowed, "cannot remove root").with_path("/"));
        }
        let full = self.stat_dir(&path).await?;
        let wrap = |e| VfsError::wrap_io(path.to_string(), e);

        if options.recursive {
            fs::remove_dir_all(&full).await.map_err(wrap)?;
        } else {
            let mut entries = fs::read_dir(&full).await.map_err(wrap)?;
            if entries.next_entry().await.map_err(wrap)?.is_some() {
                return Err(VfsError::directory_not_empty(path.to_string()));
            }
            fs::remove_dir(&full).await.map_err(wrap)?;
        }

        debug!(path = %path, recursive = options.recursive, "local rmdir");
        Ok(())
    }

    async fn quota(&self) -> VfsResult<Quota> {
        let root = self.canonical_root()?;
        let usage = self.usage(&root).await;

        #[cfg(unix)]
        {
            use rustix::fs::statvfs;

            let stat = statvfs(&root).map_err(|e| VfsError::wrap_io("/", e.into()))?;
            let capacity = stat.f_blocks * stat.f_frsize;
            let available = stat.f_bavail * stat.f_frsize;
            let percent_used = if capacity == 0 {
                0.0
            } else {
                usage as f64 / capacity as f64 * 100.0
            };
            Ok(Quota {
                usage,
                capacity,
                available,
                percent_used,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Quota {
                usage,
                ..Quota::unknown()
            })
        }
    }

    async fn native_path(&self, path: &str) -> VfsResult<PathBuf> {
        let path = VfsPath::parse(path)?;
        let full = self.resolve(&path)?;
        // Use dunce for clean canonical paths (no \\?\ on Windows)
        dunce::canonicalize(&full).map_err(|e| VfsError::wrap_io(path.to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CopyOptions;
    use tempfile::TempDir;

    async fn setup() -> (LocalAdapter, TempDir) {
        let dir = TempDir::new().unwrap();
        let adapter = LocalAdapter::new(dir.path());
        adapter.init().await.unwrap();
        (adapter, dir)
    }

    #[tokio::test]
    async fn test_write_append_truncate() {
        let (fs, _dir) = setup().await;

        fs.write("/greeting.txt", b"Hello, World!", WriteOptions::replace())
            .await
            .unwrap();
        assert_eq!(fs.read_text("/greeting.txt").await.unwrap(), "Hello, World!");

        fs.append("/greeting.txt", b" Bye").await.unwrap();
        assert_eq!(fs.read_text("/greeting.txt").await.unwrap(), "Hello, World! Bye");

        fs.truncate("/greeting.txt", 5).await.unwrap();
        assert_eq!(fs.read_text("/greeting.txt").await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_positioned_write_zero_fills() {
        let (fs, _dir) = setup().await;
        fs.write("/f", b"abc", WriteOptions::replace()).await.unwrap();
        fs.write("/f", b"Z", WriteOptions::at(5)).await.unwrap();
        assert_eq!(fs.read_bytes("/f").await.unwrap(), b"abc\0\0Z");

        fs.write("/f", b"Q", WriteOptions::at(1).with_keep_existing(false))
            .await
            .unwrap();
        assert_eq!(fs.read_bytes("/f").await.unwrap(), b"\0Q");
    }

    #[tokio::test]
    async fn test_mkdir_and_list() {
        let (fs, dir) = setup().await;

        fs.mkdir("/a/b").await.unwrap();
        fs.write("/a/root.txt", b"", WriteOptions::replace()).await.unwrap();
        assert!(dir.path().join("a/b").is_dir());

        let entries = fs.list("/a").await.unwrap();
        assert_eq!(entries, vec![DirEntry::directory("b"), DirEntry::file("root.txt")]);
    }

    #[tokio::test]
    async fn test_uninitialized_is_invalid_state() {
        let dir = TempDir::new().unwrap();
        let fs = LocalAdapter::new(dir.path());
        let err = fs.list("/").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        fs.close().await;
        fs.init().await.unwrap();
        fs.close().await;
        fs.close().await;
        assert_eq!(fs.list("/").await.unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_create_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("fresh");
        let fs = LocalAdapter::new(&root).create_root(true);
        assert!(fs.is_available().await);
        fs.init().await.unwrap();
        assert!(root.is_dir());

        let missing = LocalAdapter::new(dir.path().join("nope"));
        assert!(!missing.is_available().await);
        assert_eq!(missing.init().await.unwrap_err().kind(), ErrorKind::NotFound);

        // A read-only adapter never creates its root.
        let frozen = LocalAdapter::new(dir.path().join("frozen")).create_root(true).read_only(true);
        assert!(!frozen.is_available().await);
        assert!(!dir.path().join("frozen").exists());
    }

    #[tokio::test]
    async fn test_read_only() {
        let dir = TempDir::new().unwrap();
        let fs = LocalAdapter::new(dir.path()).read_only(true);
        fs.init().await.unwrap();

        let err = fs
            .write("/test.txt", b"x", WriteOptions::replace())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoModificationAllowed);
    }

    #[tokio::test]
    async fn test_traversal_blocked() {
        let (fs, _dir) = setup().await;
        let err = fs.read_bytes("/../../etc/passwd").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_blocked() {
        let (fs, dir) = setup().await;
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret"), "s").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let err = fs.read_bytes("/link/secret").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);

        // Creating below a linked directory is refused too.
        let err = fs.write("/link/new.txt", b"x", WriteOptions::replace()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);
        let err = fs.mkdir("/link/a/b").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);
        assert!(!outside.path().join("new.txt").exists());
        assert!(!outside.path().join("a").exists());
    }

    // Other unixes (macOS) refuse non-UTF-8 names outright.
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_list_skips_non_utf8_names() {
        use std::os::unix::ffi::OsStrExt;

        let (fs, dir) = setup().await;
        std::fs::write(dir.path().join("plain.txt"), "x").unwrap();
        let raw = std::ffi::OsStr::from_bytes(b"bad\xff.txt");
        std::fs::write(dir.path().join(raw), "x").unwrap();

        let entries = fs.list("/").await.unwrap();
        assert_eq!(entries, vec![DirEntry::file("plain.txt")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_escape_blocked() {
        let (fs, dir) = setup().await;
        let outside = TempDir::new().unwrap();
        let planted = outside.path().join("planted.txt");
        std::os::unix::fs::symlink(&planted, dir.path().join("link")).unwrap();

        let err = fs.write("/link", b"escaped", WriteOptions::replace()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);
        assert!(!planted.exists());

        // Relative chains of dangling links are followed as well.
        std::os::unix::fs::symlink("link", dir.path().join("hop")).unwrap();
        let err = fs.write("/hop", b"escaped", WriteOptions::replace()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);
        assert!(!planted.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_inside_root_allowed() {
        let (fs, dir) = setup().await;
        std::os::unix::fs::symlink(dir.path().join("target.txt"), dir.path().join("alias")).unwrap();

        fs.write("/alias", b"inside", WriteOptions::replace()).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("target.txt")).unwrap(), b"inside");
    }

    #[tokio::test]
    async fn test_rmdir_not_empty() {
        let (fs, _dir) = setup().await;
        fs.mkdir("/full").await.unwrap();
        fs.write("/full/f", b"x", WriteOptions::replace()).await.unwrap();

        let err = fs.rmdir("/full", RemoveOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(fs.exists("/full/f").await.unwrap());

        fs.rmdir("/full", RemoveOptions::recursive()).await.unwrap();
        assert!(!fs.dir_exists("/full").await.unwrap());
    }

    #[tokio::test]
    async fn test_kind_mismatch() {
        let (fs, _dir) = setup().await;
        fs.mkdir("/d").await.unwrap();
        assert_eq!(fs.read_bytes("/d").await.unwrap_err().kind(), ErrorKind::TypeMismatch);
        assert_eq!(
            fs.write("/d", b"x", WriteOptions::replace()).await.unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
        fs.write("/f", b"x", WriteOptions::replace()).await.unwrap();
        assert_eq!(fs.mkdir("/f/sub").await.unwrap_err().kind(), ErrorKind::TypeMismatch);
    }

    #[tokio::test]
    async fn test_move() {
        let (fs, _dir) = setup().await;
        fs.write("/old.txt", b"content", WriteOptions::replace()).await.unwrap();
        fs.move_file("/old.txt", "/new.txt", CopyOptions::default())
            .await
            .unwrap();
        assert!(!fs.exists("/old.txt").await.unwrap());
        assert_eq!(fs.read_bytes("/new.txt").await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_identity_stable_across_writes() {
        let (fs, _dir) = setup().await;
        fs.write("/f", b"1", WriteOptions::replace()).await.unwrap();
        let first = fs.entry_id("/f").await.unwrap();
        fs.write("/f", b"22", WriteOptions::replace()).await.unwrap();
        assert_eq!(fs.entry_id("/f").await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_native_path() {
        let (fs, dir) = setup().await;
        fs.write("/test.txt", b"hello", WriteOptions::replace()).await.unwrap();

        let real = fs.native_path("/test.txt").await.unwrap();
        assert!(real.is_absolute());
        assert!(real.ends_with("test.txt"));
        assert_eq!(real, dunce::canonicalize(dir.path().join("test.txt")).unwrap());

        assert!(fs.native_path("/nonexistent.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_quota_counts_files() {
        let (fs, _dir) = setup().await;
        fs.mkdir("/d").await.unwrap();
        fs.write("/d/f", b"12345", WriteOptions::replace()).await.unwrap();
        fs.write("/g", b"123", WriteOptions::replace()).await.unwrap();
        assert_eq!(fs.quota().await.unwrap().usage, 8);
    }
}
