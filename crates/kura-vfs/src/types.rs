//! Core VFS types.
//!
//! These are plain data carried across the adapter boundary. None of
//! them holds a reference back into an adapter.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl EntryKind {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::File => f.write_str("file"),
            EntryKind::Directory => f.write_str("directory"),
        }
    }
}

/// Backend identity of an entry.
///
/// Two ids are equal only if they name the same underlying backend
/// object. A path that is removed and recreated gets a new id on
/// backends that can tell the difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId {
    /// Device (local) or adapter instance (memory) the entry lives on.
    pub device: u64,
    /// Object number within the device.
    pub object: u64,
}

/// Directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: EntryKind,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Directory)
    }
}

/// Entry metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Logical name (final path segment).
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes; 0 for directories.
    pub size: u64,
    /// Content-type hint derived from the name; empty for directories.
    pub content_type: String,
    /// Last modification, epoch milliseconds.
    pub last_modified: i64,
}

impl Metadata {
    /// Metadata for a file.
    pub fn file(name: impl Into<String>, size: u64, last_modified: i64) -> Self {
        let name = name.into();
        Self {
            content_type: content_type_for(&name).to_string(),
            name,
            kind: EntryKind::File,
            size,
            last_modified,
        }
    }

    /// Metadata for a directory.
    pub fn directory(name: impl Into<String>, last_modified: i64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: 0,
            content_type: String::new(),
            last_modified,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// File content plus the metadata a consumer needs to present it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub name: String,
    pub content_type: String,
    pub last_modified: i64,
    pub data: Vec<u8>,
}

impl Blob {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Options for [`Adapter::write`](crate::Adapter::write).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Byte offset to write at. `None` replaces the whole file.
    pub position: Option<u64>,
    /// Preserve bytes outside the written range.
    ///
    /// Only meaningful with `position`; without it the file starts empty
    /// and the gap before `position` is zero-filled.
    pub keep_existing: bool,
}

impl WriteOptions {
    /// Replace the whole file.
    pub fn replace() -> Self {
        Self::default()
    }

    /// Overwrite a range, keeping the rest of the file.
    pub fn at(position: u64) -> Self {
        Self {
            position: Some(position),
            keep_existing: true,
        }
    }

    pub fn with_keep_existing(mut self, keep: bool) -> Self {
        self.keep_existing = keep;
        self
    }
}

/// Options for copy and move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Replace an existing destination instead of failing.
    pub overwrite: bool,
}

impl CopyOptions {
    pub fn overwrite() -> Self {
        Self { overwrite: true }
    }
}

/// Options for directory removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Remove a non-empty directory together with its contents.
    pub recursive: bool,
}

impl RemoveOptions {
    pub fn recursive() -> Self {
        Self { recursive: true }
    }
}

/// Storage usage report. Approximate; zeros when the backend has no quota concept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quota {
    pub usage: u64,
    pub capacity: u64,
    pub available: u64,
    pub percent_used: f64,
}

impl Quota {
    /// Build a report, deriving `available` and `percent_used`.
    pub fn new(usage: u64, capacity: u64) -> Self {
        let available = capacity.saturating_sub(usage);
        let percent_used = if capacity == 0 {
            0.0
        } else {
            usage as f64 / capacity as f64 * 100.0
        };
        Self {
            usage,
            capacity,
            available,
            percent_used,
        }
    }

    /// Backends without a quota concept.
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    system_time_millis(SystemTime::now())
}

/// Convert a `SystemTime` to epoch milliseconds, clamping pre-epoch times to 0.
pub fn system_time_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Next modification stamp: now, but never earlier than `previous`.
pub fn next_modified(previous: i64) -> i64 {
    now_millis().max(previous)
}

/// Guess a content type from a file name's extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return "application/octet-stream",
    };
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "toml" => "application/toml",
        "yaml" | "yml" => "application/yaml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}
