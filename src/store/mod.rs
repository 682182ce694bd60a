//! Path store - artifact storage addressed by scheme-prefixed paths
//!
//! Every backend implements the same [`PathStore`] operation set with the
//! same semantics, whether it sits on a real filesystem or on an object
//! store that only knows flat keys. Paths look like `gs://bucket/dir/file`
//! or `file:///tmp/dir/file`; a store serves exactly one scheme family.
//!
//! Overwrite guards on [`PathStore::copyfile`] and [`PathStore::rename`]
//! check the destination and then act. Another writer can create the
//! destination in between, so the guard does not make the operation atomic.

pub mod credentials;
pub mod glob;
pub mod local;
pub mod memory;
pub mod object;
pub mod path;
pub mod registry;

pub use credentials::{
    AnonymousCredentials, CredentialProvider, Credentials, FileCredentialProvider,
    StaticCredentials,
};
pub use glob::GlobPattern;
pub use local::LocalPathStore;
pub use memory::MemoryObjectClient;
pub use object::{ObjectClient, ObjectMeta, ObjectPathStore};
pub use registry::StoreRegistry;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::str::FromStr;
use thiserror::Error;

/// Error types for path store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Path already exists: {0}")]
    AlreadyExists(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Cannot move '{src}' into its own subtree '{dst}'")]
    MoveIntoSelf { src: String, dst: String },

    #[error("Unsupported open mode '{0}', only 'rb' and 'wb' are supported")]
    UnsupportedMode(String),

    #[error("No store serves the scheme of '{0}'")]
    UnsupportedScheme(String),

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// `mkdir` below a missing parent; reported as AlreadyExists, naming the parent
    pub fn missing_parent(path: &str, parent: &str) -> Self {
        StoreError::AlreadyExists(format!("{} (missing parent {})", path, parent))
    }

    /// Classify a local I/O error for `path`
    pub fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(path.to_string()),
            io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.to_string()),
            _ => StoreError::Backend(format!("{}: {}", path, err)),
        }
    }
}

impl From<StoreError> for io::Error {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::NotFound(_) => io::ErrorKind::NotFound,
            StoreError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            StoreError::Authentication(_) => io::ErrorKind::PermissionDenied,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Mode a store file is opened in; only binary read and write exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

impl FromStr for OpenMode {
    type Err = StoreError;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        match mode {
            "rb" => Ok(OpenMode::Read),
            "wb" => Ok(OpenMode::Write),
            other => Err(StoreError::UnsupportedMode(other.to_string())),
        }
    }
}

enum Handle {
    Reader(Box<dyn Read + Send>),
    Writer(Box<dyn Write + Send>),
}

/// Byte stream returned by [`PathStore::open`].
///
/// The handle is released when dropped. Write handles publish their bytes
/// on [`Write::flush`], on [`StoreFile::close`] or at the latest on drop;
/// only the first two report failures.
pub struct StoreFile {
    path: String,
    handle: Handle,
}

impl StoreFile {
    pub fn reader(path: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self {
            path: path.into(),
            handle: Handle::Reader(Box::new(reader)),
        }
    }

    pub fn writer(path: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self {
            path: path.into(),
            handle: Handle::Writer(Box::new(writer)),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        match self.handle {
            Handle::Reader(_) => OpenMode::Read,
            Handle::Writer(_) => OpenMode::Write,
        }
    }

    /// Flush pending bytes and release the handle
    pub fn close(mut self) -> Result<(), StoreError> {
        self.flush()
            .map_err(|e| StoreError::Backend(format!("{}: {}", self.path, e)))
    }
}

fn wrong_mode(path: &str, wanted: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{} is not open for {}", path, wanted),
    )
}

impl Read for StoreFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.handle {
            Handle::Reader(reader) => reader.read(buf),
            Handle::Writer(_) => Err(wrong_mode(&self.path, "reading")),
        }
    }
}

impl Write for StoreFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.handle {
            Handle::Writer(writer) => writer.write(buf),
            Handle::Reader(_) => Err(wrong_mode(&self.path, "writing")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.handle {
            Handle::Writer(writer) => writer.flush(),
            Handle::Reader(_) => Ok(()),
        }
    }
}

impl std::fmt::Debug for StoreFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreFile")
            .field("path", &self.path)
            .field("mode", &self.mode())
            .finish()
    }
}

/// Kind of entry a path denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// Metadata returned by [`PathStore::stat`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathStat {
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Backend-specific fields (etag, generation, permissions, ...)
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One directory visited by [`PathStore::walk`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: String,
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

/// Storage operations every backend provides
pub trait PathStore: Send + Sync {
    /// Scheme prefixes this store serves, e.g. `["gs://"]`
    fn schemes(&self) -> &[&'static str];

    /// Open a file for binary reading or writing
    fn open(&self, path: &str, mode: OpenMode) -> Result<StoreFile, StoreError>;

    fn exists(&self, path: &str) -> Result<bool, StoreError>;

    fn isdir(&self, path: &str) -> Result<bool, StoreError>;

    fn stat(&self, path: &str) -> Result<PathStat, StoreError>;

    /// Sorted names of the entries directly inside `path`
    fn listdir(&self, path: &str) -> Result<Vec<String>, StoreError>;

    /// Sorted paths matching `pattern` (`*`, `?`, `[...]`, `**`)
    fn glob(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Create one directory; the parent must exist
    fn mkdir(&self, path: &str) -> Result<(), StoreError>;

    /// Create a directory and any missing ancestors; no-op if it exists
    fn makedirs(&self, path: &str) -> Result<(), StoreError>;

    /// Delete a single file
    fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Delete a directory and everything below it
    fn rmtree(&self, path: &str) -> Result<(), StoreError>;

    fn copyfile(&self, src: &str, dst: &str, overwrite: bool) -> Result<(), StoreError>;

    fn rename(&self, src: &str, dst: &str, overwrite: bool) -> Result<(), StoreError>;

    /// Depth-first, top-down traversal starting at `top`
    fn walk(&self, top: &str) -> Walk<'_>;
}

/// Lazy iterator behind [`PathStore::walk`]
pub struct Walk<'a> {
    store: &'a dyn PathStore,
    pending: Vec<String>,
    started: bool,
}

impl<'a> Walk<'a> {
    pub fn new(store: &'a dyn PathStore, top: &str) -> Self {
        Self {
            store,
            pending: vec![path::trim_trailing_slash(top).to_string()],
            started: false,
        }
    }

    fn visit(&mut self, dir: String) -> Result<WalkEntry, StoreError> {
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for name in self.store.listdir(&dir)? {
            if self.store.isdir(&path::join(&dir, &name))? {
                dirs.push(name);
            } else {
                files.push(name);
            }
        }

        // reversed so the first subdirectory is visited next
        for name in dirs.iter().rev() {
            self.pending.push(path::join(&dir, name));
        }

        Ok(WalkEntry { path: dir, dirs, files })
    }
}

impl Iterator for Walk<'_> {
    type Item = Result<WalkEntry, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let dir = self.pending.pop()?;
        let first = !self.started;
        self.started = true;

        match self.visit(dir) {
            Ok(entry) => Some(Ok(entry)),
            // a missing or non-directory top yields an empty walk
            Err(StoreError::NotFound(_) | StoreError::NotADirectory(_)) if first => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_mode_parsing() {
        assert_eq!("rb".parse::<OpenMode>().unwrap(), OpenMode::Read);
        assert_eq!("wb".parse::<OpenMode>().unwrap(), OpenMode::Write);
        assert!(matches!(
            "r".parse::<OpenMode>(),
            Err(StoreError::UnsupportedMode(m)) if m == "r"
        ));
        assert!("w+".parse::<OpenMode>().is_err());
    }

    #[test]
    fn test_store_file_rejects_wrong_direction() {
        let mut reader = StoreFile::reader("mem://a", io::Cursor::new(b"abc".to_vec()));
        assert!(reader.write(b"x").is_err());
        let mut buf = String::new();
        reader.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "abc");

        let mut writer = StoreFile::writer("mem://b", Vec::new());
        assert_eq!(writer.mode(), OpenMode::Write);
        assert!(writer.read(&mut [0u8; 4]).is_err());
        writer.write_all(b"ok").unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_io_error_classification() {
        let err = StoreError::from_io(io::Error::from(io::ErrorKind::NotFound), "/x");
        assert!(matches!(err, StoreError::NotFound(p) if p == "/x"));

        let io_err: io::Error = StoreError::AlreadyExists("/y".to_string()).into();
        assert_eq!(io_err.kind(), io::ErrorKind::AlreadyExists);
    }
}
