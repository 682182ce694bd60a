//! Path store on top of flat object storage
//!
//! Object stores only know keys. Directories are emulated: a directory
//! exists when a zero-byte `key/` marker object exists or when any object
//! lives below it. The object client is created on first use from resolved
//! credentials and kept for the lifetime of the store.

use crate::store::credentials::{CredentialProvider, Credentials};
use crate::store::glob::GlobPattern;
use crate::store::path::{self, ancestor_keys, parent_key};
use crate::store::{EntryKind, OpenMode, PathStat, PathStore, StoreError, StoreFile, Walk};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Metadata of a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub updated: DateTime<Utc>,
    pub etag: String,
    pub generation: u64,
}

/// Minimal object storage client a backend SDK has to provide
pub trait ObjectClient: Send + Sync + 'static {
    /// Metadata of `key`, `None` if it does not exist
    fn head(&self, key: &str) -> Result<Option<ObjectMeta>, StoreError>;

    /// Full content of `key`; [`StoreError::NotFound`] if missing
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Create or replace `key`
    fn put(&self, key: &str, data: Vec<u8>) -> Result<ObjectMeta, StoreError>;

    /// Delete `key`; [`StoreError::NotFound`] if missing
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Server-side copy of `src` to `dst`
    fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError>;

    /// All objects whose key starts with `prefix`, sorted by key
    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError>;
}

type Connector<C> = dyn Fn(Option<Credentials>) -> Result<C, StoreError> + Send + Sync;

/// [`PathStore`] for one object storage scheme such as `gs://`
pub struct ObjectPathStore<C: ObjectClient> {
    scheme: &'static str,
    credentials: Box<dyn CredentialProvider>,
    connector: Box<Connector<C>>,
    client: OnceCell<Arc<C>>,
}

impl<C: ObjectClient> ObjectPathStore<C> {
    /// Create a store for `scheme`.
    ///
    /// `connector` builds the client from the resolved credentials; it runs
    /// at most once, on the first operation.
    pub fn new<P, F>(scheme: &'static str, credentials: P, connector: F) -> Self
    where
        P: CredentialProvider + 'static,
        F: Fn(Option<Credentials>) -> Result<C, StoreError> + Send + Sync + 'static,
    {
        Self {
            scheme,
            credentials: Box::new(credentials),
            connector: Box::new(connector),
            client: OnceCell::new(),
        }
    }

    pub fn scheme(&self) -> &'static str {
        self.scheme
    }

    /// Whether the client has been created yet
    pub fn is_connected(&self) -> bool {
        self.client.get().is_some()
    }

    fn client(&self) -> Result<&Arc<C>, StoreError> {
        self.client.get_or_try_init(|| {
            debug!(scheme = self.scheme, "Resolving object store credentials");
            let credentials = self.credentials.resolve()?;
            let anonymous = credentials.is_none();
            let client = (self.connector)(credentials)?;
            info!(scheme = self.scheme, anonymous, "Connected object store client");
            Ok(Arc::new(client))
        })
    }

    /// Scheme-less key of `path`, without surrounding separators
    fn key<'p>(&self, path: &'p str) -> Result<&'p str, StoreError> {
        let (scheme, rest) = path::split_scheme(path);
        if !scheme.is_empty() && scheme != self.scheme {
            return Err(StoreError::UnsupportedScheme(path.to_string()));
        }
        Ok(rest.trim_matches('/'))
    }

    fn to_path(&self, key: &str) -> String {
        format!("{}{}", self.scheme, key)
    }

    fn is_file(&self, client: &C, key: &str) -> Result<bool, StoreError> {
        Ok(!key.is_empty() && client.head(key)?.is_some())
    }

    fn is_dir(&self, client: &C, key: &str) -> Result<bool, StoreError> {
        if key.is_empty() {
            return Ok(true);
        }
        Ok(!client.list(&dir_prefix(key))?.is_empty())
    }

    /// Immediate subdirectory and file names below directory `key`
    fn entries(
        &self,
        client: &C,
        key: &str,
    ) -> Result<(BTreeSet<String>, BTreeSet<String>), StoreError> {
        let prefix = dir_prefix(key);
        let mut dirs = BTreeSet::new();
        let mut files = BTreeSet::new();

        for object in client.list(&prefix)? {
            let relative = &object.key[prefix.len()..];
            match relative.split_once('/') {
                Some((name, _)) => {
                    dirs.insert(name.to_string());
                }
                // the directory's own marker
                None if relative.is_empty() => {}
                None => {
                    files.insert(relative.to_string());
                }
            }
        }

        Ok((dirs, files))
    }

    /// Refuse to touch `dst` when it exists and overwriting is off.
    ///
    /// Check-then-act: a concurrent writer can still create `dst` before the
    /// caller's copy or move lands.
    fn guard_overwrite(&self, client: &C, dst: &str, overwrite: bool) -> Result<(), StoreError> {
        if overwrite {
            return Ok(());
        }
        let key = self.key(dst)?;
        if self.is_file(client, key)? || self.is_dir(client, key)? {
            return Err(StoreError::AlreadyExists(dst.to_string()));
        }
        Ok(())
    }

    /// Checks shared by copy and move once the source is known to exist.
    ///
    /// Returns the destination key. Equal keys pass, leaving the caller a no-op.
    fn prepare_destination<'p>(
        &self,
        client: &C,
        src_key: &str,
        dst: &'p str,
        overwrite: bool,
    ) -> Result<&'p str, StoreError> {
        self.guard_overwrite(client, dst, overwrite)?;
        let dst_key = self.key(dst)?;
        if dst_key == src_key {
            return Ok(dst_key);
        }
        if path::is_descendant(dst_key, src_key) {
            return Err(StoreError::MoveIntoSelf {
                src: self.to_path(src_key),
                dst: dst.to_string(),
            });
        }
        if self.is_dir(client, dst_key)? {
            return Err(StoreError::IsADirectory(dst.to_string()));
        }
        Ok(dst_key)
    }

    fn missing_file_error(&self, client: &C, key: &str, path: &str) -> Result<StoreError, StoreError> {
        Ok(if self.is_dir(client, key)? {
            StoreError::IsADirectory(path.to_string())
        } else {
            StoreError::NotFound(path.to_string())
        })
    }

    fn missing_dir_error(&self, client: &C, key: &str, path: &str) -> Result<StoreError, StoreError> {
        Ok(if self.is_file(client, key)? {
            StoreError::NotADirectory(path.to_string())
        } else {
            StoreError::NotFound(path.to_string())
        })
    }
}

/// `key/`, the prefix every object inside directory `key` starts with
fn dir_prefix(key: &str) -> String {
    if key.is_empty() {
        String::new()
    } else {
        format!("{}/", key)
    }
}

impl<C: ObjectClient> PathStore for ObjectPathStore<C> {
    fn schemes(&self) -> &[&'static str] {
        std::slice::from_ref(&self.scheme)
    }

    fn open(&self, path: &str, mode: OpenMode) -> Result<StoreFile, StoreError> {
        let client = self.client()?;
        let key = self.key(path)?;
        if key.is_empty() {
            return Err(StoreError::IsADirectory(path.to_string()));
        }

        match mode {
            OpenMode::Read => match client.get(key) {
                Ok(data) => Ok(StoreFile::reader(path, Cursor::new(data))),
                Err(StoreError::NotFound(_)) => Err(self.missing_file_error(client, key, path)?),
                Err(e) => Err(e),
            },
            OpenMode::Write => {
                if self.is_dir(client, key)? {
                    return Err(StoreError::IsADirectory(path.to_string()));
                }
                let writer = ObjectWriter {
                    client: Arc::clone(client),
                    key: key.to_string(),
                    buffer: Vec::new(),
                    dirty: true,
                };
                Ok(StoreFile::writer(path, writer))
            }
        }
    }

    fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let client = self.client()?;
        let key = self.key(path)?;
        Ok(self.is_file(client, key)? || self.is_dir(client, key)?)
    }

    fn isdir(&self, path: &str) -> Result<bool, StoreError> {
        let client = self.client()?;
        self.is_dir(client, self.key(path)?)
    }

    fn stat(&self, path: &str) -> Result<PathStat, StoreError> {
        let client = self.client()?;
        let key = self.key(path)?;

        if !key.is_empty() {
            if let Some(meta) = client.head(key)? {
                let mut extra = BTreeMap::new();
                extra.insert("etag".to_string(), meta.etag.into());
                extra.insert("generation".to_string(), meta.generation.into());
                return Ok(PathStat {
                    path: path.to_string(),
                    kind: EntryKind::File,
                    size: meta.size,
                    modified: Some(meta.updated),
                    extra,
                });
            }
        }

        if self.is_dir(client, key)? {
            return Ok(PathStat {
                path: path.to_string(),
                kind: EntryKind::Directory,
                size: 0,
                modified: None,
                extra: BTreeMap::new(),
            });
        }

        Err(StoreError::NotFound(path.to_string()))
    }

    fn listdir(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let client = self.client()?;
        let key = self.key(path)?;
        if !self.is_dir(client, key)? {
            return Err(self.missing_dir_error(client, key, path)?);
        }

        let (dirs, files) = self.entries(client, key)?;
        let names: BTreeSet<String> = dirs.into_iter().chain(files).collect();
        Ok(names.into_iter().collect())
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let client = self.client()?;
        let glob = GlobPattern::new(self.key(pattern)?)?;

        if glob.is_literal() {
            let key = glob.as_str();
            let found = self.is_file(client, key)? || self.is_dir(client, key)?;
            return Ok(if found { vec![self.to_path(key)] } else { Vec::new() });
        }

        // every object and every implied directory is a candidate
        let objects = client.list(glob.literal_prefix())?;
        let mut candidates = BTreeSet::new();
        for object in &objects {
            let key = object.key.trim_end_matches('/');
            candidates.extend(ancestor_keys(key));
            candidates.insert(key);
        }

        let matches: Vec<String> = candidates
            .into_iter()
            .filter(|key| !key.is_empty() && glob.is_match(key))
            .map(|key| self.to_path(key))
            .collect();
        debug!(pattern, matches = matches.len(), "Glob finished");
        Ok(matches)
    }

    fn mkdir(&self, path: &str) -> Result<(), StoreError> {
        let client = self.client()?;
        let key = self.key(path)?;
        if key.is_empty() || self.is_file(client, key)? || self.is_dir(client, key)? {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }

        let parent = parent_key(key);
        if !self.is_dir(client, parent)? {
            return Err(StoreError::missing_parent(path, &self.to_path(parent)));
        }

        client.put(&dir_prefix(key), Vec::new())?;
        Ok(())
    }

    fn makedirs(&self, path: &str) -> Result<(), StoreError> {
        let client = self.client()?;
        let key = self.key(path)?;
        if self.is_dir(client, key)? {
            return Ok(());
        }

        for dir in ancestor_keys(key).chain(std::iter::once(key)) {
            if self.is_file(client, dir)? {
                return Err(StoreError::AlreadyExists(self.to_path(dir)));
            }
            if !self.is_dir(client, dir)? {
                client.put(&dir_prefix(dir), Vec::new())?;
            }
        }
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), StoreError> {
        let client = self.client()?;
        let key = self.key(path)?;
        if !self.is_file(client, key)? {
            return Err(self.missing_file_error(client, key, path)?);
        }
        client.delete(key)
    }

    fn rmtree(&self, path: &str) -> Result<(), StoreError> {
        let client = self.client()?;
        let key = self.key(path)?;
        if key.is_empty() || !self.is_dir(client, key)? {
            return Err(self.missing_dir_error(client, key, path)?);
        }

        let objects = client.list(&dir_prefix(key))?;
        for object in &objects {
            client.delete(&object.key)?;
        }
        debug!(path, removed = objects.len(), "Removed directory tree");
        Ok(())
    }

    fn copyfile(&self, src: &str, dst: &str, overwrite: bool) -> Result<(), StoreError> {
        let client = self.client()?;
        let src_key = self.key(src)?;
        if !self.is_file(client, src_key)? {
            return Err(self.missing_file_error(client, src_key, src)?);
        }

        let dst_key = self.prepare_destination(client, src_key, dst, overwrite)?;
        if src_key == dst_key {
            return Ok(());
        }
        client.copy(src_key, dst_key)
    }

    fn rename(&self, src: &str, dst: &str, overwrite: bool) -> Result<(), StoreError> {
        let client = self.client()?;
        let src_key = self.key(src)?;
        let src_is_file = self.is_file(client, src_key)?;
        if !src_is_file && (src_key.is_empty() || !self.is_dir(client, src_key)?) {
            return Err(StoreError::NotFound(src.to_string()));
        }

        let dst_key = self.prepare_destination(client, src_key, dst, overwrite)?;
        if src_key == dst_key {
            return Ok(());
        }

        // object stores have no move; copy every object, then delete it
        if src_is_file {
            client.copy(src_key, dst_key)?;
            return client.delete(src_key);
        }

        let src_prefix = dir_prefix(src_key);
        let dst_prefix = dir_prefix(dst_key);
        for object in client.list(&src_prefix)? {
            let target = format!("{}{}", dst_prefix, &object.key[src_prefix.len()..]);
            client.copy(&object.key, &target)?;
            client.delete(&object.key)?;
        }
        Ok(())
    }

    fn walk(&self, top: &str) -> Walk<'_> {
        Walk::new(self, top)
    }
}

/// Buffers written bytes and uploads them as one object
struct ObjectWriter<C: ObjectClient> {
    client: Arc<C>,
    key: String,
    buffer: Vec<u8>,
    dirty: bool,
}

impl<C: ObjectClient> Write for ObjectWriter<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.dirty = true;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.dirty {
            self.client.put(&self.key, self.buffer.clone())?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl<C: ObjectClient> Drop for ObjectWriter<C> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(key = %self.key, "Failed to upload object on close: {}", e);
        }
    }
}
