//! Path store for the local filesystem

use crate::store::glob::GlobPattern;
use crate::store::path::{self, split_scheme};
use crate::store::{EntryKind, OpenMode, PathStat, PathStore, StoreError, StoreFile, Walk};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

const FILE_SCHEME: &str = "file://";

/// Serves `file://` URLs and bare filesystem paths
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPathStore;

impl LocalPathStore {
    pub fn new() -> Self {
        Self
    }

    fn fs_path<'p>(&self, path: &'p str) -> Result<&'p Path, StoreError> {
        match split_scheme(path) {
            ("", rest) | (FILE_SCHEME, rest) => Ok(Path::new(rest)),
            _ => Err(StoreError::UnsupportedScheme(path.to_string())),
        }
    }

    fn guard_overwrite(&self, dst: &str, overwrite: bool) -> Result<(), StoreError> {
        if !overwrite && self.fs_path(dst)?.exists() {
            return Err(StoreError::AlreadyExists(dst.to_string()));
        }
        Ok(())
    }

    /// Checks shared by copy and move once the source is known to exist.
    ///
    /// Returns the destination path. Equal paths pass, leaving the caller a no-op.
    fn prepare_destination<'p>(
        &self,
        src_path: &Path,
        src: &str,
        dst: &'p str,
        overwrite: bool,
    ) -> Result<&'p Path, StoreError> {
        self.guard_overwrite(dst, overwrite)?;
        let dst_path = self.fs_path(dst)?;
        if dst_path == src_path {
            return Ok(dst_path);
        }
        if dst_path.starts_with(src_path) {
            return Err(StoreError::MoveIntoSelf {
                src: src.to_string(),
                dst: dst.to_string(),
            });
        }
        if dst_path.is_dir() {
            return Err(StoreError::IsADirectory(dst.to_string()));
        }
        Ok(dst_path)
    }

    /// Every path below `dir`, spelled as `prefix/<relative>`
    fn collect(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<(), StoreError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::from_io(e, &dir.display().to_string())),
        };

        for entry in entries {
            let entry = entry.map_err(|e| StoreError::from_io(e, &dir.display().to_string()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child = if prefix.is_empty() {
                name
            } else {
                path::join(prefix, &name)
            };
            // file_type does not follow symlinks, so links never loop
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                self.collect(&entry.path(), &child, out)?;
            }
            out.push(child);
        }
        Ok(())
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Writes establish missing parent directories, as they do on object stores
fn create_parent(fs_path: &Path, path: &str) -> Result<(), StoreError> {
    match fs_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| StoreError::from_io(e, path))
        }
        _ => Ok(()),
    }
}

impl PathStore for LocalPathStore {
    fn schemes(&self) -> &[&'static str] {
        &[FILE_SCHEME, ""]
    }

    fn open(&self, path: &str, mode: OpenMode) -> Result<StoreFile, StoreError> {
        let fs_path = self.fs_path(path)?;
        if fs_path.is_dir() {
            return Err(StoreError::IsADirectory(path.to_string()));
        }

        match mode {
            OpenMode::Read => {
                let file = fs::File::open(fs_path).map_err(|e| StoreError::from_io(e, path))?;
                Ok(StoreFile::reader(path, file))
            }
            OpenMode::Write => {
                create_parent(fs_path, path)?;
                let file = fs::File::create(fs_path).map_err(|e| StoreError::from_io(e, path))?;
                Ok(StoreFile::writer(path, BufWriter::new(file)))
            }
        }
    }

    fn exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.fs_path(path)?.exists())
    }

    fn isdir(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.fs_path(path)?.is_dir())
    }

    fn stat(&self, path: &str) -> Result<PathStat, StoreError> {
        let metadata = fs::metadata(self.fs_path(path)?).map_err(|e| StoreError::from_io(e, path))?;

        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let mut extra = BTreeMap::new();
        extra.insert("readonly".to_string(), metadata.permissions().readonly().into());

        Ok(PathStat {
            path: path.to_string(),
            kind,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            extra,
        })
    }

    fn listdir(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let fs_path = self.fs_path(path)?;
        if fs_path.is_file() {
            return Err(StoreError::NotADirectory(path.to_string()));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(fs_path).map_err(|e| StoreError::from_io(e, path))? {
            let entry = entry.map_err(|e| StoreError::from_io(e, path))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let (scheme, rest) = split_scheme(pattern);
        self.fs_path(pattern)?;
        let glob = GlobPattern::new(rest)?;

        if glob.is_literal() {
            let found = Path::new(rest).exists();
            return Ok(if found { vec![pattern.to_string()] } else { Vec::new() });
        }

        let prefix = match glob.literal_prefix() {
            "" if rest.starts_with('/') => "/",
            prefix => prefix,
        };
        let root: PathBuf = if prefix.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(prefix)
        };

        let mut candidates = Vec::new();
        self.collect(&root, prefix, &mut candidates)?;

        let mut matches: Vec<String> = candidates
            .into_iter()
            .filter(|candidate| glob.is_match(candidate))
            .map(|candidate| format!("{}{}", scheme, candidate))
            .collect();
        matches.sort();
        debug!(pattern, matches = matches.len(), "Glob finished");
        Ok(matches)
    }

    fn mkdir(&self, path: &str) -> Result<(), StoreError> {
        let fs_path = self.fs_path(path)?;
        fs::create_dir(fs_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                let parent = fs_path.parent().map(display).unwrap_or_default();
                StoreError::missing_parent(path, &parent)
            }
            _ => StoreError::from_io(e, path),
        })
    }

    fn makedirs(&self, path: &str) -> Result<(), StoreError> {
        let fs_path = self.fs_path(path)?;
        if fs_path.is_file() {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        fs::create_dir_all(fs_path).map_err(|e| StoreError::from_io(e, path))
    }

    fn remove(&self, path: &str) -> Result<(), StoreError> {
        let fs_path = self.fs_path(path)?;
        if fs_path.is_dir() {
            return Err(StoreError::IsADirectory(path.to_string()));
        }
        fs::remove_file(fs_path).map_err(|e| StoreError::from_io(e, path))
    }

    fn rmtree(&self, path: &str) -> Result<(), StoreError> {
        let fs_path = self.fs_path(path)?;
        if fs_path.is_file() {
            return Err(StoreError::NotADirectory(path.to_string()));
        }
        fs::remove_dir_all(fs_path).map_err(|e| StoreError::from_io(e, path))
    }

    fn copyfile(&self, src: &str, dst: &str, overwrite: bool) -> Result<(), StoreError> {
        let src_path = self.fs_path(src)?;
        if src_path.is_dir() {
            return Err(StoreError::IsADirectory(src.to_string()));
        }
        if !src_path.exists() {
            return Err(StoreError::NotFound(src.to_string()));
        }

        let dst_path = self.prepare_destination(src_path, src, dst, overwrite)?;
        if dst_path == src_path {
            return Ok(());
        }
        create_parent(dst_path, dst)?;
        fs::copy(src_path, dst_path).map_err(|e| StoreError::from_io(e, src))?;
        Ok(())
    }

    fn rename(&self, src: &str, dst: &str, overwrite: bool) -> Result<(), StoreError> {
        let src_path = self.fs_path(src)?;
        if !src_path.exists() {
            return Err(StoreError::NotFound(src.to_string()));
        }

        let dst_path = self.prepare_destination(src_path, src, dst, overwrite)?;
        if dst_path == src_path {
            return Ok(());
        }
        create_parent(dst_path, dst)?;
        fs::rename(src_path, dst_path).map_err(|e| StoreError::from_io(e, src))
    }

    fn walk(&self, top: &str) -> Walk<'_> {
        Walk::new(self, top)
    }
}
