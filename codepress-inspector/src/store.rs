use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::StoreError;
use crate::language::is_supported_path;

pub type StoreResult<T> = Result<T, StoreError>;

/// The project tree the pipeline reads sources from and writes edits back to.
pub trait SourceStore {
    fn root(&self) -> &Path;

    /// Every supported source file, in path order.
    fn list(&self) -> StoreResult<Vec<PathBuf>>;

    fn read(&self, path: &Path) -> StoreResult<String>;

    fn write(&mut self, path: &Path, text: &str) -> StoreResult<()>;

    /// True when `path` sits under a directory this store never lists.
    fn ignores(&self, _path: &Path) -> bool {
        false
    }
}

// -----------------------------------------------------------------------------
// Filesystem
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    ignored_dirs: Vec<String>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>, ignored_dirs: Vec<String>) -> Self {
        Self {
            root: root.into(),
            ignored_dirs,
        }
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| self.ignored_dirs.iter().any(|d| d == name))
                .unwrap_or(false)
    }
}

impl SourceStore for FsStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list(&self) -> StoreResult<Vec<PathBuf>> {
        let mut files = vec![];
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_ignored(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_file() && is_supported_path(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn read(&self, path: &Path) -> StoreResult<String> {
        fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_path_buf())
            } else {
                StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }

    fn write(&mut self, path: &Path, text: &str) -> StoreResult<()> {
        let io = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        fs::write(path, text).map_err(io)
    }

    fn ignores(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|name| self.ignored_dirs.iter().any(|d| d == name))
                .unwrap_or(false)
        })
    }
}

// -----------------------------------------------------------------------------
// In memory
// -----------------------------------------------------------------------------

/// Sources held by the host in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    root: PathBuf,
    files: BTreeMap<PathBuf, String>,
}

impl MemoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.files.insert(path.into(), text.into());
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }

    pub fn remove(&mut self, path: &Path) -> Option<String> {
        self.files.remove(path)
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }
}

impl SourceStore for MemoryStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list(&self) -> StoreResult<Vec<PathBuf>> {
        Ok(self
            .files
            .keys()
            .filter(|p| is_supported_path(p))
            .cloned()
            .collect())
    }

    fn read(&self, path: &Path) -> StoreResult<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))
    }

    fn write(&mut self, path: &Path, text: &str) -> StoreResult<()> {
        self.files.insert(path.to_path_buf(), text.to_string());
        Ok(())
    }
}
