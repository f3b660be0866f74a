//! File-system collaborator trait.
//!
//! The conflict resolver and the extraction orchestrator only ever ask
//! whether a path exists and move finished files into place; putting those
//! two calls behind a trait keeps both testable without touching a disk.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Result, SieveError};

/// Minimal file-system surface used by the core.
pub trait FileSystem {
    fn exists(&self, path: &Path) -> bool;

    /// Atomically move `from` to `to` (same directory in practice).
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Best-effort removal of a leftover file.
    fn remove_file(&self, path: &Path) -> Result<()>;
}

/// The real thing.
#[derive(Debug, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::rename(from, to).map_err(|e| SieveError::io(to, e))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(|e| SieveError::io(path, e))
    }
}

/// In-memory file system for tests: a set of paths that "exist".
#[derive(Debug, Default)]
pub struct MemFileSystem {
    files: RefCell<HashSet<PathBuf>>,
}

impl MemFileSystem {
    pub fn with_files<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            files: RefCell::new(paths.into_iter().map(Into::into).collect()),
        }
    }

    pub fn touch(&self, path: impl Into<PathBuf>) {
        self.files.borrow_mut().insert(path.into());
    }
}

impl FileSystem for MemFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut files = self.files.borrow_mut();
        if !files.remove(from) {
            return Err(SieveError::io(
                from,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            ));
        }
        files.insert(to.to_path_buf());
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.files.borrow_mut().remove(path);
        Ok(())
    }
}
