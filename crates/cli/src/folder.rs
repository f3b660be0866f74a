//! Folder scanning for batch operations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

/// All PDF files directly in `dir`, sorted by name. With `recursive`,
/// subdirectories are walked depth-first.
pub fn find_pdfs(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect(dir, recursive, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read directory {}", dir.display()))?;
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                collect(&path, recursive, files)?;
            }
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, create_dir};

    #[test]
    fn finds_pdfs_sorted_non_recursive() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("b.pdf")).unwrap();
        File::create(dir.path().join("a.PDF")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();
        create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub/c.pdf")).unwrap();

        let files = find_pdfs(dir.path(), false).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn recursive_walk_descends() {
        let dir = tempfile::tempdir().unwrap();
        create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub/c.pdf")).unwrap();
        let files = find_pdfs(dir.path(), true).unwrap();
        assert_eq!(files.len(), 1);
    }
}
