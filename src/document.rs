//! Reading and atomically replacing text documents.

use crate::Result;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Outcome of updating a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    /// The document did not exist and was written.
    Created,
    /// The document existed and its text changed.
    Updated,
    /// The new text equals the existing text, nothing was written.
    Unchanged,
}

/// Reads a document. Returns `None` if it does not exist.
pub fn read_document(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Replaces the document at `path` with `contents`.
///
/// The text is written to a temporary file next to the target, synced and then renamed over the
/// target, so readers either observe the old or the new document. Missing parent directories are
/// created. The temporary file is removed if any step fails.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;

    // Keep the permissions of the file being replaced.
    if let Ok(metadata) = fs::metadata(path) {
        file.as_file().set_permissions(metadata.permissions())?;
    }

    file.persist(path).map_err(|err| err.error)?;

    Ok(())
}

/// Reads the document at `path`, transforms it and writes the result back if it changed.
///
/// `update` receives the current text, or `None` if the document does not exist yet. With
/// `dry_run` the outcome is computed but nothing is written.
pub fn update_document<F>(path: &Path, dry_run: bool, update: F) -> Result<DocumentStatus>
where
    F: FnOnce(Option<&str>) -> Result<String>,
{
    let current = read_document(path)?;
    let updated = update(current.as_deref())?;

    let status = match current {
        None => DocumentStatus::Created,
        Some(current) if current == updated => return Ok(DocumentStatus::Unchanged),
        Some(_) => DocumentStatus::Updated,
    };

    if dry_run {
        log::debug!("dry run, not writing {}", path.display());
    } else {
        write_atomic(path, &updated)?;
    }

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn read_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_document(&dir.path().join("missing.md")).unwrap(), None);
    }

    #[test]
    fn write_creates_parents_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2024/2024-01/2024-01-03.md");

        write_atomic(&path, "first\n").unwrap();
        assert_eq!(read_document(&path).unwrap().as_deref(), Some("first\n"));

        write_atomic(&path, "second\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");

        // No temporary files are left behind.
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["2024-01-03.md"]);
    }

    #[test]
    fn update_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");

        let status = update_document(&path, false, |current| {
            assert_eq!(current, None);
            Ok("a\n".to_owned())
        })
        .unwrap();
        assert_eq!(status, DocumentStatus::Created);

        let status = update_document(&path, false, |current| Ok(current.unwrap().to_owned())).unwrap();
        assert_eq!(status, DocumentStatus::Unchanged);

        let status =
            update_document(&path, false, |current| Ok(format!("{}b\n", current.unwrap()))).unwrap();
        assert_eq!(status, DocumentStatus::Updated);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
    }

    #[test]
    fn dry_run_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");

        let status = update_document(&path, true, |_| Ok("a\n".to_owned())).unwrap();

        assert_eq!(status, DocumentStatus::Created);
        assert!(!path.exists());
    }

    #[test]
    fn failed_update_leaves_document_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "keep\n").unwrap();

        let result = update_document(&path, false, |_| {
            Err(Error::Io(io::Error::new(io::ErrorKind::Other, "boom")))
        });

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep\n");
    }

    #[test]
    fn unreadable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        // A directory cannot be read as a document.
        assert!(read_document(dir.path()).is_err());
    }
}
