//! Upload storage: file descriptors, admission checks and source removal.
//!
//! The pipeline only ever reads what a [`FileDescriptor`] points at. Creating
//! descriptors, enforcing the batch limits and reclaiming storage belong to
//! the caller; the helpers here are what an upload handler (or the CLI)
//! uses for that.

use crate::config::{MAX_BATCH_FILES, MAX_FILE_SIZE_BYTES};
use crate::error::Docs2PdfError;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// One uploaded file, already persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub id: String,
    pub original_name: String,
    pub byte_size: u64,
    #[serde(default)]
    pub declared_mime_type: Option<String>,
    pub storage_path: PathBuf,
}

impl FileDescriptor {
    /// Describe a file already on disk. The id is a fresh UUID and the
    /// declared MIME type is guessed from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let declared_mime_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string());

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            original_name,
            byte_size: metadata.len(),
            declared_mime_type,
            storage_path: path.to_path_buf(),
        })
    }
}

/// Admission check: non-empty batch, at most 20 files, none over 50 MiB.
pub fn validate_batch(files: &[FileDescriptor]) -> Result<(), Docs2PdfError> {
    if files.is_empty() {
        return Err(Docs2PdfError::NoFiles);
    }
    if files.len() > MAX_BATCH_FILES {
        return Err(Docs2PdfError::TooManyFiles {
            count: files.len(),
            max: MAX_BATCH_FILES,
        });
    }
    if let Some(f) = files.iter().find(|f| f.byte_size > MAX_FILE_SIZE_BYTES) {
        return Err(Docs2PdfError::FileTooLarge {
            name: f.original_name.clone(),
            size: f.byte_size,
            max: MAX_FILE_SIZE_BYTES,
        });
    }
    Ok(())
}

/// Delete a file, treating an already-missing file as success.
/// Returns whether anything was removed.
pub fn remove_file_idempotent(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Delete every source of a batch. Failures are logged, never returned.
pub fn remove_sources(files: &[FileDescriptor]) -> usize {
    files
        .iter()
        .filter(|f| match remove_file_idempotent(&f.storage_path) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Could not delete {}: {}", f.storage_path.display(), e);
                false
            }
        })
        .count()
}

/// Flat directory of uploads keyed by identifier.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage location of `id`. Identifiers containing path separators are
    /// reduced to their final component.
    pub fn path_for(&self, id: &str) -> PathBuf {
        let name = Path::new(id)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| id.into());
        self.root.join(name)
    }

    /// Persist `bytes` under a fresh identifier and describe them.
    pub fn store(&self, original_name: &str, bytes: &[u8]) -> io::Result<FileDescriptor> {
        std::fs::create_dir_all(&self.root)?;
        let id = Uuid::new_v4().to_string();
        let storage_path = self.path_for(&id);
        std::fs::write(&storage_path, bytes)?;
        debug!("Stored '{}' as {}", original_name, storage_path.display());

        Ok(FileDescriptor {
            id,
            original_name: original_name.to_string(),
            byte_size: bytes.len() as u64,
            declared_mime_type: mime_guess::from_path(original_name)
                .first()
                .map(|m| m.essence_str().to_string()),
            storage_path,
        })
    }

    /// Remove the stored file for `id`. Removing an unknown or already
    /// removed id returns `Ok(false)`.
    pub fn remove(&self, id: &str) -> io::Result<bool> {
        remove_file_idempotent(&self.path_for(id))
    }

    /// Remove every file of a batch; returns how many were deleted.
    pub fn remove_batch(&self, files: &[FileDescriptor]) -> usize {
        remove_sources(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, size: u64) -> FileDescriptor {
        FileDescriptor {
            id: name.into(),
            original_name: name.into(),
            byte_size: size,
            declared_mime_type: None,
            storage_path: PathBuf::from(name),
        }
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(validate_batch(&[]), Err(Docs2PdfError::NoFiles)));
    }

    #[test]
    fn batch_limit() {
        let ok: Vec<_> = (0..20).map(|i| descriptor(&format!("{i}.txt"), 1)).collect();
        assert!(validate_batch(&ok).is_ok());
        let too_many: Vec<_> = (0..21).map(|i| descriptor(&format!("{i}.txt"), 1)).collect();
        assert!(matches!(
            validate_batch(&too_many),
            Err(Docs2PdfError::TooManyFiles { count: 21, max: 20 })
        ));
    }

    #[test]
    fn size_limit() {
        let at_limit = descriptor("a.pdf", MAX_FILE_SIZE_BYTES);
        assert!(validate_batch(&[at_limit]).is_ok());
        let over = descriptor("big.pdf", MAX_FILE_SIZE_BYTES + 1);
        match validate_batch(&[over]) {
            Err(Docs2PdfError::FileTooLarge { name, .. }) => assert_eq!(name, "big.pdf"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn from_path_fills_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, [0u8; 42]).unwrap();
        let d = FileDescriptor::from_path(&path).unwrap();
        assert_eq!(d.original_name, "photo.png");
        assert_eq!(d.byte_size, 42);
        assert_eq!(d.declared_mime_type.as_deref(), Some("image/png"));
        assert!(Uuid::parse_str(&d.id).is_ok());
    }

    #[test]
    fn store_and_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));
        let d = store.store("notes.txt", b"hello").unwrap();
        assert!(d.storage_path.exists());
        assert_eq!(d.declared_mime_type.as_deref(), Some("text/plain"));
        assert!(store.remove(&d.id).unwrap());
        assert!(!store.remove(&d.id).unwrap());
        assert!(!store.remove("never-existed").unwrap());
    }

    #[test]
    fn remove_batch_counts_deleted_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        assert_eq!(store.root(), dir.path());
        let a = store.store("a.txt", b"a").unwrap();
        let b = store.store("b.txt", b"b").unwrap();
        std::fs::remove_file(&b.storage_path).unwrap();

        assert_eq!(store.remove_batch(&[a.clone(), b]), 1);
        assert!(!a.storage_path.exists());
    }

    #[test]
    fn path_for_strips_directories() {
        let store = UploadStore::new("/srv/uploads");
        assert_eq!(store.path_for("../../etc/passwd"), PathBuf::from("/srv/uploads/passwd"));
    }

    #[test]
    fn descriptor_wire_names() {
        let json = serde_json::to_value(descriptor("a.txt", 3)).unwrap();
        assert!(json.get("originalName").is_some());
        assert!(json.get("byteSize").is_some());
        assert!(json.get("storagePath").is_some());
    }
}
