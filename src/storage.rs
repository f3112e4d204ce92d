//! Local document storage.
//!
//! Uploaded files are copied into one flat directory under a unique name.
//! The stored name is the file reference recorded on the document row.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{RagError, Result};

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a stored file. References are plain file names.
    pub fn path_of(&self, file_ref: &str) -> Result<PathBuf> {
        if file_ref.is_empty()
            || file_ref.contains(['/', '\\'])
            || file_ref == "."
            || file_ref == ".."
        {
            return Err(RagError::Extraction {
                file: file_ref.to_string(),
                reason: "invalid file reference".into(),
            });
        }
        Ok(self.root.join(file_ref))
    }

    pub fn read(&self, file_ref: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path_of(file_ref)?)?)
    }

    /// Copy `source` into storage and return its file reference.
    ///
    /// The reference keeps the original file name (and so its extension)
    /// behind a random prefix.
    pub fn save(&self, source: &Path) -> Result<String> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RagError::Extraction {
                file: source.display().to_string(),
                reason: "source has no usable file name".into(),
            })?;

        fs::create_dir_all(&self.root)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let file_ref = format!("{}_{}", &id[..12], name.replace(' ', "_"));
        fs::copy(source, self.root.join(&file_ref))?;

        debug!("stored {} as {}", source.display(), file_ref);
        Ok(file_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_copies_under_unique_name_keeping_extension() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("capitals list.txt");
        fs::write(&source, "Paris").unwrap();

        let storage = FileStorage::new(tmp.path().join("files"));
        let a = storage.save(&source).unwrap();
        let b = storage.save(&source).unwrap();

        assert_ne!(a, b);
        assert!(a.ends_with("capitals_list.txt"));
        assert_eq!(storage.read(&a).unwrap(), b"Paris");
    }

    #[test]
    fn path_traversal_rejected() {
        let storage = FileStorage::new("/tmp/files");
        assert!(storage.path_of("../secret").is_err());
        assert!(storage.path_of("..").is_err());
        assert!(storage.path_of("").is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path());
        assert!(matches!(storage.read("gone.txt"), Err(RagError::Io(_))));
    }
}
