//! Flat upload directory.
//!
//! Every uploaded file lives directly under one directory, named by the
//! original upload file name. There is no metadata sidecar and no locking:
//! two writers of the same name race and the last write wins.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::error::AppError;
use crate::extract::DocumentFormat;

/// One stored file as seen by a directory scan.
///
/// A file rewritten under the same name gets a different stamp (its length or
/// modification time moves), so comparing stamps detects overwrites that a
/// name comparison misses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStamp {
    pub name: String,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens the store, creating the directory if it does not exist yet.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Writes `bytes` under `name`, replacing any existing file.
    ///
    /// Returns the sanitised name actually used on disk.
    pub fn save(&self, name: &str, bytes: &[u8]) -> Result<String, AppError> {
        let name = sanitize_name(name)?;
        std::fs::write(self.root.join(&name), bytes)?;
        info!(file = %name, bytes = bytes.len(), "stored upload");
        Ok(name)
    }

    /// Names of supported files in the directory, sorted by name.
    pub fn list(&self) -> Result<Vec<String>, AppError> {
        Ok(self.snapshot()?.into_iter().map(|f| f.name).collect())
    }

    /// Stamps of supported files in the directory, sorted by name.
    ///
    /// Names that are not valid UTF-8 are skipped: they could not be passed
    /// back to [`FileStore::delete`] or loaded by name.
    pub fn snapshot(&self) -> Result<Vec<FileStamp>, AppError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    debug!(file = ?raw, "ignoring non-UTF-8 file name in upload dir");
                    continue;
                }
            };
            if DocumentFormat::from_name(&name).is_none() {
                debug!(file = %name, "ignoring unsupported file in upload dir");
                continue;
            }
            files.push(FileStamp {
                name,
                len: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    pub fn delete(&self, name: &str) -> Result<(), AppError> {
        let name = sanitize_name(name)?;
        let path = self.root.join(&name);
        if !path.is_file() {
            return Err(AppError::NotFound(name));
        }
        std::fs::remove_file(&path)?;
        info!(file = %name, "deleted upload");
        Ok(())
    }
}

/// Keeps only the final path component and requires a supported extension.
fn sanitize_name(raw: &str) -> Result<String, AppError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::UnsupportedFormat(format!(
            "invalid file name '{}'",
            raw
        )));
    }
    if DocumentFormat::from_name(&name).is_none() {
        return Err(AppError::UnsupportedFormat(format!(
            "{} (only .pdf and .docx files are accepted)",
            name
        )));
    }
    Ok(name)
}
