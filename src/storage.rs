use crate::errors::ServiceError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Longest sanitized filename kept from a client upload (extension included).
const MAX_FILENAME_LEN: usize = 100;

/// Public file storage for uploaded pictures.
///
/// Paths are relative to the storage root (`hotels/1700000000_ab12cd34_pool.jpg`).
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Writes `contents` at `path`, creating parent directories as needed.
    async fn put(&self, path: &str, contents: Bytes) -> Result<(), ServiceError>;

    /// Removes the file at `path`. Returns `false` when there was nothing to remove.
    async fn delete(&self, path: &str) -> Result<bool, ServiceError>;

    /// Public URL for a stored path.
    fn url(&self, path: &str) -> String;
}

/// Stores files on the local filesystem under `root`.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, ServiceError> {
        let relative = Path::new(path);
        let is_safe = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_safe {
            return Err(ServiceError::StorageError(format!(
                "refusing to access path outside the storage root: {path}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn put(&self, path: &str, contents: Bytes) -> Result<(), ServiceError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &contents).await?;
        debug!(path, bytes = contents.len(), "Stored file");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool, ServiceError> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => {
                debug!(path, "Deleted file");
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Reduces a client-supplied filename to a safe single path segment.
///
/// Directory parts are dropped, anything outside `[A-Za-z0-9._-]` becomes `_`,
/// and leading dots are stripped so the result can never be hidden or relative.
pub fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.len() > MAX_FILENAME_LEN {
        let (stem, ext) = match cleaned.rfind('.') {
            Some(idx) if cleaned.len() - idx <= 10 => cleaned.split_at(idx),
            _ => (cleaned.as_str(), ""),
        };
        let keep = MAX_FILENAME_LEN.saturating_sub(ext.len());
        cleaned = format!("{}{}", &stem[..keep.min(stem.len())], ext);
    }

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Lowercased extension of a filename, if any.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
