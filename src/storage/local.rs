use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{Health, StorageBackend, StorageError};

/// Snapshot stored in a single file on local disk.
///
/// Saves write a temporary file next to the target and rename it into place,
/// so readers only ever see a complete payload.
#[derive(Debug, Clone)]
pub struct LocalFileBackend {
    path: PathBuf,
}

impl LocalFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalFileBackend {
    async fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                tracing::debug!("Loaded {} bytes from {}", bytes.len(), self.path.display());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                tracing::error!("Failed to read {}: {}", self.path.display(), e);
                Err(StorageError::Unavailable(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        }
    }

    async fn save(&self, payload: &[u8]) -> Result<(), StorageError> {
        let path = self.path.clone();
        let dir = self.parent_dir();
        let payload = payload.to_vec();

        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &payload))
            .await
            .map_err(|e| StorageError::Save(format!("save task failed: {}", e)))?
            .map_err(|e| {
                tracing::error!("Failed to save to {}: {}", self.path.display(), e);
                StorageError::Save(format!("failed to write {}: {}", self.path.display(), e))
            })?;

        tracing::debug!("Saved snapshot to {}", self.path.display());
        Ok(())
    }

    async fn health(&self) -> Health {
        if let Ok(meta) = tokio::fs::metadata(&self.path).await {
            if meta.is_dir() {
                return Health::unhealthy(format!("{} is a directory", self.path.display()));
            }
        }

        // The directory may not exist yet; the first save creates it.
        let mut dir = self.parent_dir();
        loop {
            match tokio::fs::metadata(&dir).await {
                Ok(meta) if !meta.is_dir() => {
                    return Health::unhealthy(format!("{} is not a directory", dir.display()));
                }
                Ok(meta) if meta.permissions().readonly() => {
                    return Health::unhealthy(format!("{} is not writable", dir.display()));
                }
                Ok(_) => return Health::healthy(format!("{} is writable", dir.display())),
                Err(e) if e.kind() == ErrorKind::NotFound => match dir.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => dir = parent.to_path_buf(),
                    _ => return Health::unhealthy(format!("{} does not exist", dir.display())),
                },
                Err(e) => {
                    return Health::unhealthy(format!("cannot inspect {}: {}", dir.display(), e))
                }
            }
        }
    }
}

fn write_atomic(dir: &Path, path: &Path, payload: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(dir)?;

    tmp.write_all(payload)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
