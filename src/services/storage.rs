use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use uuid::Uuid;

use crate::utils::errors::ServiceError;

/// Where uploaded image bytes live. Rows only keep the relative path returned by `store`.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Stores `data` under `<kind>/<YYYY>/<MM>/<DD>/` and returns the relative path.
    async fn store(&self, kind: &str, extension: &str, data: &[u8]) -> Result<String, ServiceError>;
    async fn remove(&self, path: &str) -> Result<(), ServiceError>;
}

/// Relative path for a new upload of `kind`, dated today.
pub fn upload_path(kind: &str, extension: &str) -> String {
    let today = Utc::now().date_naive();
    format!(
        "{}/{:04}/{:02}/{:02}/{}.{}",
        kind,
        today.year(),
        today.month(),
        today.day(),
        Uuid::new_v4(),
        extension
    )
}

pub struct LocalImageStorage {
    root: PathBuf,
}

impl LocalImageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalImageStorage { root: root.into() }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, ServiceError> {
        let relative = Path::new(relative);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(ServiceError::InternalError(format!(
                "Refusing media path outside root: {}",
                relative.display()
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ImageStorage for LocalImageStorage {
    async fn store(
        &self,
        kind: &str,
        extension: &str,
        data: &[u8],
    ) -> Result<String, ServiceError> {
        let relative = upload_path(kind, extension);
        let full_path = self.resolve(&relative)?;

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                log::error!("Failed to create upload directory: {}", e);
                ServiceError::InternalError("Failed to create upload directory".to_string())
            })?;
        }

        tokio::fs::write(&full_path, data).await.map_err(|e| {
            log::error!("Failed to write file {}: {}", full_path.display(), e);
            ServiceError::InternalError("Failed to save file".to_string())
        })?;

        log::info!("Stored image {} ({} bytes)", relative, data.len());
        Ok(relative)
    }

    async fn remove(&self, path: &str) -> Result<(), ServiceError> {
        let full_path = self.resolve(path)?;
        tokio::fs::remove_file(&full_path).await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemoryImageStorage {
        files: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemoryImageStorage {
        pub fn contains(&self, path: &str) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }

        pub fn len(&self) -> usize {
            self.files.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ImageStorage for MemoryImageStorage {
        async fn store(
        &self,
        kind: &str,
        extension: &str,
        data: &[u8],
    ) -> Result<String, ServiceError> {
            let path = upload_path(kind, extension);
            self.files.lock().unwrap().insert(path.clone(), data.to_vec());
            Ok(path)
        }

        async fn remove(&self, path: &str) -> Result<(), ServiceError> {
            self.files
                .lock()
                .unwrap()
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| ServiceError::NotFound(format!("No stored file at {}", path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_path_is_dated_by_kind() {
        let path = upload_path("taskimage", "png");
        let parts: Vec<&str> = path.split('/').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "taskimage");
        assert_eq!(parts[1].len(), 4);
        assert!(parts[4].ends_with(".png"));
    }

    #[actix_web::test]
    async fn local_storage_writes_and_removes() {
        let root = std::env::temp_dir().join(format!("task-tracker-media-{}", Uuid::new_v4()));
        let storage = LocalImageStorage::new(&root);

        let path = storage.store("taskimage", "png", b"png-bytes").await.unwrap();
        assert_eq!(tokio::fs::read(root.join(&path)).await.unwrap(), b"png-bytes");

        storage.remove(&path).await.unwrap();
        assert!(!root.join(&path).exists());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[test]
    fn rejects_paths_escaping_root() {
        let storage = LocalImageStorage::new("/tmp/media");
        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
    }
}
