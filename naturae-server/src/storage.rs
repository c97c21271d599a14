//! Uploaded media files on disk
//!
//! Files live under `media/{user_id}/{sha256}.{ext}` inside the root folder
//! and are served read-only at `/media/...`. Content addressing means the
//! same file uploaded twice by one user is stored once on disk; the quota is
//! still charged per media row.

use naturae_common::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// URL prefix the media folder is served under
pub const MEDIA_URL_PREFIX: &str = "/media";

/// A file written by [`MediaStore::save`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the media folder
    pub storage_path: String,
    /// Public URL
    pub url: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    /// Serializes reference checks against file removal
    files: Arc<Mutex<()>>,
}

/// User ids become directory names; anything but `[A-Za-z0-9_-]` is refused
fn safe_segment(value: &str) -> Result<&str> {
    if !value.is_empty()
        && value.len() <= 128
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(value)
    } else {
        Err(Error::InvalidInput(format!("Unsafe path segment '{}'", value)))
    }
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Arc::new(Mutex::new(())),
        }
    }

    /// Hold while counting references to a stored file and deleting it, or
    /// while checking that a freshly referenced file is still on disk
    pub async fn lock_files(&self) -> MutexGuard<'_, ()> {
        self.files.lock().await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` for `user_id`, returning where it went
    pub async fn save(&self, user_id: &str, extension: &str, bytes: &[u8]) -> Result<StoredFile> {
        let user_dir = safe_segment(user_id)?;
        let extension = extension.to_ascii_lowercase();
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidInput(format!("Unsupported file extension '{}'", extension)));
        }

        let digest = format!("{:x}", Sha256::digest(bytes));
        let storage_path = format!("{}/{}.{}", user_dir, digest, extension);
        let path = self.root.join(&storage_path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(path = %path.display(), "Media file already stored");
        } else {
            tokio::fs::write(&path, bytes).await?;
            tracing::info!(path = %path.display(), size = bytes.len(), "Stored media file");
        }

        Ok(StoredFile {
            url: format!("{}/{}", MEDIA_URL_PREFIX, storage_path),
            storage_path,
            size_bytes: bytes.len() as i64,
        })
    }

    /// Write `bytes` back when a stored file vanished after [`save`](Self::save)
    ///
    /// A concurrent delete may remove a shared file between `save` finding it
    /// and the new media row being inserted. Call with [`lock_files`](Self::lock_files)
    /// held, after the row exists. Returns whether the file was rewritten.
    pub async fn restore_if_missing(&self, storage_path: &str, bytes: &[u8]) -> Result<bool> {
        let path = self.root.join(storage_path);
        if tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::warn!(storage_path = %storage_path, "Restored media file removed during upload");
        Ok(true)
    }

    /// Remove a stored file; a missing file is not an error
    pub async fn delete(&self, storage_path: &str) -> Result<()> {
        if storage_path.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(Error::InvalidInput(format!("Unsafe storage path '{}'", storage_path)));
        }

        match tokio::fs::remove_file(self.root.join(storage_path)).await {
            Ok(()) => {
                tracing::info!(storage_path = %storage_path, "Deleted media file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_delete() {
        let temp = TempDir::new().unwrap();
        let store = MediaStore::new(temp.path());

        let stored = store.save("user-1", "MP3", b"ID3 audio").await.unwrap();
        assert!(stored.storage_path.starts_with("user-1/"));
        assert!(stored.storage_path.ends_with(".mp3"));
        assert_eq!(stored.url, format!("/media/{}", stored.storage_path));
        assert_eq!(stored.size_bytes, 9);
        assert!(temp.path().join(&stored.storage_path).exists());

        let again = store.save("user-1", "mp3", b"ID3 audio").await.unwrap();
        assert_eq!(again.storage_path, stored.storage_path);

        store.delete(&stored.storage_path).await.unwrap();
        assert!(!temp.path().join(&stored.storage_path).exists());
        store.delete(&stored.storage_path).await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_file_removed_after_save() {
        let temp = TempDir::new().unwrap();
        let store = MediaStore::new(temp.path());
        let stored = store.save("user-1", "jpg", b"jpeg bytes").await.unwrap();

        let _guard = store.lock_files().await;
        assert!(!store.restore_if_missing(&stored.storage_path, b"jpeg bytes").await.unwrap());

        store.delete(&stored.storage_path).await.unwrap();
        assert!(store.restore_if_missing(&stored.storage_path, b"jpeg bytes").await.unwrap());
        let on_disk = std::fs::read(temp.path().join(&stored.storage_path)).unwrap();
        assert_eq!(on_disk, b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_unsafe_paths_rejected() {
        let temp = TempDir::new().unwrap();
        let store = MediaStore::new(temp.path());

        assert!(store.save("../etc", "jpg", b"x").await.is_err());
        assert!(store.save("user", "j/pg", b"x").await.is_err());
        assert!(store.delete("../naturae.db").await.is_err());
    }
}
