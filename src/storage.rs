// Content store for uploaded user images

use axum::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Attempts at a unique name before giving up on an upload
const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("image store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid image name: {0}")]
    InvalidName(String),
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist an upload and return the stored name
    async fn save(&self, original_name: &str, body: Bytes) -> Result<String, StorageError>;
    async fn delete(&self, name: &str) -> Result<(), StorageError>;
}

/// Images kept as plain files under one directory, served at `/images`
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the image directory if it does not exist yet
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        if name.is_empty() || sanitize_file_name(name) != name {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    /// Never overwrites: a taken name gets a counter, `<ts>_<n>_<name>`
    async fn save(&self, original_name: &str, body: Bytes) -> Result<String, StorageError> {
        let timestamp = Utc::now().timestamp();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = match attempt {
                0 => stored_name(timestamp, original_name),
                n => stored_name_with_counter(timestamp, n, original_name),
            };
            let path = self.path_for(&name)?;

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            if let Err(e) = write_all(&mut file, &body).await {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e.into());
            }

            debug!("Stored image {} ({} bytes)", name, body.len());
            return Ok(name);
        }

        Err(StorageError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free name for {}", sanitize_file_name(original_name)),
        )))
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        tokio::fs::remove_file(&path).await?;
        debug!("Removed image {}", name);
        Ok(())
    }
}

async fn write_all(file: &mut tokio::fs::File, body: &[u8]) -> std::io::Result<()> {
    file.write_all(body).await?;
    file.flush().await
}

/// Reduce an uploaded file name to its final path component
pub fn sanitize_file_name(original: &str) -> String {
    let last = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    match last {
        "" | "." | ".." => "upload".to_string(),
        name => name.to_string(),
    }
}

/// `<unix_timestamp>_<sanitized original name>`
pub fn stored_name(timestamp: i64, original: &str) -> String {
    format!("{}_{}", timestamp, sanitize_file_name(original))
}

/// `<unix_timestamp>_<n>_<sanitized original name>`, used once the plain name is taken
pub fn stored_name_with_counter(timestamp: i64, n: u32, original: &str) -> String {
    format!("{}_{}_{}", timestamp, n, sanitize_file_name(original))
}
