//! # Object Store — Put/Get with Range Reads
//!
//! The cloud object store is an external collaborator; this module
//! defines the interface the pipeline calls through and two local
//! backends: a filesystem store for development and an in-memory store
//! for tests.
//!
//! Writes are atomic at the path level. `put` to an existing path
//! overwrites, which is safe because raw paths are content-addressed —
//! identical path implies identical bytes.

use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Error from an object-store operation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested path does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A byte range fell outside the object.
    #[error("range {start}..{end} outside object {path} of {len} bytes")]
    BadRange {
        path: String,
        start: u64,
        end: u64,
        len: u64,
    },

    /// The backend is unreachable or failed.
    #[error("object store unavailable: {0}")]
    Unavailable(String),

    /// Filesystem error.
    #[error("object store io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

/// Blob storage interface.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes at a path, overwriting any existing object.
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Fetch a whole object.
    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Fetch bytes `start..end` (end exclusive) of an object.
    async fn get_range(&self, path: &str, start: u64, end: u64) -> Result<Vec<u8>, StoreError>;

    /// Whether an object exists at the path.
    async fn exists(&self, path: &str) -> Result<bool, StoreError>;
}

/// Filesystem-backed object store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write-then-rename so readers never observe a partial object.
        let tmp = full.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &full).await?;
        tracing::debug!(path, bytes = bytes.len(), "object stored");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let full = self.full_path(path);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn get_range(&self, path: &str, start: u64, end: u64) -> Result<Vec<u8>, StoreError> {
        let bytes = self.get(path).await?;
        let len = bytes.len() as u64;
        if start > end || end > len {
            return Err(StoreError::BadRange {
                path: path.to_string(),
                start,
                end,
                len,
            });
        }
        Ok(bytes[start as usize..end as usize].to_vec())
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(self.full_path(path)).await?)
    }
}

/// In-memory object store for tests.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects; lets tests assert "no new writes".
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.objects.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .get(path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn get_range(&self, path: &str, start: u64, end: u64) -> Result<Vec<u8>, StoreError> {
        let bytes = self.get(path).await?;
        let len = bytes.len() as u64;
        if start > end || end > len {
            return Err(StoreError::BadRange {
                path: path.to_string(),
                start,
                end,
                len,
            });
        }
        Ok(bytes[start as usize..end as usize].to_vec())
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.objects.contains_key(path))
    }
}
