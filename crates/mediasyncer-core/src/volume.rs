//! The `Volume` capability: a directory-like store of files with a stable identifier.
//!
//! Concrete implementations (disk-backed, in-memory for tests) live outside this crate;
//! the core only depends on this trait, consumed as `Arc<dyn Volume>`.

use std::io::SeekFrom;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

use crate::errors::Result;
use crate::ids::ByteSize;

/// Metadata about a single file as reported by `Volume::stat` / `Volume::walk`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeEntry {
    pub size: ByteSize,
    pub mod_time: Option<DateTime<Utc>>,
}

/// Object-safe combination of `AsyncRead + AsyncSeek`, since trait objects can only
/// name a single non-auto trait.
pub trait AsyncReadSeek: AsyncRead + AsyncSeek + Send + Unpin {}
impl<T: AsyncRead + AsyncSeek + Send + Unpin> AsyncReadSeek for T {}

/// A boxed seekable async reader, returned by `Volume::read`.
pub type VolumeReader = std::pin::Pin<Box<dyn AsyncReadSeek>>;

/// A boxed async writer, returned by `Volume::write`. The caller closes it by dropping it
/// (or calling `shutdown`), at which point the file is durably created.
pub type VolumeWriter = std::pin::Pin<Box<dyn AsyncWrite + Send + Unpin>>;

/// A local file repository with a stable identifier and a fixed capacity.
///
/// `path` arguments are always relative to the volume root and use `/` separators.
#[async_trait]
pub trait Volume: Send + Sync {
    /// Stable identifier for this volume, persisted across restarts.
    fn id(&self) -> &str;

    /// Free capacity in bytes. May be approximate for non-disk volumes.
    async fn available_bytes(&self) -> ByteSize;

    /// Enumerate every file (not directory) under the volume root, relative path + stats.
    /// Implementations skip the volume-id sentinel file.
    async fn walk(&self) -> Result<Vec<(String, VolumeEntry)>>;

    /// `Ok(Some(entry))` if the path exists, `Ok(None)` if it does not, `Err` for any
    /// other failure. Callers rely on this three-way split — "not found" is not an error.
    async fn stat(&self, path: &str) -> Result<Option<VolumeEntry>>;

    /// Open a seekable reader over an existing file.
    async fn read(&self, path: &str) -> Result<VolumeReader>;

    /// Open a writer that creates `path`. Callers must not call this for an existing path;
    /// implementations are free to error if they do (the FileServer already checks `stat`
    /// first to enforce create-only semantics).
    async fn write(&self, path: &str) -> Result<VolumeWriter>;

    /// Remove a file.
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Convenience re-export so callers reading a `VolumeReader` don't need to import `SeekFrom`
/// just to seek to the start before streaming a body.
pub const SEEK_START: SeekFrom = SeekFrom::Start(0);
