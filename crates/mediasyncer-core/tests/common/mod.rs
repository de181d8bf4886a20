#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediasyncer_core::transport::SubscribeCallback;
use mediasyncer_core::uploader::UploadOutcome;
use mediasyncer_core::volume::{VolumeEntry, VolumeReader, VolumeWriter};
use mediasyncer_core::{ByteSize, FileId, Transport};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

/// Minimal in-memory `AsyncRead + AsyncSeek` over a `Vec<u8>`, for `FakeVolume::read`.
struct MemCursor(Cursor<Vec<u8>>);

impl AsyncRead for MemCursor {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let n = self.0.read(buf.initialize_unfilled())?;
        buf.advance(n);
        Poll::Ready(Ok(()))
    }
}

impl AsyncSeek for MemCursor {
    fn start_seek(mut self: Pin<&mut Self>, position: SeekFrom) -> std::io::Result<()> {
        self.0.seek(position).map(|_| ())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<u64>> {
        Poll::Ready(Ok(self.0.position()))
    }
}

struct MemWriter {
    path: String,
    buffer: Vec<u8>,
    files: Arc<Mutex<HashMap<String, (Vec<u8>, DateTime<Utc>)>>>,
}

impl AsyncWrite for MemWriter {
    fn poll_write(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        self.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let buffer = std::mem::take(&mut self.buffer);
        self.files.lock().insert(self.path.clone(), (buffer, Utc::now()));
        Poll::Ready(Ok(()))
    }
}

/// An in-memory `Volume` double: no disk I/O, deterministic, safe to share across
/// concurrently-running Auctioneer/Bidder loops in a test.
pub struct FakeVolume {
    id: String,
    capacity: ByteSize,
    files: Arc<Mutex<HashMap<String, (Vec<u8>, DateTime<Utc>)>>>,
}

impl FakeVolume {
    pub fn new(id: &str, capacity: ByteSize) -> Self {
        Self {
            id: id.to_string(),
            capacity,
            files: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn seed(&self, path: &str, bytes: Vec<u8>, mod_time: DateTime<Utc>) {
        self.files.lock().insert(path.to_string(), (bytes, mod_time));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().contains_key(path)
    }

    pub fn bytes_of(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(path).map(|(bytes, _)| bytes.clone())
    }
}

#[async_trait]
impl mediasyncer_core::Volume for FakeVolume {
    fn id(&self) -> &str {
        &self.id
    }

    async fn available_bytes(&self) -> ByteSize {
        let used: ByteSize = self.files.lock().values().map(|(bytes, _)| bytes.len() as ByteSize).sum();
        self.capacity.saturating_sub(used)
    }

    async fn walk(&self) -> mediasyncer_core::Result<Vec<(String, VolumeEntry)>> {
        Ok(self
            .files
            .lock()
            .iter()
            .map(|(path, (bytes, mod_time))| {
                (
                    path.clone(),
                    VolumeEntry {
                        size: bytes.len() as ByteSize,
                        mod_time: Some(*mod_time),
                    },
                )
            })
            .collect())
    }

    async fn stat(&self, path: &str) -> mediasyncer_core::Result<Option<VolumeEntry>> {
        Ok(self.files.lock().get(path).map(|(bytes, mod_time)| VolumeEntry {
            size: bytes.len() as ByteSize,
            mod_time: Some(*mod_time),
        }))
    }

    async fn read(&self, path: &str) -> mediasyncer_core::Result<VolumeReader> {
        let bytes = self
            .files
            .lock()
            .get(path)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()))?;
        Ok(Box::pin(MemCursor(Cursor::new(bytes))))
    }

    async fn write(&self, path: &str) -> mediasyncer_core::Result<VolumeWriter> {
        Ok(Box::pin(MemWriter {
            path: path.to_string(),
            buffer: Vec::new(),
            files: self.files.clone(),
        }))
    }

    async fn delete(&self, path: &str) -> mediasyncer_core::Result<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()).into())
    }
}

/// A `Transport` double that records every send/broadcast and lets tests deliver
/// messages into its subscribers synchronously from the outside (simulating a peer).
pub struct RecordingTransport {
    name: String,
    pub broadcasts: Mutex<Vec<(String, String)>>,
    pub sent: Mutex<Vec<(String, String, String)>>,
    subscribers: Mutex<HashMap<String, Vec<SubscribeCallback>>>,
}

impl RecordingTransport {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            broadcasts: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            subscribers: Mutex::new(HashMap::new()),
        })
    }

    /// Simulates an inbound message from `peer`, invoking every subscriber registered
    /// for `message_type`.
    pub fn deliver(&self, peer: &str, message_type: &str, message: &str) {
        if let Some(callbacks) = self.subscribers.lock().get(message_type) {
            for cb in callbacks {
                cb(peer.to_string(), message_type.to_string(), message.to_string());
            }
        }
    }

    pub fn last_broadcast(&self, message_type: &str) -> Option<String> {
        self.broadcasts
            .lock()
            .iter()
            .rev()
            .find(|(ty, _)| ty == message_type)
            .map(|(_, message)| message.clone())
    }

    pub fn last_sent(&self) -> Option<(String, String, String)> {
        self.sent.lock().last().cloned()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&self, message_type: &str, callback: SubscribeCallback) {
        self.subscribers.lock().entry(message_type.to_string()).or_default().push(callback);
    }

    async fn send(&self, peer: &str, message_type: &str, message: &str) -> mediasyncer_core::Result<()> {
        self.sent.lock().push((peer.to_string(), message_type.to_string(), message.to_string()));
        Ok(())
    }

    async fn broadcast(&self, message_type: &str, message: &str) -> mediasyncer_core::Result<()> {
        self.broadcasts.lock().push((message_type.to_string(), message.to_string()));
        Ok(())
    }
}

/// Mints predictable, fake upload URLs without an HTTP server behind them.
pub struct FakeUrlMinter {
    pub volume_id: String,
    pub base: String,
}

impl mediasyncer_core::UploadUrlMinter for FakeUrlMinter {
    fn create_upload_url(&self, file: &FileId) -> String {
        assert_eq!(file.volume_id, self.volume_id, "upload url requested for foreign volume");
        format!("http://{}{}", self.base, file.path)
    }
}

/// Simulates the winning peer's `FileServer`: instead of a real HTTP PUT, copies the
/// bytes directly into the destination `FakeVolume` and reports success/failure like
/// the production `HttpUploader` would.
pub struct TransferringUploader {
    pub source: Arc<FakeVolume>,
    pub destination: Arc<FakeVolume>,
    pub fail: bool,
}

#[async_trait]
impl mediasyncer_core::Uploader for TransferringUploader {
    async fn upload(
        &self,
        file: FileId,
        _peer: String,
        _upload_url: String,
        done: mpsc::Sender<UploadOutcome>,
    ) {
        if self.fail {
            let _ = done.send(UploadOutcome::Failed(file)).await;
            return;
        }

        if self.destination.contains(&file.path) {
            let _ = done.send(UploadOutcome::Failed(file)).await;
            return;
        }

        let bytes = self.source.bytes_of(&file.path).unwrap_or_default();
        self.destination.seed(&file.path, bytes, Utc::now());
        let _ = done.send(UploadOutcome::Succeeded(file)).await;
    }
}
