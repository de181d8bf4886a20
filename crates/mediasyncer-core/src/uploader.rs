//! Streams a local file to a remote peer's upload URL via HTTP PUT.

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::mpsc;

use crate::ids::{FileId, PeerId};
use crate::volume::Volume;

/// Outcome published on the Auctioneer's done-channel once an upload settles.
///
/// Both variants carry the `FileId` so the Auctioneer can remove it from
/// `uploads_in_progress` either way: failed uploads re-enter the candidate pool
/// instead of leaking forever.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Succeeded(FileId),
    Failed(FileId),
}

/// Capability the Auctioneer needs to hand a won file off to the winning peer.
/// A trait (rather than a concrete HTTP client) so the auction state machine stays
/// testable without a real network round-trip, using a swappable-implementation seam
/// for transfer execution.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, file: FileId, peer: PeerId, upload_url: String, done: mpsc::Sender<UploadOutcome>);
}

/// Production `Uploader`: streams the local file as the body of an HTTP PUT.
pub struct HttpUploader {
    volume: Arc<dyn Volume>,
    client: reqwest::Client,
}

impl HttpUploader {
    pub fn new(volume: Arc<dyn Volume>) -> Self {
        Self {
            volume,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    /// Fatal if the file's volume id doesn't match the local volume — that indicates
    /// the Auctioneer handed us a candidate that was never ours to upload.
    async fn upload(&self, file: FileId, peer: PeerId, upload_url: String, done: mpsc::Sender<UploadOutcome>) {
        info!("uploading {file} to {peer}");

        if file.volume_id != self.volume.id() {
            panic!("uploading invalid volume-id: expected {}, got {}", self.volume.id(), file.volume_id);
        }

        let reader = match self.volume.read(&file.path).await {
            Ok(reader) => reader,
            Err(err) => panic!("cannot read file {file}: {err}"),
        };

        let stream = tokio_util::io::ReaderStream::new(reader);
        let body = reqwest::Body::wrap_stream(stream);

        let response = match self.client.put(&upload_url).body(body).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("upload of {file} to {peer} failed: {err}");
                let _ = done.send(UploadOutcome::Failed(file)).await;
                return;
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::CREATED {
            let _ = done.send(UploadOutcome::Succeeded(file)).await;
        } else {
            warn!("upload of {file} to {peer} returned {status}");
            let _ = done.send(UploadOutcome::Failed(file)).await;
        }
    }
}
