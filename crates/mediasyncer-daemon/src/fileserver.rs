//! HTTP `FileServer`: GET/HEAD serve a file, PUT creates one. Built on axum over
//! the shared `Volume` handle.

use std::io::ErrorKind;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use futures::StreamExt as _;
use log::{error, warn};
use mediasyncer_core::errors::MediaSyncerError;
use mediasyncer_core::{FileId, UploadUrlMinter, Volume};
use tokio::io::AsyncWriteExt;
use tokio_util::io::{ReaderStream, StreamReader};

struct FileServerState {
    volume: Arc<dyn Volume>,
}

/// Builds the axum router serving GET/HEAD/PUT under the volume root.
pub fn router(volume: Arc<dyn Volume>) -> Router {
    let state = Arc::new(FileServerState { volume });
    Router::new().route("/{*path}", any(handle)).with_state(state)
}

async fn handle(
    State(state): State<Arc<FileServerState>>,
    AxumPath(path): AxumPath<String>,
    method: Method,
    body: Body,
) -> Response {
    let path = format!("/{path}");
    match method {
        Method::GET | Method::HEAD => handle_get(&state.volume, &path, method == Method::HEAD).await,
        Method::PUT => handle_put(&state.volume, &path, body).await,
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn handle_get(volume: &Arc<dyn Volume>, path: &str, head_only: bool) -> Response {
    match volume.stat(path).await {
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Ok(Some(_entry)) if head_only => StatusCode::OK.into_response(),
        Ok(Some(_entry)) => match volume.read(path).await {
            Ok(reader) => {
                let stream = ReaderStream::new(reader);
                Response::new(Body::from_stream(stream))
            }
            Err(err) => {
                error!("failed to open {path} for read: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Err(err) => {
            error!("stat failed for {path}: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn handle_put(volume: &Arc<dyn Volume>, path: &str, body: Body) -> Response {
    match volume.stat(path).await {
        Ok(Some(_)) => return StatusCode::FORBIDDEN.into_response(),
        Ok(None) => {}
        Err(err) => {
            error!("stat failed for {path}: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    // The `stat` above only rejects the common case; two PUTs racing on the same path
    // both pass it and fall through to here. `Volume::write` is the layer that actually
    // enforces create-only atomically, so a concurrent loser surfaces as an io error
    // here rather than at the check above.
    let mut writer = match volume.write(path).await {
        Ok(writer) => writer,
        Err(MediaSyncerError::Io(err)) if err.kind() == ErrorKind::AlreadyExists => {
            return StatusCode::FORBIDDEN.into_response();
        }
        Err(err) => {
            error!("failed to open {path} for write: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let body_stream = body.into_data_stream();
    let mut reader = StreamReader::new(body_stream.map(|chunk| chunk.map_err(std::io::Error::other)));
    if let Err(err) = tokio::io::copy(&mut reader, &mut *writer).await {
        warn!("failed streaming upload body into {path}: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if let Err(err) = writer.shutdown().await {
        error!("failed to finalize {path} after upload: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    StatusCode::CREATED.into_response()
}

/// Mints `http://<addr>:<port>/<path>` URLs for this volume's own `FileServer`.
pub struct HttpUploadUrlMinter {
    pub addr: String,
    pub port: u16,
    pub volume_id: String,
}

impl UploadUrlMinter for HttpUploadUrlMinter {
    fn create_upload_url(&self, file: &FileId) -> String {
        if file.volume_id != self.volume_id {
            panic!("upload url requested for foreign volume {} (this server serves {})", file.volume_id, self.volume_id);
        }
        format!("http://{}:{}{}", self.addr, self.port, file.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk_volume::DiskVolume;

    async fn volume() -> Arc<dyn Volume> {
        let dir = tempfile::tempdir().unwrap();
        Arc::new(DiskVolume::open(dir.path().to_path_buf()).await.unwrap())
    }

    #[tokio::test]
    async fn get_on_missing_path_is_404() {
        let volume = volume().await;
        let response = handle_get(&volume, "/missing.mp4", false).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_then_get_round_trips_the_body() {
        let volume = volume().await;
        let response = handle_put(&volume, "/clip.mp4", Body::from("hello")).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = handle_get(&volume, "/clip.mp4", false).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn second_put_to_an_existing_path_is_403() {
        let volume = volume().await;
        let first = handle_put(&volume, "/clip.mp4", Body::from("a")).await;
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = handle_put(&volume, "/clip.mp4", Body::from("b")).await;
        assert_eq!(second.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn concurrent_puts_to_the_same_path_let_exactly_one_through() {
        let volume = volume().await;
        let (a, b) = tokio::join!(
            handle_put(&volume, "/race.mp4", Body::from("a")),
            handle_put(&volume, "/race.mp4", Body::from("b")),
        );
        let statuses = [a.status(), b.status()];
        assert!(statuses.contains(&StatusCode::CREATED));
        assert!(statuses.contains(&StatusCode::FORBIDDEN));
    }
}
