//! The capability the Bidder needs from the FileServer, without depending on it.
//!
//! `mediasyncer-daemon` owns the concrete `FileServer`; this trait is the seam that
//! lets `Bidder` mint upload URLs without the core crate depending on axum/http.

use crate::ids::FileId;

pub trait UploadUrlMinter: Send + Sync {
    /// Mints a URL a remote peer can PUT to, to upload `file`.
    ///
    /// Fatal (panics) if `file.volume_id` does not match the server's own volume — this
    /// is a programmer error, never a runtime condition a caller can hit without
    /// passing a `FileId` it had no business constructing.
    fn create_upload_url(&self, file: &FileId) -> String;
}
