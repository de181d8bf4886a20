//! Assembles the FileServer, Auctioneer, and Bidder loops into one runnable node.

use std::sync::Arc;

use eyre::{Context, Result};
use log::info;
use mediasyncer_core::price::PriceFormula;
use mediasyncer_core::uploader::HttpUploader;
use mediasyncer_core::{Auctioneer, AuctioneerHandle, Bidder, BidderHandle, NetworkProtocol, UploadUrlMinter, Volume};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::fileserver;
use crate::tcp_transport::TcpTransport;

pub struct Syncer {
    fileserver_task: JoinHandle<()>,
    auctioneer_task: JoinHandle<()>,
    bidder_task: JoinHandle<()>,
    auctioneer_handle: AuctioneerHandle,
    bidder_handle: BidderHandle,
}

impl Syncer {
    /// Starts the FileServer HTTP listener, the Auctioneer loop, and the Bidder loop.
    #[allow(clippy::too_many_arguments)]
    pub async fn start(
        http_addr: &str,
        http_port: u16,
        volume: Arc<dyn Volume>,
        transport: Arc<TcpTransport>,
        formula: Arc<dyn PriceFormula>,
        url_minter: Arc<dyn UploadUrlMinter>,
    ) -> Result<Self> {
        let listener = TcpListener::bind((http_addr, http_port))
            .await
            .with_context(|| format!("failed to bind FileServer on {http_addr}:{http_port}"))?;
        let app = fileserver::router(volume.clone());
        let fileserver_task = tokio::spawn(async move {
            info!("fileserver listening");
            if let Err(err) = axum::serve(listener, app).await {
                log::error!("fileserver exited: {err}");
            }
        });

        let protocol = Arc::new(NetworkProtocol::new(transport.clone()));
        let uploader = Arc::new(HttpUploader::new(volume.clone()));

        let (auctioneer, auctioneer_handle) =
            Auctioneer::new(protocol.clone(), formula.clone(), volume.clone(), uploader);
        let auctioneer_task = tokio::spawn(auctioneer.run());

        let (bidder, bidder_handle) = Bidder::new(protocol, volume, formula, url_minter);
        let bidder_task = tokio::spawn(bidder.run());

        Ok(Self {
            fileserver_task,
            auctioneer_task,
            bidder_task,
            auctioneer_handle,
            bidder_handle,
        })
    }

    /// Tears down Auctioneer and Bidder in reverse start order, then the FileServer listener.
    pub async fn stop(mut self) {
        self.auctioneer_handle.stop();
        self.bidder_handle.stop();
        let _ = self.auctioneer_task.await;
        let _ = self.bidder_task.await;
        self.fileserver_task.abort();
    }
}
