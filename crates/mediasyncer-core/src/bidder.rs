//! Evaluates incoming auctions and bids on files the local formula wants.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::{mpsc, oneshot};

use crate::ids::{AuctionId, FileId, PeerId, PRICE_NOT_INTERESTED};
use crate::price::PriceFormula;
use crate::protocol::NetworkProtocol;
use crate::stats::FileStats;
use crate::upload_url::UploadUrlMinter;
use crate::volume::Volume;

/// Bounded, so a burst of concurrent `AuctionStart` broadcasts back-pressures the
/// transport's dispatch tasks rather than dropping events.
const AUCTION_QUEUE_CAPACITY: usize = 64;

struct AuctionStarted {
    peer: PeerId,
    auction_id: AuctionId,
    file: FileId,
    stats: FileStats,
}

/// Stops the Bidder's event loop. Dropping this without calling `stop` also works —
/// the loop then ends the next time `NetworkProtocol`'s sender side is dropped.
pub struct BidderHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl BidderHandle {
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub struct Bidder {
    volume: Arc<dyn Volume>,
    protocol: Arc<NetworkProtocol>,
    formula: Arc<dyn PriceFormula>,
    url_minter: Arc<dyn UploadUrlMinter>,
    rx: mpsc::Receiver<AuctionStarted>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl Bidder {
    /// Subscribes to `auction.start` once and returns the loop plus a handle to stop it.
    pub fn new(
        protocol: Arc<NetworkProtocol>,
        volume: Arc<dyn Volume>,
        formula: Arc<dyn PriceFormula>,
        url_minter: Arc<dyn UploadUrlMinter>,
    ) -> (Self, BidderHandle) {
        let (tx, rx) = mpsc::channel(AUCTION_QUEUE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        protocol.on_auction_start(move |peer, auction_id, file, stats| {
            let tx = tx.clone();
            let event = AuctionStarted { peer, auction_id, file, stats };
            // Subscriber callbacks run on their own task; spawn the actual
            // backpressured send so the dispatch task never blocks the receive loop.
            tokio::spawn(async move {
                let _ = tx.send(event).await;
            });
        });

        (
            Bidder { volume, protocol, formula, url_minter, rx, shutdown_rx },
            BidderHandle { shutdown_tx: Some(shutdown_tx) },
        )
    }

    /// Runs until `stop()` is called on the matching handle. Auctions are processed
    /// strictly sequentially, one at a time, by a single consumer.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = &mut self.shutdown_rx => {
                    info!("bidder stopping");
                    break;
                }
                maybe_event = self.rx.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_auction_started(event).await,
                        None => break,
                    }
                }
            }
        }
    }

    async fn handle_auction_started(&self, event: AuctionStarted) {
        let AuctionStarted { peer, auction_id, file, stats } = event;
        info!("received auction {auction_id} from {peer} for file {file}");

        let free_space = self.volume.available_bytes().await;
        if free_space < stats.size {
            info!("{auction_id}: not bidding - not enough space on volume");
            return;
        }

        let price = self.formula.price(&file, &stats, free_space);
        if price == PRICE_NOT_INTERESTED {
            info!("{auction_id}: not bidding - file not wanted");
            return;
        }

        match self.volume.stat(&file.path).await {
            Ok(Some(_)) => {
                info!("{auction_id}: ignoring - file exists locally");
            }
            Ok(None) => {
                let local_file = FileId::new(self.volume.id().to_string(), file.path.clone());
                let upload_url = self.url_minter.create_upload_url(&local_file);
                if let Err(err) = self.protocol.auction_bid(&peer, &auction_id, price, &upload_url).await {
                    warn!("{auction_id}: failed to send bid to {peer}: {err}");
                }
            }
            Err(err) => panic!("stat error for {file}: {err}"),
        }
    }
}
