//! Drives the auction lifecycle: periodic offer, bid aggregation, winner selection,
//! upload orchestration, post-upload deletion.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration as ChronoDuration, Utc};
use log::{error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::ids::{AuctionId, FileId, PeerId, Price};
use crate::price::PriceFormula;
use crate::protocol::NetworkProtocol;
use crate::stats::FileStats;
use crate::uploader::{UploadOutcome, Uploader as UploaderTrait};
use crate::volume::Volume;

const TICK_INTERVAL: StdDuration = StdDuration::from_secs(10);
const AUCTION_TIMEOUT: StdDuration = StdDuration::from_secs(5);
const YOUNG_THRESHOLD_MINUTES: i64 = 60;

/// Bounded so a burst of simultaneous bids back-pressures instead of being dropped.
const BID_QUEUE_CAPACITY: usize = 64;
const UPLOAD_DONE_QUEUE_CAPACITY: usize = 16;

struct BidReceived {
    peer: PeerId,
    auction_id: AuctionId,
    price: Price,
    upload_url: String,
}

#[derive(Debug, Clone)]
struct AuctionCandidate {
    file: FileId,
    stats: FileStats,
    reserve_price: Price,
}

pub struct AuctioneerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl AuctioneerHandle {
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub struct Auctioneer {
    protocol: Arc<NetworkProtocol>,
    formula: Arc<dyn PriceFormula>,
    volume: Arc<dyn Volume>,
    uploader: Arc<dyn UploaderTrait>,
    bid_rx: mpsc::Receiver<BidReceived>,
    upload_done_tx: mpsc::Sender<UploadOutcome>,
    upload_done_rx: mpsc::Receiver<UploadOutcome>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl Auctioneer {
    pub fn new(
        protocol: Arc<NetworkProtocol>,
        formula: Arc<dyn PriceFormula>,
        volume: Arc<dyn Volume>,
        uploader: Arc<dyn UploaderTrait>,
    ) -> (Self, AuctioneerHandle) {
        let (bid_tx, bid_rx) = mpsc::channel(BID_QUEUE_CAPACITY);
        let (upload_done_tx, upload_done_rx) = mpsc::channel(UPLOAD_DONE_QUEUE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        protocol.on_auction_bid(move |peer, auction_id, price, upload_url| {
            let bid_tx = bid_tx.clone();
            let bid = BidReceived { peer, auction_id, price, upload_url };
            tokio::spawn(async move {
                let _ = bid_tx.send(bid).await;
            });
        });

        (
            Auctioneer {
                protocol,
                formula,
                volume,
                uploader,
                bid_rx,
                upload_done_tx,
                upload_done_rx,
                shutdown_rx,
            },
            AuctioneerHandle { shutdown_tx: Some(shutdown_tx) },
        )
    }

    async fn collect_candidates(&self, uploads_in_progress: &HashSet<String>) -> Vec<AuctionCandidate> {
        let free_space = self.volume.available_bytes().await;
        let young_boundary = Utc::now() - ChronoDuration::minutes(YOUNG_THRESHOLD_MINUTES);

        let entries = match self.volume.walk().await {
            Ok(entries) => entries,
            Err(err) => {
                warn!("failed to walk volume: {err}");
                return Vec::new();
            }
        };

        let mut candidates = Vec::new();
        for (path, entry) in entries {
            if entry.size == 0 {
                continue;
            }

            let file = FileId::new(self.volume.id().to_string(), path);
            if uploads_in_progress.contains(&file.canonical()) {
                continue;
            }

            let Some(mod_time) = entry.mod_time else {
                continue;
            };
            if mod_time > young_boundary {
                continue; // file is "cold"-ineligible: too young
            }

            let stats = FileStats::new(entry.size, Some(mod_time));
            let reserve_price = self.formula.price(&file, &stats, free_space);
            candidates.push(AuctionCandidate { file, stats, reserve_price });
        }

        candidates
    }

    /// Runs until `stop()` is called on the matching handle.
    pub async fn run(mut self) {
        let mut auction_seq: u64 = 0;
        let mut uploads_in_progress: HashSet<String> = HashSet::new();
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut in_progress: Option<(AuctionId, AuctionCandidate, Vec<BidReceived>)> = None;
        let mut deadline_at: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                _ = &mut self.shutdown_rx => {
                    info!("auctioneer stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if in_progress.is_some() {
                        info!("ignoring auction tick - auction in progress");
                        continue;
                    }

                    let candidates = self.collect_candidates(&uploads_in_progress).await;
                    let Some(candidate) = candidates.into_iter().next() else {
                        info!("ignoring auction tick - no local file to auction found");
                        continue;
                    };

                    let auction_id = AuctionId::new(self.protocol.name(), auction_seq);
                    auction_seq += 1;

                    if let Err(err) = self.protocol.auction_start(&auction_id, &candidate.file, &candidate.stats).await {
                        warn!("failed to broadcast auction.start for {auction_id}: {err}");
                    }

                    deadline_at = Some(Instant::now() + AUCTION_TIMEOUT);
                    in_progress = Some((auction_id, candidate, Vec::new()));
                }
                Some(bid) = self.bid_rx.recv() => {
                    match in_progress.as_mut() {
                        Some((auction_id, _, bids)) if *auction_id == bid.auction_id => {
                            bids.push(bid);
                        }
                        _ => {
                            // Mismatched or stale bid: drop and keep waiting for the
                            // current auction's deadline rather than aborting the loop.
                            warn!("dropping bid for unknown or finished auction {}", bid.auction_id);
                        }
                    }
                }
                _ = async {
                    match deadline_at {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                }, if deadline_at.is_some() => {
                    deadline_at = None;
                    let Some((auction_id, candidate, bids)) = in_progress.take() else {
                        continue;
                    };
                    self.conclude_auction(auction_id, candidate, bids, &mut uploads_in_progress).await;
                }
                Some(outcome) = self.upload_done_rx.recv() => {
                    self.handle_upload_outcome(outcome, &mut uploads_in_progress).await;
                }
            }
        }
    }

    async fn conclude_auction(
        &self,
        auction_id: AuctionId,
        candidate: AuctionCandidate,
        bids: Vec<BidReceived>,
        uploads_in_progress: &mut HashSet<String>,
    ) {
        if bids.is_empty() {
            info!("{auction_id}: no bids received, auction failed");
            return;
        }

        let mut winner: Option<&BidReceived> = None;
        for bid in &bids {
            if winner.map(|w| bid.price > w.price).unwrap_or(true) {
                winner = Some(bid);
            }
        }
        let winner = winner.expect("bids is non-empty");

        info!("{auction_id}: {} bids received, best {} from {}", bids.len(), winner.price, winner.peer);

        if winner.price > candidate.reserve_price {
            info!("{auction_id}: peer {} won with {}", winner.peer, winner.price);

            if let Err(err) = self.protocol.auction_end(&auction_id, &winner.peer).await {
                warn!("{auction_id}: failed to broadcast auction.end: {err}");
            }

            uploads_in_progress.insert(candidate.file.canonical());

            let uploader = self.uploader.clone();
            let file = candidate.file.clone();
            let peer = winner.peer.clone();
            let upload_url = winner.upload_url.clone();
            let done_tx = self.upload_done_tx.clone();
            tokio::spawn(async move {
                uploader.upload(file, peer, upload_url, done_tx).await;
            });
        } else {
            info!(
                "{auction_id}: keeping file locally, no remote winner found (highest {} from {})",
                winner.price, winner.peer
            );
            if let Err(err) = self.protocol.auction_end(&auction_id, self.protocol.name()).await {
                warn!("{auction_id}: failed to broadcast auction.end: {err}");
            }
        }
    }

    async fn handle_upload_outcome(&self, outcome: UploadOutcome, uploads_in_progress: &mut HashSet<String>) {
        match outcome {
            UploadOutcome::Succeeded(file) => {
                info!("upload finished: {file}");
                uploads_in_progress.remove(&file.canonical());
                if let Err(err) = self.volume.delete(&file.path).await {
                    // Log and leave the file alone so a future tick can re-auction it
                    // (a harmless duplicate at worst, rather than a crashed node).
                    error!("failed to delete {file} after upload: {err}");
                }
            }
            UploadOutcome::Failed(file) => {
                warn!("upload failed for {file}, re-enabling for auction");
                uploads_in_progress.remove(&file.canonical());
            }
        }
    }
}
