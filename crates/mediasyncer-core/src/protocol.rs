//! Typed adapter over `Transport`: serializes/deserializes the three auction messages
//! and exposes typed subscribe/send methods, mirroring `libsyncer/protocol.go`.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use log::error;

use crate::errors::{MediaSyncerError, Result};
use crate::ids::{AuctionId, FileId, PeerId, Price};
use crate::stats::FileStats;
use crate::transport::{SubscribeCallback, Transport};

pub const MESSAGE_AUCTION_START: &str = "auction.start";
pub const MESSAGE_AUCTION_BID: &str = "auction.bid";
pub const MESSAGE_AUCTION_END: &str = "auction.end";

/// Formats a price as its shortest decimal representation that round-trips, with no
/// forced trailing zeroes.
pub fn format_price(price: Price) -> String {
    format!("{price}")
}

fn split_fields(message: &str, count: usize) -> Vec<&str> {
    message.splitn(count, '\t').collect()
}

pub struct NetworkProtocol {
    transport: Arc<dyn Transport>,
}

impl NetworkProtocol {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn name(&self) -> &str {
        self.transport.name()
    }

    /// Broadcasts `auction.start` with the fixed 5-field tab-separated layout.
    pub async fn auction_start(&self, auction_id: &AuctionId, file: &FileId, stats: &FileStats) -> Result<()> {
        let mod_time = stats
            .mod_time
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let message = format!(
            "{}\t{}\t{}\t{}\t{}",
            auction_id, file.volume_id, file.path, stats.size, mod_time
        );
        self.transport.broadcast(MESSAGE_AUCTION_START, &message).await
    }

    /// Registers a callback for inbound `auction.start` messages. A malformed
    /// timestamp is a fatal, loud failure — everything else best-effort.
    pub fn on_auction_start<F>(&self, callback: F)
    where
        F: Fn(PeerId, AuctionId, FileId, FileStats) + Send + Sync + 'static,
    {
        let cb: SubscribeCallback = Arc::new(move |peer, _ty, message| {
            let fields = split_fields(&message, 5);
            let auction_id = AuctionId::from(fields.first().copied().unwrap_or_default());
            let volume_id = fields.get(1).copied().unwrap_or_default().to_string();
            let path = fields.get(2).copied().unwrap_or_default().to_string();
            let size = fields.get(3).and_then(|s| s.parse().ok()).unwrap_or(0);
            let mod_time_raw = fields.get(4).copied().unwrap_or_default();

            let mod_time = match DateTime::parse_from_rfc3339(mod_time_raw) {
                Ok(t) => t.with_timezone(&Utc),
                Err(err) => {
                    // Malformed auction-start timestamps are fatal, not skippable. A
                    // panic here would only unwind this dispatch task, not the process
                    // (each subscriber runs on its own task) — exit explicitly instead.
                    error!("malformed timestamp from {peer}: {err}");
                    std::process::exit(1);
                }
            };

            callback(
                peer,
                auction_id,
                FileId::new(volume_id, path),
                FileStats::new(size, Some(mod_time)),
            );
        });
        self.transport.subscribe(MESSAGE_AUCTION_START, cb);
    }

    /// Sends `auction.bid` directly to the auction's originator (reliable unicast).
    pub async fn auction_bid(&self, peer: &str, auction_id: &AuctionId, price: Price, upload_url: &str) -> Result<()> {
        let message = format!("{}\t{}\t{}", auction_id, format_price(price), upload_url);
        self.transport.send(peer, MESSAGE_AUCTION_BID, &message).await
    }

    pub fn on_auction_bid<F>(&self, callback: F)
    where
        F: Fn(PeerId, AuctionId, Price, String) + Send + Sync + 'static,
    {
        let cb: SubscribeCallback = Arc::new(move |peer, _ty, message| {
            let fields = split_fields(&message, 3);
            let auction_id = AuctionId::from(fields.first().copied().unwrap_or_default());
            let price: Price = fields.get(1).and_then(|s| s.parse().ok()).unwrap_or(0.0);
            let upload_url = fields.get(2).copied().unwrap_or_default().to_string();
            callback(peer, auction_id, price, upload_url);
        });
        self.transport.subscribe(MESSAGE_AUCTION_BID, cb);
    }

    /// Broadcasts `auction.end`. Losing this broadcast is acceptable: peers simply
    /// never learn the outcome, which does not affect placement correctness.
    pub async fn auction_end(&self, auction_id: &AuctionId, winner: &str) -> Result<()> {
        let message = format!("{auction_id}\t{winner}");
        if let Err(err) = self.transport.broadcast(MESSAGE_AUCTION_END, &message).await {
            error!("failed to broadcast auction.end for {auction_id}: {err}");
            return Err(err);
        }
        Ok(())
    }

    pub fn on_auction_end<F>(&self, callback: F)
    where
        F: Fn(PeerId, AuctionId, PeerId) + Send + Sync + 'static,
    {
        let cb: SubscribeCallback = Arc::new(move |peer, _ty, message| {
            let fields = split_fields(&message, 2);
            let auction_id = AuctionId::from(fields.first().copied().unwrap_or_default());
            let winner = fields.get(1).copied().unwrap_or_default().to_string();
            callback(peer, auction_id, winner);
        });
        self.transport.subscribe(MESSAGE_AUCTION_END, cb);
    }
}

/// Parses an RFC3339 timestamp, returning a `Fatal` error instead of panicking. Used by
/// transports that would rather propagate the violation than unwind the dispatch task.
pub fn parse_mod_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|err| MediaSyncerError::fatal(format!("malformed timestamp '{raw}': {err}")))
}
