//! The `Transport` capability: name, subscribe, send, broadcast.
//!
//! This crate only depends on the trait; `mediasyncer-daemon` ships the concrete TCP
//! implementation. The wire envelope helpers here (`encode_envelope`/`decode_envelope`)
//! are shared so every `Transport` impl serializes frames identically.

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::Result;

/// `cb(peer, message_type, message)` invoked once per inbound message of a subscribed type.
pub type SubscribeCallback = Arc<dyn Fn(String, String, String) + Send + Sync>;

/// Peer name, subscribe-by-type, reliable unicast, best-effort broadcast.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stable name of the local peer for this session.
    fn name(&self) -> &str;

    /// Register a callback invoked for every inbound message of `message_type`. Multiple
    /// subscriptions for the same type are all invoked, each on its own task.
    fn subscribe(&self, message_type: &str, callback: SubscribeCallback);

    /// Reliable unicast. Fails if `peer` is unknown or unreachable.
    async fn send(&self, peer: &str, message_type: &str, message: &str) -> Result<()>;

    /// Best-effort fanout to every known peer except self. Aborts on the first per-peer
    /// error; partial delivery is the normal case, not a bug.
    async fn broadcast(&self, message_type: &str, message: &str) -> Result<()>;
}

/// Encode `<sender> <type> <message>` with single-space separators.
pub fn encode_envelope(sender: &str, message_type: &str, message: &str) -> String {
    format!("{sender} {message_type} {message}")
}

/// Decode an envelope produced by `encode_envelope`, splitting into at most 3 tokens on
/// the first two spaces so that `message` itself may contain spaces.
pub fn decode_envelope(frame: &str) -> Option<(String, String, String)> {
    let mut parts = frame.splitn(3, ' ');
    let sender = parts.next()?;
    let message_type = parts.next()?;
    let message = parts.next()?;
    Some((sender.to_string(), message_type.to_string(), message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_simple_message() {
        let frame = encode_envelope("node-a", "auction.start", "id\tvol\t/path\t100\tts");
        let (sender, ty, message) = decode_envelope(&frame).unwrap();
        assert_eq!(sender, "node-a");
        assert_eq!(ty, "auction.start");
        assert_eq!(message, "id\tvol\t/path\t100\tts");
    }

    #[test]
    fn message_may_contain_spaces() {
        let frame = encode_envelope("node-a", "auction.bid", "id 1.5 http://host/a b");
        let (sender, ty, message) = decode_envelope(&frame).unwrap();
        assert_eq!(sender, "node-a");
        assert_eq!(ty, "auction.bid");
        assert_eq!(message, "id 1.5 http://host/a b");
    }

    #[test]
    fn malformed_frame_is_none() {
        assert!(decode_envelope("only-one-token").is_none());
        assert!(decode_envelope("two tokens").is_none());
    }
}
