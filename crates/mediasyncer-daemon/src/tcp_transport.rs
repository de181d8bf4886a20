//! Concrete `Transport` over plain TCP to an explicit peer list.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use mediasyncer_core::errors::{MediaSyncerError, Result};
use mediasyncer_core::transport::{decode_envelope, encode_envelope, SubscribeCallback, Transport};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex as AsyncMutex;

pub struct TcpTransport {
    name: String,
    peers: HashMap<String, String>,
    connections: AsyncMutex<HashMap<String, OwnedWriteHalf>>,
    subscribers: std::sync::Mutex<HashMap<String, Vec<SubscribeCallback>>>,
}

impl TcpTransport {
    pub fn new(name: String, peers: HashMap<String, String>) -> Arc<Self> {
        Arc::new(Self {
            name,
            peers,
            connections: AsyncMutex::new(HashMap::new()),
            subscribers: std::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Binds the accept loop on `bind_port` and spawns it. Must be called once before
    /// any peer can reach this node.
    pub async fn listen(self: &Arc<Self>, bind_port: u16) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", bind_port)).await?;
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        let this = this.clone();
                        tokio::spawn(async move {
                            this.serve_connection(stream).await;
                        });
                    }
                    Err(err) => {
                        warn!("tcp transport accept error from peer: {err}");
                    }
                }
            }
        });
        Ok(())
    }

    async fn serve_connection(&self, stream: TcpStream) {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(frame)) => self.dispatch(&frame),
                Ok(None) => break,
                Err(err) => {
                    warn!("tcp transport read error: {err}");
                    break;
                }
            }
        }
    }

    fn dispatch(&self, frame: &str) {
        let Some((sender, message_type, message)) = decode_envelope(frame) else {
            warn!("dropping malformed frame: {frame:?}");
            return;
        };
        let callbacks = self.subscribers.lock().unwrap().get(&message_type).cloned();
        if let Some(callbacks) = callbacks {
            for cb in callbacks {
                cb(sender.clone(), message_type.clone(), message.clone());
            }
        }
    }

    /// Opens (or reuses) a connection to `peer`, dialing its configured address on first use.
    async fn writer_for(&self, peer: &str) -> Result<()> {
        let mut connections = self.connections.lock().await;
        if connections.contains_key(peer) {
            return Ok(());
        }
        let addr = self
            .peers
            .get(peer)
            .ok_or_else(|| MediaSyncerError::transport(format!("unknown peer '{peer}'")))?;
        let stream = TcpStream::connect(addr).await.map_err(|err| {
            MediaSyncerError::transport(format!("failed to connect to peer '{peer}' at {addr}: {err}"))
        })?;
        let (_, write_half) = stream.into_split();
        connections.insert(peer.to_string(), write_half);
        Ok(())
    }

    async fn write_frame(&self, peer: &str, frame: &str) -> Result<()> {
        self.writer_for(peer).await?;
        let mut connections = self.connections.lock().await;
        let Some(writer) = connections.get_mut(peer) else {
            return Err(MediaSyncerError::transport(format!("no connection to peer '{peer}'")));
        };
        let line = format!("{frame}\n");
        if let Err(err) = writer.write_all(line.as_bytes()).await {
            connections.remove(peer);
            return Err(MediaSyncerError::transport(format!("write to peer '{peer}' failed: {err}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&self, message_type: &str, callback: SubscribeCallback) {
        self.subscribers.lock().unwrap().entry(message_type.to_string()).or_default().push(callback);
    }

    async fn send(&self, peer: &str, message_type: &str, message: &str) -> Result<()> {
        let frame = encode_envelope(&self.name, message_type, message);
        self.write_frame(peer, &frame).await
    }

    async fn broadcast(&self, message_type: &str, message: &str) -> Result<()> {
        let frame = encode_envelope(&self.name, message_type, message);
        for peer in self.peers.keys() {
            if peer == &self.name {
                continue;
            }
            // Aborts eagerly on the first peer failure rather than collecting partial results.
            self.write_frame(peer, &frame).await?;
        }
        info!("broadcast {message_type} to {} peers", self.peers.len());
        Ok(())
    }
}
