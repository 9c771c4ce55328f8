//! Fan-out relay of peer position updates.
//!
//! Every connected peer has one registry entry and one outbound frame queue.
//! An update from a peer is stored under its id and queued to every other
//! peer; the sender never gets its own update echoed back. Ordering between
//! recipients is unspecified, per-sender FIFO comes from the TCP stream and
//! the per-recipient queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use futures::prelude::*;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

use crate::protocol::{LocationSample, PeerId, WireEvent};

struct PeerEntry {
    /// Unpopulated until the first `updateLocation` arrives.
    position: Option<LocationSample>,
    last_updated: Option<DateTime<Utc>>,
    outbound: mpsc::UnboundedSender<WireEvent>,
}

/// Shared peer registry. Every state change is a single map operation behind
/// the lock; an entry is only written by its own connection task.
pub struct Registry {
    peers: Mutex<HashMap<PeerId, PeerEntry>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            peers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a new connection, handing back its id and outbound queue.
    pub async fn register(&self) -> (PeerId, mpsc::UnboundedReceiver<WireEvent>) {
        let id = PeerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.lock().await.insert(
            id,
            PeerEntry {
                position: None,
                last_updated: None,
                outbound: tx,
            },
        );
        (id, rx)
    }

    /// Stores the sender's position and queues a relay to every other peer.
    /// Returns the number of peers the update was queued for.
    pub async fn update_location(&self, from: PeerId, fix: LocationSample) -> usize {
        let mut peers = self.peers.lock().await;
        let Some(entry) = peers.get_mut(&from) else {
            // Updates cannot precede the connection; drop, do not surface.
            warn!(%from, "location update from unregistered connection");
            return 0;
        };
        entry.position = Some(fix);
        entry.last_updated = Some(Utc::now());

        let relay = WireEvent::relay(fix);
        let mut queued = 0;
        for (id, peer) in peers.iter() {
            if *id == from {
                continue;
            }
            if peer.outbound.send(relay).is_ok() {
                queued += 1;
            }
        }
        queued
    }

    pub async fn remove(&self, id: PeerId) {
        self.peers.lock().await.remove(&id);
    }

    pub async fn contains(&self, id: PeerId) -> bool {
        self.peers.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }

    /// Last stored position per peer, for logs and introspection.
    pub async fn snapshot(&self) -> Vec<(PeerId, Option<LocationSample>)> {
        self.peers
            .lock()
            .await
            .iter()
            .map(|(id, entry)| (*id, entry.position))
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

/// Accept loop. Each connection runs in its own task; one failing peer never
/// disturbs the hub or the others.
pub async fn serve(registry: &'static Registry, listener: TcpListener) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "hub listening");
    loop {
        let (stream, addr) = listener.accept().await?;
        tokio::spawn(async move {
            if let Err(err) = handle_peer(registry, stream).await {
                debug!(%addr, "connection ended: {err}");
            }
        });
    }
}

async fn handle_peer(registry: &'static Registry, stream: TcpStream) -> anyhow::Result<()> {
    let mut framed = Framed::new(stream, LinesCodec::new());
    let (id, mut outbound) = registry.register().await;
    info!(%id, "new client connected");

    let result = relay_loop(registry, id, &mut framed, &mut outbound).await;

    registry.remove(id).await;
    info!(%id, "client disconnected");
    result
}

async fn relay_loop(
    registry: &Registry,
    id: PeerId,
    framed: &mut Framed<TcpStream, LinesCodec>,
    outbound: &mut mpsc::UnboundedReceiver<WireEvent>,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            line = framed.next() => {
                let Some(line) = line else {
                    return Ok(());
                };
                match WireEvent::decode(&line?) {
                    Ok(WireEvent::UpdateLocation { latitude, longitude }) => {
                        let fix = LocationSample::new(latitude, longitude);
                        debug!(%id, latitude, longitude, "location update");
                        registry.update_location(id, fix).await;
                    }
                    Ok(other) => {
                        warn!(%id, ?other, "unexpected event from client, dropped");
                    }
                    Err(err) => {
                        warn!(%id, "dropped frame: {err}");
                    }
                }
            }
            event = outbound.recv() => {
                // The queue lives in our own registry entry, it only closes
                // once this loop is gone.
                let Some(event) = event else {
                    return Ok(());
                };
                framed.send(serde_json::to_string(&event)?).await?;
            }
        }
    }
}
