//! Client-side compass: position and heading in, needle rotation out.

use futures::prelude::*;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

use crate::bearing::{bearing_between, relative_angle};
use crate::error::CompassError;
use crate::indicator::{coordinate_line, Indicator};
use crate::protocol::{LocationSample, WireEvent};
use crate::sensors::LocationSource;
use crate::storage::Storage;

/// Permission-gated lifecycle of one compass instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    PermissionPending,
    /// Heading and location samples are both flowing.
    Active,
    /// Terminal: sensor access refused, compass features stay off until the
    /// user retries by hand.
    Denied,
}

pub struct CompassEngine<'a, L, I> {
    storage: &'a Storage,
    location: L,
    indicator: I,
    state: EngineState,
    last_angle: Option<f64>,
}

impl<'a, L, I> CompassEngine<'a, L, I>
where
    L: LocationSource,
    I: Indicator,
{
    pub fn new(storage: &'a Storage, location: L, indicator: I) -> Self {
        CompassEngine {
            storage,
            location,
            indicator,
            state: EngineState::Uninitialized,
            last_angle: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Rotation the needle was last set to.
    pub fn last_angle(&self) -> Option<f64> {
        self.last_angle
    }

    pub fn request_permissions(&mut self) {
        if self.state == EngineState::Uninitialized {
            self.state = EngineState::PermissionPending;
        }
    }

    /// Sensor access granted, both sample streams are up.
    pub fn activate(&mut self) {
        if self.state == EngineState::PermissionPending {
            self.state = EngineState::Active;
        }
    }

    /// Sensor access refused.
    pub fn deny(&mut self) {
        if self.state == EngineState::PermissionPending {
            self.state = EngineState::Denied;
            self.indicator
                .alert(CompassError::PermissionDenied.guidance());
        }
    }

    /// A peer moved: fetch a fresh self fix and aim the needle at them.
    ///
    /// The self position is re-acquired on every update instead of reusing
    /// the last reported one; under movement the two diverge, an accepted
    /// staleness trade-off. When no fix can be had the update is dropped and
    /// the needle keeps its last angle.
    pub async fn on_peer_update(&mut self, peer: LocationSample) -> Option<f64> {
        if self.state != EngineState::Active {
            debug!(state = ?self.state, "peer update ignored");
            return None;
        }
        let own = match self.location.current_position().await {
            Ok(fix) => fix,
            Err(err) => {
                warn!("dropping peer update, no self fix: {err}");
                return None;
            }
        };
        let bearing = bearing_between(own, peer);
        let heading = self.storage.heading() as f64;
        let angle = relative_angle(bearing, heading);
        debug!(heading, bearing, angle, "needle update");
        self.indicator.rotate_needle(angle);
        self.last_angle = Some(angle);
        Some(angle)
    }

    /// A fresh own fix from the continuous watch: remember it and mirror it
    /// on the readout.
    fn on_own_fix(&mut self, fix: LocationSample) {
        self.storage.update_position(fix);
        self.indicator.show_coordinates(&coordinate_line(fix));
    }
}

/// Connects to the hub and runs the engine's event loop: outbound fixes from
/// the continuous watch, inbound relays from other peers. Each event is
/// handled to completion before the next is dequeued.
pub async fn run_compass<L, I>(
    engine: &mut CompassEngine<'_, L, I>,
    server_addr: &str,
) -> anyhow::Result<()>
where
    L: LocationSource,
    I: Indicator,
{
    let mut fixes = engine.location.fixes();
    let stream = TcpStream::connect(server_addr).await?;
    let mut framed = Framed::new(stream, LinesCodec::new());
    info!(server_addr, "connected to hub");

    loop {
        tokio::select! {
            fix = fixes.recv() => {
                match fix {
                    Ok(fix) => {
                        engine.on_own_fix(fix);
                        framed
                            .send(serde_json::to_string(&WireEvent::update(fix))?)
                            .await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        anyhow::bail!("fix stream ended");
                    }
                }
            }
            line = framed.next() => {
                let Some(line) = line else {
                    anyhow::bail!("hub closed the connection");
                };
                match WireEvent::decode(&line?) {
                    Ok(WireEvent::LocationUpdate { latitude, longitude }) => {
                        engine
                            .on_peer_update(LocationSample::new(latitude, longitude))
                            .await;
                    }
                    Ok(other) => {
                        debug!(?other, "unexpected event from hub, dropped");
                    }
                    Err(err) => {
                        warn!("dropped frame from hub: {err}");
                    }
                }
            }
        }
    }
}
