use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CompassError;

/// Connection identifier handed out by the hub at accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// One geographic fix, WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        LocationSample {
            latitude,
            longitude,
        }
    }
}

/// Events on the realtime channel, one JSON object per line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum WireEvent {
    /// client -> server: publish self position
    UpdateLocation { latitude: f64, longitude: f64 },
    /// server -> client: relay of another peer's position
    LocationUpdate { latitude: f64, longitude: f64 },
}

impl WireEvent {
    pub fn update(fix: LocationSample) -> Self {
        WireEvent::UpdateLocation {
            latitude: fix.latitude,
            longitude: fix.longitude,
        }
    }

    pub fn relay(fix: LocationSample) -> Self {
        WireEvent::LocationUpdate {
            latitude: fix.latitude,
            longitude: fix.longitude,
        }
    }

    pub fn decode(line: &str) -> Result<WireEvent, CompassError> {
        serde_json::from_str(line).map_err(|e| CompassError::Channel(e.to_string()))
    }
}
