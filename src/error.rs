use thiserror::Error;

/// Failure taxonomy for sensor acquisition and the realtime channel.
///
/// None of these are fatal to the process. Sensor failures are converted to
/// user-facing guidance at the point of acquisition and never reach the
/// bearing computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompassError {
    /// Access to the positioning or orientation source was refused.
    #[error("geolocation access was refused")]
    PermissionDenied,
    /// The source is reachable but cannot produce a fix.
    #[error("no position fix could be obtained")]
    PositionUnavailable,
    /// No fix arrived within the one-shot bound.
    #[error("timed out waiting for a position fix")]
    Timeout,
    /// Malformed or unexpected frame on the realtime channel. Logged and
    /// dropped, the connection stays open.
    #[error("bad frame on the realtime channel: {0}")]
    Channel(String),
}

impl CompassError {
    /// Guidance text shown to the user next to the compass.
    pub fn guidance(&self) -> &'static str {
        match self {
            CompassError::PermissionDenied => {
                "User denied the request for Geolocation. Enable location access to use the compass."
            }
            CompassError::PositionUnavailable => {
                "Position information is unavailable. Ensure GPS is enabled."
            }
            CompassError::Timeout => "Request to get user location has timed out.",
            CompassError::Channel(_) => "An unknown error occurred.",
        }
    }
}
