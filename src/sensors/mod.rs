//! Position and orientation sources.
//!
//! The geolocation source sits behind a trait so tests can script it; the
//! orientation source writes straight into the shared heading cell.

pub mod gpsd;
pub mod imu;
pub mod mock;

use tokio::sync::broadcast;

use crate::error::CompassError;
use crate::protocol::LocationSample;

/// A geolocation source: a continuous fix stream plus an on-demand fresh fix.
#[allow(async_fn_in_trait)]
pub trait LocationSource {
    /// Waits for the next fix, bounded by the source's timeout. Never hands
    /// out a cached fix.
    async fn current_position(&self) -> Result<LocationSample, CompassError>;

    /// Subscribes to the continuous fix stream.
    fn fixes(&self) -> broadcast::Receiver<LocationSample>;
}
