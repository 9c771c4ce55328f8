use tokio::sync::watch;

use crate::protocol::LocationSample;

/// Live sensor state shared between the acquisition tasks and the engine.
///
/// Heading is a single-writer multi-reader scalar: every orientation sample
/// overwrites it and readers only ever see the latest value. The same goes
/// for the self position, which also feeds the static-map collaborator.
pub struct Storage {
    heading: watch::Sender<f32>,
    position: watch::Sender<Option<LocationSample>>,
}

impl Storage {
    pub fn new() -> Self {
        Storage {
            heading: watch::channel(0.0).0,
            position: watch::channel(None).0,
        }
    }

    pub fn update_heading(&self, alpha: f32) {
        self.heading.send_replace(alpha);
    }

    /// Latest heading sample, degrees in [0, 360).
    pub fn heading(&self) -> f32 {
        *self.heading.borrow()
    }

    pub fn update_position(&self, fix: LocationSample) {
        self.position.send_replace(Some(fix));
    }

    /// Latest self position, if any fix arrived yet.
    pub fn position(&self) -> Option<LocationSample> {
        *self.position.borrow()
    }

    /// Center parameter for the static map, `"lat,lng"`.
    pub fn map_center(&self) -> Option<String> {
        self.position()
            .map(|fix| format!("{},{}", fix.latitude, fix.longitude))
    }
}

impl Default for Storage {
    fn default() -> Self {
        Storage::new()
    }
}
