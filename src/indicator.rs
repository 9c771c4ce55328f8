//! The rendering surface the engine talks to.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::protocol::LocationSample;

/// Whatever draws the compass: takes a needle rotation and a coordinate
/// readout, and surfaces user-visible messages.
pub trait Indicator {
    /// Rotate the needle to `degrees`, clockwise from the device top.
    fn rotate_needle(&mut self, degrees: f64);
    fn show_coordinates(&mut self, line: &str);
    /// User-visible message for permission and sensor failures.
    fn alert(&mut self, message: &str);
}

/// Self-position readout shown under the compass.
pub fn coordinate_line(fix: LocationSample) -> String {
    format!(
        "Your Coordinates: {:.4}, {:.4}",
        fix.latitude, fix.longitude
    )
}

/// Indicator for headless runs: everything goes to the log.
#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn rotate_needle(&mut self, degrees: f64) {
        info!(degrees, "needle");
    }

    fn show_coordinates(&mut self, line: &str) {
        info!("{line}");
    }

    fn alert(&mut self, message: &str) {
        warn!("{message}");
    }
}

/// Records every call, for assertions in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingIndicator {
    inner: Arc<Mutex<Recorded>>,
}

#[derive(Debug, Default)]
struct Recorded {
    angles: Vec<f64>,
    coordinate_lines: Vec<String>,
    alerts: Vec<String>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        RecordingIndicator::default()
    }

    pub fn last_angle(&self) -> Option<f64> {
        self.inner.lock().unwrap().angles.last().copied()
    }

    pub fn angles(&self) -> Vec<f64> {
        self.inner.lock().unwrap().angles.clone()
    }

    pub fn coordinate_lines(&self) -> Vec<String> {
        self.inner.lock().unwrap().coordinate_lines.clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.inner.lock().unwrap().alerts.clone()
    }
}

impl Indicator for RecordingIndicator {
    fn rotate_needle(&mut self, degrees: f64) {
        self.inner.lock().unwrap().angles.push(degrees);
    }

    fn show_coordinates(&mut self, line: &str) {
        self.inner
            .lock()
            .unwrap()
            .coordinate_lines
            .push(line.to_owned());
    }

    fn alert(&mut self, message: &str) {
        self.inner.lock().unwrap().alerts.push(message.to_owned());
    }
}
