//! Scripted sources for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::LocationSource;
use crate::error::CompassError;
use crate::protocol::LocationSample;

/// Location source driven by the test: one-shot responses are scripted,
/// continuous fixes are pushed by hand. Clones share the same script.
#[derive(Clone)]
pub struct MockLocationSource {
    fixes: broadcast::Sender<LocationSample>,
    responses: Arc<Mutex<VecDeque<Result<LocationSample, CompassError>>>>,
    fallback: Option<LocationSample>,
}

impl MockLocationSource {
    pub fn new() -> Self {
        let (fixes, _) = broadcast::channel(16);
        MockLocationSource {
            fixes,
            responses: Arc::new(Mutex::new(VecDeque::new())),
            fallback: None,
        }
    }

    /// Source whose one-shot requests always resolve at `fix`.
    pub fn fixed_at(fix: LocationSample) -> Self {
        let mut source = MockLocationSource::new();
        source.fallback = Some(fix);
        source
    }

    /// Queues the outcome of the next one-shot request.
    pub fn script(&self, response: Result<LocationSample, CompassError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Emits a fix on the continuous stream.
    pub fn push_fix(&self, fix: LocationSample) {
        let _ = self.fixes.send(fix);
    }
}

impl Default for MockLocationSource {
    fn default() -> Self {
        MockLocationSource::new()
    }
}

impl LocationSource for MockLocationSource {
    async fn current_position(&self) -> Result<LocationSample, CompassError> {
        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return response;
        }
        self.fallback.ok_or(CompassError::PositionUnavailable)
    }

    fn fixes(&self) -> broadcast::Receiver<LocationSample> {
        self.fixes.subscribe()
    }
}
