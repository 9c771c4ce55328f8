//! Geolocation over a gpsd daemon.

use std::time::Duration;

use futures::prelude::*;
use gpsd_proto::UnifiedResponse;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, warn};

use super::LocationSource;
use crate::error::CompassError;
use crate::protocol::LocationSample;
use crate::storage::Storage;

/// One-shot fix requests resolve or fail within this bound.
pub const FIX_TIMEOUT: Duration = Duration::from_secs(30);

/// Continuous fix stream from gpsd.
///
/// A background task watches the daemon and broadcasts every 2D-or-better
/// fix. One-shot requests subscribe and wait for the *next* fix, so a stale
/// position is never handed out.
pub struct GpsdSource {
    fixes: broadcast::Sender<LocationSample>,
}

impl GpsdSource {
    /// Connects to gpsd and starts watching. A refused connection means the
    /// positioning service is not accessible to this process.
    pub async fn connect(addr: &str, storage: &'static Storage) -> Result<GpsdSource, CompassError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|_| CompassError::PermissionDenied)?;
        let (fixes, _) = broadcast::channel(16);
        let source = GpsdSource {
            fixes: fixes.clone(),
        };
        tokio::spawn(async move {
            if let Err(err) = watch_gpsd(stream, fixes, storage).await {
                warn!("gpsd watch ended: {err}");
            }
        });
        Ok(source)
    }
}

async fn watch_gpsd(
    stream: TcpStream,
    fixes: broadcast::Sender<LocationSample>,
    storage: &'static Storage,
) -> anyhow::Result<()> {
    let mut framed: Framed<TcpStream, LinesCodec> = Framed::new(stream, LinesCodec::new());
    framed.send(gpsd_proto::ENABLE_WATCH_CMD).await?;
    while let Some(line) = framed.next().await {
        let line = line?;
        match serde_json::from_str(&line) {
            Ok(UnifiedResponse::Tpv(tpv)) => {
                if matches!(tpv.mode, gpsd_proto::Mode::NoFix) {
                    continue;
                }
                let (Some(lat), Some(lon)) = (tpv.lat, tpv.lon) else {
                    continue;
                };
                let fix = LocationSample::new(lat, lon);
                storage.update_position(fix);
                // no subscriber yet is fine
                let _ = fixes.send(fix);
            }
            Ok(_) => {}
            Err(err) => debug!("ignoring gpsd line: {err}"),
        }
    }
    Ok(())
}

impl LocationSource for GpsdSource {
    async fn current_position(&self) -> Result<LocationSample, CompassError> {
        let mut fixes = self.fixes.subscribe();
        let next = async {
            loop {
                match fixes.recv().await {
                    Ok(fix) => return Ok(fix),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(CompassError::PositionUnavailable)
                    }
                }
            }
        };
        match timeout(FIX_TIMEOUT, next).await {
            Ok(result) => result,
            Err(_) => Err(CompassError::Timeout),
        }
    }

    fn fixes(&self) -> broadcast::Receiver<LocationSample> {
        self.fixes.subscribe()
    }
}
