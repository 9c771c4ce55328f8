use std::error::Error;
use std::path::Path;

use futures::join;
use static_cell::StaticCell;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use peer_compass::config::{Config, Role};
use peer_compass::engine::{run_compass, CompassEngine};
use peer_compass::hub::{serve, Registry};
use peer_compass::indicator::{Indicator, LogIndicator};
use peer_compass::sensors::gpsd::GpsdSource;
use peer_compass::sensors::imu;
use peer_compass::storage::Storage;

static STORAGE: StaticCell<Storage> = StaticCell::new();
static REGISTRY: StaticCell<Registry> = StaticCell::new();

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "peer-compass.toml".to_owned());
    let config = Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(role = ?config.role, "starting");

    match config.role {
        Role::Hub => handle_hub(&config).await?,
        Role::Compass => handle_compass(&config, &config_path).await?,
        Role::Both => {
            let (hub, compass) = join!(
                handle_hub(&config),
                handle_compass(&config, &config_path)
            );
            hub?;
            compass?;
        }
    }
    Ok(())
}

async fn handle_hub(config: &Config) -> anyhow::Result<()> {
    let registry = REGISTRY.init(Registry::new());
    let listener = TcpListener::bind(&config.listen_addr).await?;
    serve(registry, listener).await
}

async fn handle_compass(config: &Config, config_path: &str) -> anyhow::Result<()> {
    let storage: &'static Storage = STORAGE.init(Storage::new());
    let mut indicator = LogIndicator;

    // Permission gate: the positioning service has to come up before the
    // compass can run. Refusal is terminal until a manual restart.
    let location = match GpsdSource::connect(&config.gpsd_addr, storage).await {
        Ok(location) => location,
        Err(err) => {
            indicator.alert(err.guidance());
            warn!("compass disabled: {err}");
            return Ok(());
        }
    };

    let mut engine = CompassEngine::new(storage, location, indicator);
    engine.request_permissions();
    engine.activate();

    let result = tokio::select! {
        imu = imu::run_imu(storage, config, Path::new(config_path)) => imu,
        net = run_compass(&mut engine, &config.server_addr) => net,
    };
    if let Err(err) = result {
        warn!("compass stopped: {err}");
    }
    Ok(())
}
