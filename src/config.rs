use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_PORT;

/// Which halves of the system this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Hub,
    Compass,
    #[default]
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub role: Role,
    /// Hub listen address. The port can be overridden by the `PORT` env var.
    pub listen_addr: String,
    /// Hub address the compass connects to.
    pub server_addr: String,
    pub gpsd_addr: String,
    pub i2c_bus: u8,
    pub log_level: String,
    /// Hex-encoded BNO055 calibration profile, written back by the IMU task.
    pub bno055_calibration: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            role: Role::Both,
            listen_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            server_addr: format!("127.0.0.1:{DEFAULT_PORT}"),
            gpsd_addr: "127.0.0.1:2947".to_owned(),
            i2c_bus: 8,
            log_level: "info".to_owned(),
            bno055_calibration: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write '{path}'")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml_edit::de::Error),

    #[error("failed to parse config")]
    Toml(#[from] toml_edit::TomlError),
}

impl Config {
    /// Loads the config, falling back to defaults when the file is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            toml_edit::de::from_str(&text)?
        } else {
            Config::default()
        };
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            config.listen_addr = replace_port(&config.listen_addr, port);
        }
        Ok(config)
    }
}

/// Rewrites only the calibration key, keeping the rest of the file as the
/// user wrote it.
pub fn save_calibration(path: impl AsRef<Path>, calibration: &str) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let mut doc = if path.exists() {
        std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?
            .parse::<toml_edit::DocumentMut>()?
    } else {
        toml_edit::DocumentMut::new()
    };
    doc["bno055_calibration"] = toml_edit::value(calibration);
    std::fs::write(path, doc.to_string()).map_err(|source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    })
}

fn replace_port(addr: &str, port: u16) -> String {
    match addr.rsplit_once(':') {
        Some((host, _)) => format!("{host}:{port}"),
        None => format!("{addr}:{port}"),
    }
}

pub fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
