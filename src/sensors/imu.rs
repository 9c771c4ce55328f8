//! BNO055 absolute-orientation source.

use std::path::Path;
use std::time::Duration;

use bno055::{BNO055Calibration, BNO055OperationMode, Bno055, BNO055_CALIB_SIZE};
use nalgebra::UnitQuaternion;
use rppal::i2c::I2c;
use tracing::debug;

use crate::config::{self, hex_decode, hex_encode, Config};
use crate::magnetic;
use crate::storage::Storage;

/// Compass alpha in [0, 360) from the fusion quaternion, with the local
/// magnetic declination rotated in about the device z-axis.
pub fn alpha_from_quaternion(quat: mint::Quaternion<f32>, declination_deg: f32) -> f32 {
    let quat = UnitQuaternion::new_normalize(nalgebra::Quaternion::new(
        quat.s, quat.v.x, quat.v.y, quat.v.z,
    ));
    let correction = UnitQuaternion::from_axis_angle(
        &nalgebra::Vector3::z_axis(),
        declination_deg.to_radians(),
    );
    let (_roll, _pitch, yaw) = (quat * correction).euler_angles();
    (yaw.to_degrees() % 360.0 + 360.0) % 360.0
}

fn imu_error<E: std::fmt::Debug>(err: bno055::Error<E>) -> anyhow::Error {
    anyhow::anyhow!("imu: {err:?}")
}

fn calibration_from_hex(blob: &str) -> Option<BNO055Calibration> {
    let bytes = hex_decode(blob)?;
    let mut buf = [0u8; BNO055_CALIB_SIZE];
    let len = bytes.len().min(BNO055_CALIB_SIZE);
    buf[..len].copy_from_slice(&bytes[..len]);
    Some(BNO055Calibration::from_buf(&buf))
}

/// Samples the IMU at 1 Hz and overwrites the shared heading cell. The most
/// recent sample always wins, there is no smoothing. Calibration profile
/// changes are written back to the config file.
pub async fn run_imu(
    storage: &'static Storage,
    config: &Config,
    config_path: &Path,
) -> anyhow::Result<()> {
    let i2c = I2c::with_bus(config.i2c_bus)?;
    let mut delay = linux_embedded_hal::Delay;
    let mut imu = Bno055::new(i2c);

    imu.init(&mut delay).map_err(imu_error)?;
    // 9-degrees-of-freedom fusion with fast magnetometer calibration
    imu.set_mode(BNO055OperationMode::NDOF, &mut delay)
        .map_err(imu_error)?;

    if let Some(calib) = config
        .bno055_calibration
        .as_deref()
        .and_then(calibration_from_hex)
    {
        imu.set_calibration_profile(calib, &mut delay)
            .map_err(imu_error)?;
    }
    let mut last_calib = config.bno055_calibration.clone().unwrap_or_default();

    loop {
        let quat = imu.quaternion().map_err(imu_error)?;
        let declination = magnetic::current_declination(storage.position());
        storage.update_heading(alpha_from_quaternion(quat, declination));

        let calib = imu.calibration_profile(&mut delay).map_err(imu_error)?;
        let calib_hex = hex_encode(calib.as_bytes());
        if calib_hex != last_calib {
            debug!("storing updated calibration profile");
            config::save_calibration(config_path, &calib_hex)?;
            last_calib = calib_hex;
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quat_about_z(degrees: f32) -> mint::Quaternion<f32> {
        let half = (degrees / 2.0).to_radians();
        mint::Quaternion {
            s: half.cos(),
            v: mint::Vector3 {
                x: 0.0,
                y: 0.0,
                z: half.sin(),
            },
        }
    }

    #[test]
    fn identity_quaternion_points_north() {
        let alpha = alpha_from_quaternion(quat_about_z(0.0), 0.0);
        assert!(alpha.abs() < 1e-4, "got {alpha}");
    }

    #[test]
    fn rotation_about_z_is_the_alpha() {
        let alpha = alpha_from_quaternion(quat_about_z(90.0), 0.0);
        assert!((alpha - 90.0).abs() < 1e-3, "got {alpha}");
    }

    #[test]
    fn negative_yaw_wraps_into_range() {
        let alpha = alpha_from_quaternion(quat_about_z(-90.0), 0.0);
        assert!((alpha - 270.0).abs() < 1e-3, "got {alpha}");
    }

    #[test]
    fn declination_shifts_the_alpha() {
        let alpha = alpha_from_quaternion(quat_about_z(0.0), 10.0);
        assert!((alpha - 10.0).abs() < 1e-3, "got {alpha}");
    }

    #[test]
    fn short_calibration_blob_is_padded() {
        assert!(calibration_from_hex("0a0b").is_some());
        assert!(calibration_from_hex("xx").is_none());
    }
}
