//! Great-circle bearing math.

use crate::protocol::LocationSample;

/// Initial great-circle bearing from point 1 to point 2, degrees in [0, 360).
///
/// Standard spherical formula; for identical points `atan2(0, 0)` yields 0,
/// which is the wanted degenerate result.
pub fn initial_bearing(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lng = (lng2 - lng1).to_radians();
    let y = d_lng.sin() * lat2.to_radians().cos();
    let x = lat1.to_radians().cos() * lat2.to_radians().sin()
        - lat1.to_radians().sin() * lat2.to_radians().cos() * d_lng.cos();
    normalize_degrees(y.atan2(x).to_degrees())
}

pub fn bearing_between(own: LocationSample, peer: LocationSample) -> f64 {
    initial_bearing(own.latitude, own.longitude, peer.latitude, peer.longitude)
}

/// Needle rotation that points a device facing `heading` toward `bearing`.
pub fn relative_angle(bearing: f64, heading: f64) -> f64 {
    normalize_degrees(bearing - heading)
}

/// Wraps any angle into [0, 360).
pub fn normalize_degrees(deg: f64) -> f64 {
    (deg % 360.0 + 360.0) % 360.0
}
