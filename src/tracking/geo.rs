//! Great-circle math for positions in decimal degrees
//!
//! Pure functions with no error cases. Callers are responsible for passing
//! coordinates inside the valid ranges.

use super::types::GeoPoint;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points via the haversine formula
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Initial bearing from one point towards another, normalized into [0, 360)
pub fn bearing_degrees(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let d_lon = (to.longitude - from.longitude).to_radians();
    let from_lat = from.latitude.to_radians();
    let to_lat = to.latitude.to_radians();

    let y = d_lon.sin() * to_lat.cos();
    let x = from_lat.cos() * to_lat.sin() - from_lat.sin() * to_lat.cos() * d_lon.cos();

    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}
