//! Geospatial proximity queries over the fleet
//!
//! "Nearby" is an axis-aligned bounding box derived from the radius, not a
//! true geodesic circle. The approximation holds up to a few tens of
//! kilometers away from the poles, and it is kept behind this interface so
//! an index-backed exact circle query can replace it without touching
//! callers.

use std::sync::Arc;

use super::store::FleetStore;
use super::types::{GeoPoint, Route, RouteStatus, Vehicle, VehicleStatus};

/// Approximate meters per degree of latitude
pub const METERS_PER_DEGREE_LATITUDE: f64 = 111_000.0;

/// An axis-aligned latitude/longitude rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    /// The box spanning `radius_m` meters around a center point
    ///
    /// The longitude delta is widened by 1/cos(latitude) to compensate for
    /// meridian convergence.
    pub fn from_radius(latitude: f64, longitude: f64, radius_m: f64) -> Self {
        let lat_delta = radius_m / METERS_PER_DEGREE_LATITUDE;
        let lon_delta = radius_m / (METERS_PER_DEGREE_LATITUDE * latitude.to_radians().cos());
        Self {
            min_latitude: latitude - lat_delta,
            max_latitude: latitude + lat_delta,
            min_longitude: longitude - lon_delta,
            max_longitude: longitude + lon_delta,
        }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&point.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&point.longitude)
    }
}

/// Read-only proximity queries against a fleet store
pub struct GeoQuery {
    store: Arc<FleetStore>,
}

impl GeoQuery {
    pub fn new(store: Arc<FleetStore>) -> Self {
        Self { store }
    }

    /// Active vehicles whose position falls inside the search box
    ///
    /// Evaluates one store snapshot per call. Returns an empty vector when
    /// nothing matches.
    pub fn nearby_vehicles(&self, latitude: f64, longitude: f64, radius_m: f64) -> Vec<Vehicle> {
        let bbox = BoundingBox::from_radius(latitude, longitude, radius_m);
        self.store
            .snapshot_vehicles()
            .into_iter()
            .filter(|v| v.status == VehicleStatus::Active && bbox.contains(&v.position))
            .collect()
    }

    /// Active routes with at least one stop inside the search box
    pub fn routes_near_area(&self, latitude: f64, longitude: f64, radius_m: f64) -> Vec<Route> {
        let bbox = BoundingBox::from_radius(latitude, longitude, radius_m);
        self.store
            .snapshot_routes()
            .into_iter()
            .filter(|r| r.status == RouteStatus::Active)
            .filter(|r| r.stops.iter().any(|stop| bbox.contains(&stop.position)))
            .collect()
    }
}
