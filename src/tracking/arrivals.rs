//! Per-stop arrival estimation for a route's active vehicles
//!
//! Deliberately simple: straight-line distance at a constant reference
//! speed. A stronger estimator may substitute live speed and path-following
//! distance without changing the stop-to-ranked-arrivals contract.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ordered_float::OrderedFloat;

use super::clock::Clock;
use super::error::TrackError;
use super::geo;
use super::store::FleetStore;
use super::types::{GeoPoint, Route, RouteId, StopId, Vehicle, VehicleId, VehicleStatus};

/// Assumed travel speed for estimation, in km/h
///
/// A policy value, not physics. Typical city bus average, configurable per
/// estimator instance.
pub const DEFAULT_REFERENCE_SPEED_KMH: f64 = 30.0;

/// One predicted arrival of a vehicle at a stop
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleArrival {
    pub vehicle_id: VehicleId,
    /// Straight-line distance to the stop, rounded to two decimals
    pub distance_km: f64,
    pub minutes: f64,
    pub estimated_arrival: DateTime<Utc>,
}

/// Ranked arrivals for a single stop
#[derive(Debug, Clone, PartialEq)]
pub struct StopArrivals {
    pub stop_id: StopId,
    pub stop_name: String,
    pub position: GeoPoint,
    /// Sorted ascending by estimated arrival, ties keep input order
    pub arrivals: Vec<VehicleArrival>,
}

/// Arrival board for a whole route
#[derive(Debug, Clone, PartialEq)]
pub struct RouteArrivals {
    pub route_id: RouteId,
    pub route_name: String,
    pub route_number: String,
    pub stops: Vec<StopArrivals>,
}

pub struct ArrivalEstimator {
    store: Arc<FleetStore>,
    clock: Arc<dyn Clock>,
    reference_speed_kmh: f64,
}

impl ArrivalEstimator {
    pub fn new(store: Arc<FleetStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            reference_speed_kmh: DEFAULT_REFERENCE_SPEED_KMH,
        }
    }

    pub fn with_reference_speed(mut self, speed_kmh: f64) -> Self {
        self.reference_speed_kmh = speed_kmh;
        self
    }

    /// The arrival board for a route, using its currently Active vehicles
    pub fn route_arrivals(&self, route_id: &RouteId) -> Result<RouteArrivals, TrackError> {
        let route = self.store.get_route(route_id)?;
        let vehicles = self
            .store
            .list_vehicles_by_route(route_id, Some(VehicleStatus::Active))?;
        Ok(self.estimate(&route, &vehicles, self.clock.now()))
    }

    /// Estimate arrivals for the given route and vehicle set at `now`
    ///
    /// Stops with no vehicles produce an empty list, not an error.
    pub fn estimate(&self, route: &Route, vehicles: &[Vehicle], now: DateTime<Utc>) -> RouteArrivals {
        let stops = route
            .stops
            .iter()
            .map(|stop| {
                let mut arrivals: Vec<VehicleArrival> = vehicles
                    .iter()
                    .map(|vehicle| self.arrival_for(vehicle, &stop.position, now))
                    .collect();
                arrivals.sort_by_key(|a| OrderedFloat(a.minutes));
                StopArrivals {
                    stop_id: stop.id.clone(),
                    stop_name: stop.name.clone(),
                    position: stop.position,
                    arrivals,
                }
            })
            .collect();

        RouteArrivals {
            route_id: route.id.clone(),
            route_name: route.name.clone(),
            route_number: route.number.clone(),
            stops,
        }
    }

    fn arrival_for(&self, vehicle: &Vehicle, stop: &GeoPoint, now: DateTime<Utc>) -> VehicleArrival {
        let distance = geo::distance_km(&vehicle.position, stop);
        let minutes = distance / self.reference_speed_kmh * 60.0;
        VehicleArrival {
            vehicle_id: vehicle.id.clone(),
            distance_km: (distance * 100.0).round() / 100.0,
            minutes,
            estimated_arrival: now + Duration::milliseconds((minutes * 60_000.0) as i64),
        }
    }
}
