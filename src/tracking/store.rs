//! Authoritative in-memory fleet state
//!
//! The single place vehicle and route mutations land before any derived
//! computation or broadcast. Writes serialize per identifier: the outer maps
//! are read-locked on every access and only write-locked on registration and
//! removal, while each record sits behind its own mutex so near-simultaneous
//! reports for the same vehicle never interleave and updates to different
//! vehicles proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use log::debug;

use super::clock::Clock;
use super::error::TrackError;
use super::types::{
    GeoPoint, Occupancy, Route, RouteId, RouteStatus, StopId, Vehicle, VehicleId, VehicleStatus,
};

pub struct FleetStore {
    clock: Arc<dyn Clock>,
    vehicles: RwLock<HashMap<VehicleId, Mutex<Vehicle>>>,
    routes: RwLock<HashMap<RouteId, Mutex<Route>>>,
}

impl FleetStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            vehicles: RwLock::new(HashMap::new()),
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Register a vehicle, replacing any existing record with the same id
    ///
    /// The assigned route must already be registered.
    pub fn register_vehicle(&self, vehicle: Vehicle) -> Result<(), TrackError> {
        {
            let routes = self.routes.read().expect("route map lock poisoned");
            if !routes.contains_key(&vehicle.route_id) {
                return Err(TrackError::RouteNotFound(vehicle.route_id.clone()));
            }
        }
        let mut vehicles = self.vehicles.write().expect("vehicle map lock poisoned");
        debug!("registering vehicle {}", vehicle.id);
        vehicles.insert(vehicle.id.clone(), Mutex::new(vehicle));
        Ok(())
    }

    /// Register a route, replacing any existing record with the same id
    ///
    /// The stop sequence arrives pre-sorted by construction; duplicate order
    /// indices are rejected here so the sequence stays unambiguous.
    pub fn register_route(&self, route: Route) -> Result<(), TrackError> {
        for pair in route.stops.windows(2) {
            if pair[0].order == pair[1].order {
                return Err(TrackError::DuplicateStopOrder {
                    route: route.id.clone(),
                    order: pair[0].order,
                });
            }
        }
        let mut routes = self.routes.write().expect("route map lock poisoned");
        debug!("registering route {} with {} stops", route.id, route.stops.len());
        routes.insert(route.id.clone(), Mutex::new(route));
        Ok(())
    }

    /// Record a position report for a vehicle
    ///
    /// The timestamp is the device-reported observation time and only
    /// refreshes the position staleness clock, never the occupancy one.
    pub fn upsert_vehicle_position(
        &self,
        id: &VehicleId,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Vehicle, TrackError> {
        let position = GeoPoint::new(latitude, longitude);
        if !position.is_valid() {
            return Err(TrackError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        self.with_vehicle_mut(id, |vehicle| {
            vehicle.position = position;
            vehicle.position_updated = timestamp;
        })
    }

    /// Record an occupancy report for a vehicle
    ///
    /// Goes through [`Occupancy::apply`] so the derived status is always
    /// recomputed with the new value. An invalid pair leaves the record
    /// exactly as it was.
    pub fn upsert_vehicle_occupancy(
        &self,
        id: &VehicleId,
        occupied: u32,
        total: u32,
    ) -> Result<Vehicle, TrackError> {
        let (occupancy, status) = Occupancy::apply(occupied, total)?;
        let now = self.clock.now();
        self.with_vehicle_mut(id, |vehicle| {
            vehicle.occupancy = occupancy;
            vehicle.occupancy_status = status;
            vehicle.occupancy_updated = now;
        })
    }

    /// Record the live speed and heading reported alongside a position
    ///
    /// Bearing is normalized into [0, 360); negative speeds are floored to
    /// zero.
    pub fn set_vehicle_motion(
        &self,
        id: &VehicleId,
        speed_kmh: f64,
        bearing: f64,
    ) -> Result<Vehicle, TrackError> {
        self.with_vehicle_mut(id, |vehicle| {
            vehicle.speed_kmh = speed_kmh.max(0.0);
            vehicle.bearing = bearing.rem_euclid(360.0);
        })
    }

    pub fn set_vehicle_status(
        &self,
        id: &VehicleId,
        status: VehicleStatus,
    ) -> Result<Vehicle, TrackError> {
        self.with_vehicle_mut(id, |vehicle| {
            vehicle.status = status;
        })
    }

    /// Point a vehicle at its upcoming stop
    ///
    /// The stop must belong to the vehicle's assigned route.
    pub fn set_vehicle_next_stop(
        &self,
        id: &VehicleId,
        next_stop: Option<StopId>,
    ) -> Result<Vehicle, TrackError> {
        if let Some(stop_id) = &next_stop {
            let route_id = self.get_vehicle(id)?.route_id;
            let route = self.get_route(&route_id)?;
            if route.stop(stop_id).is_none() {
                return Err(TrackError::StopNotFound(stop_id.clone()));
            }
        }
        self.with_vehicle_mut(id, |vehicle| {
            vehicle.next_stop = next_stop;
        })
    }

    pub fn get_vehicle(&self, id: &VehicleId) -> Result<Vehicle, TrackError> {
        let vehicles = self.vehicles.read().expect("vehicle map lock poisoned");
        let slot = vehicles
            .get(id)
            .ok_or_else(|| TrackError::VehicleNotFound(id.clone()))?;
        let result = slot.lock().expect("vehicle lock poisoned").clone();
        Ok(result)
    }

    /// Vehicles assigned to a route, optionally filtered by status
    ///
    /// Fails with NotFound when the route itself is unknown, even if no
    /// vehicle references it.
    pub fn list_vehicles_by_route(
        &self,
        route_id: &RouteId,
        status_filter: Option<VehicleStatus>,
    ) -> Result<Vec<Vehicle>, TrackError> {
        {
            let routes = self.routes.read().expect("route map lock poisoned");
            if !routes.contains_key(route_id) {
                return Err(TrackError::RouteNotFound(route_id.clone()));
            }
        }
        Ok(self
            .snapshot_vehicles()
            .into_iter()
            .filter(|v| &v.route_id == route_id)
            .filter(|v| status_filter.map_or(true, |s| v.status == s))
            .collect())
    }

    pub fn get_route(&self, id: &RouteId) -> Result<Route, TrackError> {
        let routes = self.routes.read().expect("route map lock poisoned");
        let slot = routes
            .get(id)
            .ok_or_else(|| TrackError::RouteNotFound(id.clone()))?;
        let result = slot.lock().expect("route lock poisoned").clone();
        Ok(result)
    }

    pub fn list_routes(&self, status_filter: Option<RouteStatus>) -> Vec<Route> {
        self.snapshot_routes()
            .into_iter()
            .filter(|r| status_filter.map_or(true, |s| r.status == s))
            .collect()
    }

    /// Remove a vehicle from the fleet
    ///
    /// Rejected while the vehicle is still assigned to an Active route; the
    /// assignment has to be retired first.
    pub fn remove_vehicle(&self, id: &VehicleId) -> Result<(), TrackError> {
        let route_id = self.get_vehicle(id)?.route_id;
        if let Ok(route) = self.get_route(&route_id) {
            if route.status == RouteStatus::Active {
                return Err(TrackError::VehicleInService(id.clone()));
            }
        }
        let mut vehicles = self.vehicles.write().expect("vehicle map lock poisoned");
        vehicles.remove(id);
        Ok(())
    }

    /// A consistent copy of every vehicle record, sorted by id
    ///
    /// The outer read lock is held for the whole pass, so the vehicle set is
    /// fixed and each record is copied untorn.
    pub fn snapshot_vehicles(&self) -> Vec<Vehicle> {
        let vehicles = self.vehicles.read().expect("vehicle map lock poisoned");
        let mut snapshot: Vec<Vehicle> = vehicles
            .values()
            .map(|slot| slot.lock().expect("vehicle lock poisoned").clone())
            .collect();
        snapshot.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot
    }

    /// A consistent copy of every route record, sorted by id
    pub fn snapshot_routes(&self) -> Vec<Route> {
        let routes = self.routes.read().expect("route map lock poisoned");
        let mut snapshot: Vec<Route> = routes
            .values()
            .map(|slot| slot.lock().expect("route lock poisoned").clone())
            .collect();
        snapshot.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.read().expect("vehicle map lock poisoned").len()
    }

    pub fn route_count(&self) -> usize {
        self.routes.read().expect("route map lock poisoned").len()
    }

    /// Apply a mutation to one vehicle under its own lock
    fn with_vehicle_mut<F>(&self, id: &VehicleId, mutate: F) -> Result<Vehicle, TrackError>
    where
        F: FnOnce(&mut Vehicle),
    {
        let vehicles = self.vehicles.read().expect("vehicle map lock poisoned");
        let slot = vehicles
            .get(id)
            .ok_or_else(|| TrackError::VehicleNotFound(id.clone()))?;
        let mut vehicle = slot.lock().expect("vehicle lock poisoned");
        mutate(&mut vehicle);
        Ok(vehicle.clone())
    }
}
