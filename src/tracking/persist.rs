//! Persistence collaborator boundary
//!
//! The core never reads or writes a storage format itself. Whatever backs
//! this trait hands over plain records that seed the store at startup and
//! accepts records back for durable keeping.

use std::sync::Mutex;

use anyhow::Result;
use log::info;

use super::store::FleetStore;
use super::types::{Route, Vehicle};

pub trait FleetPersistence: Send + Sync {
    fn load_active_vehicles(&self) -> Result<Vec<Vehicle>>;
    fn load_active_routes(&self) -> Result<Vec<Route>>;
    fn persist_vehicle(&self, vehicle: &Vehicle) -> Result<()>;
    fn persist_route(&self, route: &Route) -> Result<()>;
}

impl FleetStore {
    /// Seed the store from a persistence collaborator
    ///
    /// Routes are registered before vehicles so assignments resolve.
    /// Returns the number of routes and vehicles loaded.
    pub fn seed_from(&self, persistence: &dyn FleetPersistence) -> Result<(usize, usize)> {
        let routes = persistence.load_active_routes()?;
        let vehicles = persistence.load_active_vehicles()?;
        let route_count = routes.len();
        let vehicle_count = vehicles.len();

        for route in routes {
            self.register_route(route)?;
        }
        for vehicle in vehicles {
            self.register_vehicle(vehicle)?;
        }

        info!("seeded {} routes and {} vehicles", route_count, vehicle_count);
        Ok((route_count, vehicle_count))
    }
}

/// Record-keeping in plain memory, for the demo driver and tests
#[derive(Default)]
pub struct InMemoryPersistence {
    vehicles: Mutex<Vec<Vehicle>>,
    routes: Mutex<Vec<Route>>,
}

impl InMemoryPersistence {
    pub fn new(routes: Vec<Route>, vehicles: Vec<Vehicle>) -> Self {
        Self {
            vehicles: Mutex::new(vehicles),
            routes: Mutex::new(routes),
        }
    }
}

impl FleetPersistence for InMemoryPersistence {
    fn load_active_vehicles(&self) -> Result<Vec<Vehicle>> {
        Ok(self.vehicles.lock().expect("vehicle list lock poisoned").clone())
    }

    fn load_active_routes(&self) -> Result<Vec<Route>> {
        Ok(self.routes.lock().expect("route list lock poisoned").clone())
    }

    fn persist_vehicle(&self, vehicle: &Vehicle) -> Result<()> {
        let mut vehicles = self.vehicles.lock().expect("vehicle list lock poisoned");
        match vehicles.iter_mut().find(|v| v.id == vehicle.id) {
            Some(existing) => *existing = vehicle.clone(),
            None => vehicles.push(vehicle.clone()),
        }
        Ok(())
    }

    fn persist_route(&self, route: &Route) -> Result<()> {
        let mut routes = self.routes.lock().expect("route list lock poisoned");
        match routes.iter_mut().find(|r| r.id == route.id) {
            Some(existing) => *existing = route.clone(),
            None => routes.push(route.clone()),
        }
        Ok(())
    }
}
