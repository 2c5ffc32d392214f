//! Standalone fleet tracking module
//!
//! Contains the whole real-time tracking core: state store, geo math,
//! proximity queries, arrival estimation, broadcast routing, and the
//! synthetic motion generator. Everything here runs without a transport or
//! storage backend attached, so the full pipeline can be exercised from
//! tests and the console driver.

mod arrivals;
mod clock;
pub mod demo;
mod error;
mod events;
pub mod geo;
mod persist;
mod query;
mod router;
mod simulator;
mod store;
mod types;

// Re-export public types for external use
// These may not be used within this crate but are part of the public API
#[allow(unused_imports)]
pub use arrivals::{
    ArrivalEstimator, RouteArrivals, StopArrivals, VehicleArrival, DEFAULT_REFERENCE_SPEED_KMH,
};
#[allow(unused_imports)]
pub use clock::{Clock, FixedClock, SystemClock};
#[allow(unused_imports)]
pub use error::TrackError;
#[allow(unused_imports)]
pub use events::{AlertScope, ServiceAlert, Topic, TrackEvent};
#[allow(unused_imports)]
pub use persist::{FleetPersistence, InMemoryPersistence};
#[allow(unused_imports)]
pub use query::{BoundingBox, GeoQuery, METERS_PER_DEGREE_LATITUDE};
#[allow(unused_imports)]
pub use router::{BroadcastRouter, Identity, EVENT_CHANNEL_CAPACITY};
#[allow(unused_imports)]
pub use simulator::{MotionSimulator, SimulatorConfig, SimulatorHandle};
pub use store::FleetStore;
#[allow(unused_imports)]
pub use types::{
    ConnectionId, Facility, FareTable, GeoPoint, Occupancy, OccupancyStatus, OperatingHours, Role,
    Route, RouteId, RouteStatus, Severity, Stop, StopId, Vehicle, VehicleId, VehicleStatus,
    NEARLY_FULL_RATIO, OVERCROWDED_RATIO,
};
