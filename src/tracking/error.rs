//! Error taxonomy for the tracking core
//!
//! Unauthorized actions and unreachable subscribers are deliberately absent:
//! the router handles both by silent rejection and skip respectively, so
//! neither surfaces as an error.

use thiserror::Error;

use super::types::{RouteId, StopId, VehicleId};

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("vehicle {0} not found")]
    VehicleNotFound(VehicleId),

    #[error("route {0} not found")]
    RouteNotFound(RouteId),

    #[error("stop {0} not found")]
    StopNotFound(StopId),

    #[error("invalid occupancy: {occupied} occupied of {total} seats")]
    InvalidOccupancy { occupied: u32, total: u32 },

    #[error("coordinate out of range: ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("vehicle {0} is assigned to an in-service route")]
    VehicleInService(VehicleId),

    #[error("route {route} has more than one stop with order {order}")]
    DuplicateStopOrder { route: RouteId, order: u32 },
}
