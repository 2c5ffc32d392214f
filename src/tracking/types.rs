//! Core types for the fleet tracking engine
//!
//! Standalone data records shared by the store, the query engine, the
//! estimator, the router, and the simulator.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use sorted_vec::SortedVec;

use super::error::TrackError;
use super::geo;

/// Occupancy ratio below which a vehicle counts as Available
pub const NEARLY_FULL_RATIO: f64 = 0.70;
/// Occupancy ratio at or above which a vehicle counts as Overcrowded
pub const OVERCROWDED_RATIO: f64 = 0.90;

/// A unique identifier for a vehicle (e.g. "BUS-5K-01")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub String);

/// A unique identifier for a route (e.g. "5K")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(pub String);

/// A unique identifier for a stop within the installation (e.g. "SEC001")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StopId(pub String);

/// A unique identifier for a live connection, assigned by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl RouteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl StopId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A position on the Earth's surface in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are inside the valid coordinate ranges
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Derived passenger-load classification for a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyStatus {
    Available,
    NearlyFull,
    Overcrowded,
}

impl fmt::Display for OccupancyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OccupancyStatus::Available => "Available",
            OccupancyStatus::NearlyFull => "Nearly Full",
            OccupancyStatus::Overcrowded => "Overcrowded",
        };
        write!(f, "{}", label)
    }
}

/// Seat occupancy for a vehicle
///
/// Invariant: `occupied_seats <= total_seats` and `total_seats >= 1`. Both
/// are enforced by [`Occupancy::apply`], the single transition function every
/// occupancy mutation goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    pub total_seats: u32,
    pub occupied_seats: u32,
}

impl Occupancy {
    /// Validate a new occupancy value and derive its status in one step
    ///
    /// Returns the new occupancy together with the status derived from its
    /// ratio, or an error leaving the caller's state untouched.
    pub fn apply(occupied: u32, total: u32) -> Result<(Occupancy, OccupancyStatus), TrackError> {
        if total < 1 || occupied > total {
            return Err(TrackError::InvalidOccupancy { occupied, total });
        }
        let occupancy = Occupancy {
            total_seats: total,
            occupied_seats: occupied,
        };
        Ok((occupancy, occupancy.status()))
    }

    /// Status derived from the current ratio
    pub fn status(&self) -> OccupancyStatus {
        let ratio = self.ratio();
        if ratio < NEARLY_FULL_RATIO {
            OccupancyStatus::Available
        } else if ratio < OVERCROWDED_RATIO {
            OccupancyStatus::NearlyFull
        } else {
            OccupancyStatus::Overcrowded
        }
    }

    pub fn ratio(&self) -> f64 {
        self.occupied_seats as f64 / self.total_seats as f64
    }

    /// Occupancy as a rounded percentage
    pub fn percentage(&self) -> u32 {
        (self.ratio() * 100.0).round() as u32
    }

    pub fn available_seats(&self) -> u32 {
        self.total_seats - self.occupied_seats
    }
}

/// Operational status of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleStatus {
    Active,
    Inactive,
    Maintenance,
    OutOfService,
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VehicleStatus::Active => "Active",
            VehicleStatus::Inactive => "Inactive",
            VehicleStatus::Maintenance => "Maintenance",
            VehicleStatus::OutOfService => "Out of Service",
        };
        write!(f, "{}", label)
    }
}

/// Operational status of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStatus {
    Active,
    Inactive,
    Maintenance,
    Seasonal,
}

/// Role attached to an authenticated connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Passenger,
    Driver,
    Operator,
    Admin,
}

/// Severity of a service alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Success,
}

/// A vehicle in the fleet
///
/// Position and occupancy carry independent last-updated stamps so the
/// staleness of one reading never masks the staleness of the other.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub route_id: RouteId,
    pub position: GeoPoint,
    pub position_updated: DateTime<Utc>,
    pub occupancy: Occupancy,
    pub occupancy_status: OccupancyStatus,
    pub occupancy_updated: DateTime<Utc>,
    pub status: VehicleStatus,
    pub speed_kmh: f64,
    pub bearing: f64,
    pub next_stop: Option<StopId>,
}

impl Vehicle {
    /// Create an active vehicle with an empty load at the given position
    pub fn new(
        id: VehicleId,
        route_id: RouteId,
        position: GeoPoint,
        total_seats: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let occupancy = Occupancy {
            total_seats,
            occupied_seats: 0,
        };
        Self {
            id,
            route_id,
            position,
            position_updated: timestamp,
            occupancy_status: occupancy.status(),
            occupancy,
            occupancy_updated: timestamp,
            status: VehicleStatus::Active,
            speed_kmh: 0.0,
            bearing: 0.0,
            next_stop: None,
        }
    }
}

/// Passenger amenities available at a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facility {
    Shelter,
    Seating,
    DigitalDisplay,
    WheelchairAccess,
    Restroom,
    Parking,
}

/// A stop on a route
///
/// Ordered by its order index (ties broken by id) so a route's stop sequence
/// stays sorted ascending inside a `SortedVec`.
#[derive(Debug, Clone)]
pub struct Stop {
    pub id: StopId,
    pub name: String,
    pub position: GeoPoint,
    pub order: u32,
    pub minutes_from_start: u32,
    pub facilities: Vec<Facility>,
}

impl PartialEq for Stop {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order && self.id == other.id
    }
}

impl Eq for Stop {}

impl PartialOrd for Stop {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stop {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order
            .cmp(&other.order)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Daily service window, in minutes from midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingHours {
    pub start_minute: u32,
    pub end_minute: u32,
}

impl OperatingHours {
    pub fn new(start_hour: u32, start_minute: u32, end_hour: u32, end_minute: u32) -> Self {
        Self {
            start_minute: start_hour * 60 + start_minute,
            end_minute: end_hour * 60 + end_minute,
        }
    }

    /// Whether the given minute of day falls inside the window
    ///
    /// Windows that cross midnight wrap around.
    pub fn contains(&self, minute_of_day: u32) -> bool {
        if self.start_minute <= self.end_minute {
            (self.start_minute..=self.end_minute).contains(&minute_of_day)
        } else {
            minute_of_day >= self.start_minute || minute_of_day <= self.end_minute
        }
    }
}

/// Fares charged on a route, by passenger category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareTable {
    pub adult: f64,
    pub student: f64,
    pub senior: f64,
}

/// A fixed route served by the fleet
#[derive(Debug, Clone)]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    pub number: String,
    /// Stop sequence, always sorted ascending by order index
    pub stops: SortedVec<Stop>,
    pub total_distance_km: f64,
    pub scheduled_duration_min: u32,
    pub operating_hours: OperatingHours,
    pub headway_min: u32,
    pub fare: FareTable,
    pub status: RouteStatus,
    pub color: String,
}

impl Route {
    /// The stop after the given order index, wrapping to the first stop
    ///
    /// Routes are circular for estimation purposes, so the stop after the
    /// last is the first. Returns None only when the route has no stops.
    pub fn next_stop_after(&self, order: u32) -> Option<&Stop> {
        self.stops
            .iter()
            .find(|stop| stop.order > order)
            .or_else(|| self.stops.first())
    }

    /// The stop closest to the given position by great-circle distance
    pub fn nearest_stop(&self, position: &GeoPoint) -> Option<&Stop> {
        self.stops
            .iter()
            .min_by_key(|stop| OrderedFloat(geo::distance_km(position, &stop.position)))
    }

    pub fn stop(&self, id: &StopId) -> Option<&Stop> {
        self.stops.iter().find(|stop| &stop.id == id)
    }

    pub fn total_stops(&self) -> usize {
        self.stops.len()
    }

    /// Average scheduled speed over the whole route in km/h
    pub fn average_speed_kmh(&self) -> f64 {
        if self.scheduled_duration_min == 0 {
            return 0.0;
        }
        self.total_distance_km / (self.scheduled_duration_min as f64 / 60.0)
    }
}
