//! Sample fleet used by the demo driver and integration tests
//!
//! Two Hyderabad city routes with a handful of vehicles parked at their
//! first stops.

use chrono::{DateTime, Utc};
use sorted_vec::SortedVec;

use super::persist::InMemoryPersistence;
use super::types::{
    Facility, FareTable, GeoPoint, Occupancy, OperatingHours, Route, RouteId, RouteStatus, Stop,
    StopId, Vehicle, VehicleId, VehicleStatus,
};

fn stop(
    id: &str,
    name: &str,
    latitude: f64,
    longitude: f64,
    order: u32,
    minutes_from_start: u32,
    facilities: &[Facility],
) -> Stop {
    Stop {
        id: StopId::new(id),
        name: name.to_string(),
        position: GeoPoint::new(latitude, longitude),
        order,
        minutes_from_start,
        facilities: facilities.to_vec(),
    }
}

fn route_5k() -> Route {
    use Facility::*;
    let stops = vec![
        stop("SEC001", "Secunderabad Railway Station", 17.4435, 78.5012, 1, 0, &[Shelter, DigitalDisplay, WheelchairAccess, Restroom]),
        stop("PAR001", "Paradise Circle", 17.4326, 78.4926, 2, 8, &[Shelter, Seating]),
        stop("ABI001", "Abids GPO", 17.4011, 78.4744, 3, 18, &[Shelter, DigitalDisplay, Seating]),
        stop("KOT001", "Koti Womens College", 17.3894, 78.4747, 4, 25, &[Shelter, Seating]),
        stop("SUL001", "Sultan Bazaar", 17.3789, 78.4772, 5, 32, &[Shelter]),
        stop("MEH001", "Mehdipatnam Bus Station", 17.3969, 78.4361, 6, 45, &[Shelter, DigitalDisplay, WheelchairAccess, Restroom, Parking]),
    ];
    Route {
        id: RouteId::new("5K"),
        name: "Secunderabad to Mehdipatnam".to_string(),
        number: "5K".to_string(),
        stops: SortedVec::from_unsorted(stops),
        total_distance_km: 18.5,
        scheduled_duration_min: 45,
        operating_hours: OperatingHours::new(5, 30, 23, 0),
        headway_min: 8,
        fare: FareTable {
            adult: 25.0,
            student: 12.0,
            senior: 12.0,
        },
        status: RouteStatus::Active,
        color: "#e74c3c".to_string(),
    }
}

fn route_216() -> Route {
    use Facility::*;
    let stops = vec![
        stop("JUB001", "Jubilee Hills Check Post", 17.4239, 78.4138, 1, 0, &[Shelter, Seating]),
        stop("BAN001", "Banjara Hills Road No. 1", 17.4126, 78.4398, 2, 12, &[Shelter, DigitalDisplay]),
        stop("PUN001", "Punjagutta Metro Station", 17.4239, 78.4482, 3, 20, &[Shelter, DigitalDisplay, WheelchairAccess]),
        stop("AME001", "Ameerpet Metro Station", 17.4374, 78.4482, 4, 28, &[Shelter, DigitalDisplay, WheelchairAccess, Restroom]),
        stop("DIL001", "Dilsukhnagar", 17.3681, 78.5242, 5, 50, &[Shelter, Seating]),
        stop("LBN001", "LB Nagar Metro Station", 17.3497, 78.5503, 6, 62, &[Shelter, DigitalDisplay, WheelchairAccess, Parking]),
    ];
    Route {
        id: RouteId::new("216"),
        name: "Jubilee Hills to LB Nagar".to_string(),
        number: "216".to_string(),
        stops: SortedVec::from_unsorted(stops),
        total_distance_km: 24.0,
        scheduled_duration_min: 62,
        operating_hours: OperatingHours::new(6, 0, 22, 30),
        headway_min: 12,
        fare: FareTable {
            adult: 30.0,
            student: 15.0,
            senior: 15.0,
        },
        status: RouteStatus::Active,
        color: "#2980b9".to_string(),
    }
}

fn vehicle(
    id: &str,
    route: &Route,
    total_seats: u32,
    occupied_seats: u32,
    timestamp: DateTime<Utc>,
) -> Vehicle {
    // Parked at the route's first stop with a plausible starting load.
    let position = route
        .stops
        .first()
        .map(|s| s.position)
        .unwrap_or(GeoPoint::new(0.0, 0.0));
    let occupancy = Occupancy {
        total_seats,
        occupied_seats,
    };
    Vehicle {
        id: VehicleId::new(id),
        route_id: route.id.clone(),
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

/// The demo routes and vehicles
pub fn demo_fleet(timestamp: DateTime<Utc>) -> (Vec<Route>, Vec<Vehicle>) {
    let r5k = route_5k();
    let r216 = route_216();
    let vehicles = vec![
        vehicle("BUS-5K-01", &r5k, 40, 12, timestamp),
        vehicle("BUS-5K-02", &r5k, 40, 30, timestamp),
        vehicle("BUS-216-01", &r216, 52, 8, timestamp),
        vehicle("BUS-216-02", &r216, 52, 45, timestamp),
    ];
    (vec![r5k, r216], vehicles)
}

/// An in-memory persistence collaborator pre-loaded with the demo fleet
pub fn demo_persistence(timestamp: DateTime<Utc>) -> InMemoryPersistence {
    let (routes, vehicles) = demo_fleet(timestamp);
    InMemoryPersistence::new(routes, vehicles)
}
