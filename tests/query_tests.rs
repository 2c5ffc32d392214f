//! Geo math and proximity query tests

use std::sync::Arc;

use transit_track::tracking::{
    demo, geo, BoundingBox, FixedClock, FleetStore, GeoPoint, GeoQuery, VehicleId, VehicleStatus,
};

fn seeded_query(clock: FixedClock) -> (Arc<FleetStore>, GeoQuery) {
    let store = Arc::new(FleetStore::new(Arc::new(clock)));
    let seed = demo::demo_persistence(clock.timestamp);
    store.seed_from(&seed).expect("demo fleet should seed");
    let query = GeoQuery::new(store.clone());
    (store, query)
}

#[test]
fn distance_is_zero_between_identical_points() {
    let p = GeoPoint::new(17.4435, 78.5012);
    assert!(geo::distance_km(&p, &p).abs() < 1e-9);
}

#[test]
fn distance_matches_known_city_pair() {
    // Secunderabad station to Paradise Circle is roughly 1.5 km
    let secunderabad = GeoPoint::new(17.4435, 78.5012);
    let paradise = GeoPoint::new(17.4326, 78.4926);
    let distance = geo::distance_km(&secunderabad, &paradise);
    assert!((1.3..1.8).contains(&distance), "got {}", distance);

    // And it is symmetric
    let reverse = geo::distance_km(&paradise, &secunderabad);
    assert!((distance - reverse).abs() < 1e-9);
}

#[test]
fn bearing_is_normalized_to_compass_degrees() {
    let origin = GeoPoint::new(17.4, 78.5);

    let north = geo::bearing_degrees(&origin, &GeoPoint::new(17.5, 78.5));
    assert!(north.abs() < 1.0, "due north should be ~0, got {}", north);

    let east = geo::bearing_degrees(&origin, &GeoPoint::new(17.4, 78.6));
    assert!((east - 90.0).abs() < 1.0, "due east should be ~90, got {}", east);

    let west = geo::bearing_degrees(&origin, &GeoPoint::new(17.4, 78.4));
    assert!((west - 270.0).abs() < 1.0, "due west should be ~270, got {}", west);
}

#[test]
fn bounding_box_widens_longitude_with_latitude() {
    let bbox = BoundingBox::from_radius(17.4, 78.5, 5000.0);
    let lat_span = bbox.max_latitude - bbox.min_latitude;
    let lon_span = bbox.max_longitude - bbox.min_longitude;
    // Away from the equator a degree of longitude is shorter, so the box
    // must span more of them.
    assert!(lon_span > lat_span);

    assert!(bbox.contains(&GeoPoint::new(17.4, 78.5)));
    assert!(!bbox.contains(&GeoPoint::new(17.5, 78.5)));
}

#[test]
fn nearby_vehicles_returns_only_active_in_box() {
    let (store, query) = seeded_query(FixedClock::at_hour(12));
    // All demo vehicles start at their route's first stop; search around
    // Secunderabad station where the 5K pair sits.
    let found = query.nearby_vehicles(17.4435, 78.5012, 2000.0);
    let ids: Vec<String> = found.iter().map(|v| v.id.0.clone()).collect();
    assert_eq!(ids, vec!["BUS-5K-01", "BUS-5K-02"]);

    // Knock one out of service and it disappears from the result
    store
        .set_vehicle_status(&VehicleId::new("BUS-5K-01"), VehicleStatus::OutOfService)
        .unwrap();
    let found = query.nearby_vehicles(17.4435, 78.5012, 2000.0);
    assert_eq!(found.len(), 1);
    assert!(found.iter().all(|v| v.status == VehicleStatus::Active));
}

#[test]
fn nearby_vehicles_is_empty_when_nothing_matches() {
    let (_, query) = seeded_query(FixedClock::at_hour(12));
    // Middle of the Bay of Bengal
    let found = query.nearby_vehicles(15.0, 85.0, 5000.0);
    assert!(found.is_empty());
}

#[test]
fn routes_near_area_matches_any_stop() {
    let (_, query) = seeded_query(FixedClock::at_hour(12));

    // Dilsukhnagar is a mid-route stop on route 216 only
    let found = query.routes_near_area(17.3681, 78.5242, 1000.0);
    let ids: Vec<String> = found.iter().map(|r| r.id.0.clone()).collect();
    assert_eq!(ids, vec!["216"]);

    // A central search radius wide enough catches both demo routes
    let found = query.routes_near_area(17.40, 78.47, 5000.0);
    assert_eq!(found.len(), 2);
}
