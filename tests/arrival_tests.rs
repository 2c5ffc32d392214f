//! Arrival estimation tests

use std::sync::Arc;

use chrono::Duration;
use transit_track::tracking::{
    demo, ArrivalEstimator, FixedClock, FleetStore, GeoPoint, RouteId, Stop, StopId, VehicleId,
    VehicleStatus,
};

fn estimator(clock: FixedClock) -> (Arc<FleetStore>, ArrivalEstimator) {
    let store = Arc::new(FleetStore::new(Arc::new(clock)));
    let seed = demo::demo_persistence(clock.timestamp);
    store.seed_from(&seed).expect("demo fleet should seed");
    let estimator = ArrivalEstimator::new(store.clone(), Arc::new(clock));
    (store, estimator)
}

/// Rebuild route 5K with an extra probe stop at the scenario point
fn add_probe_stop(store: &FleetStore, latitude: f64, longitude: f64) {
    let mut route = store.get_route(&RouteId::new("5K")).unwrap();
    route.stops.insert(Stop {
        id: StopId::new("PROBE"),
        name: "Probe".to_string(),
        position: GeoPoint::new(latitude, longitude),
        order: 99,
        minutes_from_start: 60,
        facilities: Vec::new(),
    });
    store.register_route(route).unwrap();
}

#[test]
fn ten_kilometers_at_reference_speed_is_twenty_minutes() {
    let clock = FixedClock::at_hour(12);
    let (store, estimator) = estimator(clock);
    add_probe_stop(&store, 17.3850, 78.4867);

    // Park the probe vehicle ten kilometers due north of the stop: one
    // degree of latitude is ~111.2 km.
    store
        .upsert_vehicle_position(
            &VehicleId::new("BUS-5K-01"),
            17.3850 + 10.0 / 111.195,
            78.4867,
            clock.timestamp,
        )
        .unwrap();

    let board = estimator.route_arrivals(&RouteId::new("5K")).unwrap();
    let probe = board
        .stops
        .iter()
        .find(|s| s.stop_id.0 == "PROBE")
        .expect("probe stop present");
    let arrival = probe
        .arrivals
        .iter()
        .find(|a| a.vehicle_id.0 == "BUS-5K-01")
        .expect("probe vehicle present");

    assert!((arrival.minutes - 20.0).abs() < 0.1, "got {}", arrival.minutes);
    let delta = arrival.estimated_arrival - clock.timestamp;
    assert!((delta - Duration::minutes(20)).num_seconds().abs() <= 6);
    assert!((arrival.distance_km - 10.0).abs() < 0.05);
}

#[test]
fn arrivals_are_ranked_by_estimated_time() {
    let clock = FixedClock::at_hour(12);
    let (store, estimator) = estimator(clock);

    // BUS-5K-02 sits right at Secunderabad, BUS-5K-01 far down the line
    store
        .upsert_vehicle_position(&VehicleId::new("BUS-5K-01"), 17.3969, 78.4361, clock.timestamp)
        .unwrap();

    let board = estimator.route_arrivals(&RouteId::new("5K")).unwrap();
    let secunderabad = &board.stops[0];
    assert_eq!(secunderabad.stop_id.0, "SEC001");
    assert_eq!(secunderabad.arrivals.len(), 2);
    assert_eq!(secunderabad.arrivals[0].vehicle_id.0, "BUS-5K-02");
    assert!(secunderabad.arrivals[0].minutes <= secunderabad.arrivals[1].minutes);
}

#[test]
fn stops_without_active_vehicles_get_empty_lists() {
    let clock = FixedClock::at_hour(12);
    let (store, estimator) = estimator(clock);

    store
        .set_vehicle_status(&VehicleId::new("BUS-5K-01"), VehicleStatus::Maintenance)
        .unwrap();
    store
        .set_vehicle_status(&VehicleId::new("BUS-5K-02"), VehicleStatus::Inactive)
        .unwrap();

    let board = estimator.route_arrivals(&RouteId::new("5K")).unwrap();
    assert_eq!(board.stops.len(), 6);
    assert!(board.stops.iter().all(|s| s.arrivals.is_empty()));
}

#[test]
fn reference_speed_is_configurable() {
    let clock = FixedClock::at_hour(12);
    let store = Arc::new(FleetStore::new(Arc::new(clock)));
    let seed = demo::demo_persistence(clock.timestamp);
    store.seed_from(&seed).unwrap();

    let fast = ArrivalEstimator::new(store.clone(), Arc::new(clock)).with_reference_speed(60.0);
    let slow = ArrivalEstimator::new(store.clone(), Arc::new(clock));

    let fast_board = fast.route_arrivals(&RouteId::new("216")).unwrap();
    let slow_board = slow.route_arrivals(&RouteId::new("216")).unwrap();

    // Doubling the speed halves every estimate
    for (f, s) in fast_board.stops.iter().zip(slow_board.stops.iter()) {
        for (fa, sa) in f.arrivals.iter().zip(s.arrivals.iter()) {
            assert!((fa.minutes * 2.0 - sa.minutes).abs() < 1e-6);
        }
    }
}
