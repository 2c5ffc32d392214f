//! Synthetic motion generator
//!
//! Drives each active vehicle from its own task on its own staggered
//! schedule, so updates are never synchronized across vehicles. Every
//! mutation goes through the store and the router via a driver-role
//! connection, the exact path a live GPS report takes.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::clock::Clock;
use super::error::TrackError;
use super::events::AlertScope;
use super::geo;
use super::router::{BroadcastRouter, Identity};
use super::store::FleetStore;
use super::types::{ConnectionId, GeoPoint, Occupancy, Role, Severity, VehicleId, VehicleStatus};

/// Canned disruption notices the alert task picks from
const ALERT_CATALOG: &[(&str, &str, Severity)] = &[
    ("delay", "Bus running 10 minutes late due to traffic", Severity::Warning),
    ("breakdown", "Bus temporarily out of service - mechanical issue", Severity::Error),
    ("route_change", "Route diverted due to road construction", Severity::Info),
    ("overcrowding", "Bus is overcrowded - next bus in 5 minutes", Severity::Warning),
    ("service_update", "Additional bus added to route due to high demand", Severity::Success),
];

/// Tuning knobs for the simulator
///
/// The rush, night, and perturbation constants are policy inherited from
/// observed city traffic patterns, kept configurable rather than baked in.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Base delay between updates for every vehicle
    pub base_interval: Duration,
    /// Upper bound of the per-vehicle random stagger added to the base
    pub max_stagger: Duration,
    /// Largest fraction of the remaining vector to the target stop covered
    /// in one update
    pub move_fraction_max: f64,
    /// Full spread of the random positional jitter, in degrees
    pub position_jitter_degrees: f64,
    /// Chance per update that the passenger count changes
    pub occupancy_change_probability: f64,
    pub occupancy_delta_min: i32,
    pub occupancy_delta_max: i32,
    /// Extra boardings rolled on top during rush windows
    pub rush_extra_boardings: u32,
    /// Fraction of passengers kept late at night
    pub night_retention: f64,
    /// Half-spread of the speed perturbation in km/h
    pub speed_jitter_kmh: f64,
    pub max_speed_kmh: f64,
    pub rush_speed_cap_kmh: f64,
    pub night_speed_min_kmh: f64,
    pub night_speed_max_kmh: f64,
    /// Morning rush window, inclusive local hours
    pub morning_rush: (u32, u32),
    /// Evening rush window, inclusive local hours
    pub evening_rush: (u32, u32),
    /// Night window, wrapping past midnight, inclusive local hours
    pub night_start_hour: u32,
    pub night_end_hour: u32,
    pub enable_alerts: bool,
    pub alert_min_interval: Duration,
    pub alert_max_interval: Duration,
    /// Chance that an elapsed alert interval actually raises one
    pub alert_probability: f64,
    /// Seed for reproducible runs; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(10),
            max_stagger: Duration::from_secs(5),
            move_fraction_max: 0.10,
            position_jitter_degrees: 0.001,
            occupancy_change_probability: 0.2,
            occupancy_delta_min: -5,
            occupancy_delta_max: 8,
            rush_extra_boardings: 4,
            night_retention: 0.3,
            speed_jitter_kmh: 10.0,
            max_speed_kmh: 60.0,
            rush_speed_cap_kmh: 25.0,
            night_speed_min_kmh: 15.0,
            night_speed_max_kmh: 40.0,
            morning_rush: (7, 9),
            evening_rush: (17, 20),
            night_start_hour: 22,
            night_end_hour: 5,
            enable_alerts: false,
            alert_min_interval: Duration::from_secs(120),
            alert_max_interval: Duration::from_secs(300),
            alert_probability: 0.3,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    fn is_rush(&self, hour: u32) -> bool {
        let (m0, m1) = self.morning_rush;
        let (e0, e1) = self.evening_rush;
        (m0..=m1).contains(&hour) || (e0..=e1).contains(&hour)
    }

    fn is_night(&self, hour: u32) -> bool {
        hour >= self.night_start_hour || hour <= self.night_end_hour
    }
}

/// Handle to a running simulation, used to stop it
pub struct SimulatorHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SimulatorHandle {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every task to stop and wait for them to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("simulator stopped");
    }
}

pub struct MotionSimulator {
    store: Arc<FleetStore>,
    router: Arc<BroadcastRouter>,
    clock: Arc<dyn Clock>,
    config: SimulatorConfig,
}

impl MotionSimulator {
    pub fn new(
        store: Arc<FleetStore>,
        router: Arc<BroadcastRouter>,
        clock: Arc<dyn Clock>,
        config: SimulatorConfig,
    ) -> Self {
        Self {
            store,
            router,
            clock,
            config,
        }
    }

    /// Spawn one driving task per active vehicle, plus the alert task
    pub fn spawn(&self) -> SimulatorHandle {
        let (shutdown, _) = watch::channel(false);

        let mut vehicles: Vec<VehicleId> = self
            .store
            .snapshot_vehicles()
            .into_iter()
            .filter(|v| v.status == VehicleStatus::Active)
            .map(|v| v.id)
            .collect();
        vehicles.sort();

        info!("starting simulator for {} vehicles", vehicles.len());

        let mut tasks = Vec::new();
        for (index, vehicle_id) in vehicles.into_iter().enumerate() {
            tasks.push(tokio::spawn(drive_vehicle(
                self.store.clone(),
                self.router.clone(),
                self.clock.clone(),
                self.config.clone(),
                vehicle_id,
                index as u64,
                shutdown.subscribe(),
            )));
        }
        if self.config.enable_alerts {
            tasks.push(tokio::spawn(raise_alerts(
                self.store.clone(),
                self.router.clone(),
                self.config.clone(),
                shutdown.subscribe(),
            )));
        }

        SimulatorHandle { shutdown, tasks }
    }

    /// Run the simulation for a bounded duration, then stop it
    pub async fn run_for(&self, duration: Duration) {
        let handle = self.spawn();
        tokio::time::sleep(duration).await;
        handle.shutdown().await;
    }
}

fn task_rng(seed: Option<u64>, index: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index)),
        None => StdRng::from_os_rng(),
    }
}

/// The per-vehicle driving loop
async fn drive_vehicle(
    store: Arc<FleetStore>,
    router: Arc<BroadcastRouter>,
    clock: Arc<dyn Clock>,
    config: SimulatorConfig,
    vehicle_id: VehicleId,
    index: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut rng = task_rng(config.seed, index);
    let stagger = Duration::from_millis(rng.random_range(0..=config.max_stagger.as_millis() as u64));
    let interval = config.base_interval + stagger;

    let identity = Identity::new(format!("sim-driver-{}", vehicle_id), Role::Driver);
    let (connection, mut events) = router.connect(Some(identity));

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(interval) => {
                // The simulator never reads its own feed; drain it so the
                // channel does not sit full.
                while events.try_recv().is_ok() {}
                if let Err(err) = tick_vehicle(
                    &store,
                    &router,
                    clock.as_ref(),
                    &config,
                    &mut rng,
                    connection,
                    &vehicle_id,
                ) {
                    warn!("simulated vehicle {} update failed: {}", vehicle_id, err);
                }
            }
        }
    }
    router.disconnect(connection);
}

/// One synthetic device report for one vehicle
fn tick_vehicle(
    store: &FleetStore,
    router: &BroadcastRouter,
    clock: &dyn Clock,
    config: &SimulatorConfig,
    rng: &mut StdRng,
    connection: ConnectionId,
    vehicle_id: &VehicleId,
) -> Result<(), TrackError> {
    let vehicle = store.get_vehicle(vehicle_id)?;
    let route = store.get_route(&vehicle.route_id)?;
    if route.total_stops() < 2 {
        return Ok(());
    }
    let hour = clock.local_hour();

    // Head for the stop after the nearest one, wrapping around the route.
    let Some(nearest) = route.nearest_stop(&vehicle.position) else {
        return Ok(());
    };
    let Some(target) = route.next_stop_after(nearest.order) else {
        return Ok(());
    };

    let progress = rng.random_range(0.0..config.move_fraction_max);
    let latitude = vehicle.position.latitude
        + (target.position.latitude - vehicle.position.latitude) * progress
        + jitter(rng, config);
    let longitude = vehicle.position.longitude
        + (target.position.longitude - vehicle.position.longitude) * progress
        + jitter(rng, config);
    let next_position = GeoPoint::new(latitude, longitude);

    let bearing = geo::bearing_degrees(&vehicle.position, &next_position);
    let speed = next_speed(vehicle.speed_kmh, hour, rng, config);
    let target_stop = target.id.clone();

    router.report_position(connection, vehicle_id, latitude, longitude, speed, bearing)?;
    store.set_vehicle_next_stop(vehicle_id, Some(target_stop))?;

    if rng.random_bool(config.occupancy_change_probability) {
        let occupied = next_occupancy(&vehicle.occupancy, hour, rng, config);
        router.report_occupancy(connection, vehicle_id, occupied, vehicle.occupancy.total_seats)?;
    }
    Ok(())
}

fn jitter(rng: &mut StdRng, config: &SimulatorConfig) -> f64 {
    (rng.random::<f64>() - 0.5) * config.position_jitter_degrees
}

/// Perturb the speed and apply the time-of-day caps
fn next_speed(current_kmh: f64, hour: u32, rng: &mut StdRng, config: &SimulatorConfig) -> f64 {
    // An idle vehicle pulls away from a typical city cruising speed.
    let current = if current_kmh > 0.0 { current_kmh } else { 25.0 };
    let variation = (rng.random::<f64>() - 0.5) * (config.speed_jitter_kmh * 2.0);
    let mut speed = (current + variation).clamp(0.0, config.max_speed_kmh);
    if config.is_rush(hour) {
        speed = speed.min(config.rush_speed_cap_kmh);
    }
    if config.is_night(hour) {
        speed = speed.clamp(config.night_speed_min_kmh, config.night_speed_max_kmh);
    }
    speed.round()
}

/// Perturb the passenger count with the time-of-day bias
fn next_occupancy(
    occupancy: &Occupancy,
    hour: u32,
    rng: &mut StdRng,
    config: &SimulatorConfig,
) -> u32 {
    let total = occupancy.total_seats as i64;
    let delta = rng.random_range(config.occupancy_delta_min..=config.occupancy_delta_max) as i64;
    let mut occupied = (occupancy.occupied_seats as i64 + delta).clamp(0, total);
    if config.is_rush(hour) {
        occupied = (occupied + rng.random_range(0..=config.rush_extra_boardings) as i64).min(total);
    }
    if config.is_night(hour) {
        occupied = (occupied as f64 * config.night_retention).floor() as i64;
    }
    occupied as u32
}

/// The background service-alert loop
async fn raise_alerts(
    store: Arc<FleetStore>,
    router: Arc<BroadcastRouter>,
    config: SimulatorConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut rng = task_rng(config.seed, u64::MAX);
    let identity = Identity::new("sim-control", Role::Operator);
    let (connection, mut events) = router.connect(Some(identity));

    loop {
        let wait = Duration::from_millis(rng.random_range(
            config.alert_min_interval.as_millis() as u64
                ..=config.alert_max_interval.as_millis() as u64,
        ));
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(wait) => {
                while events.try_recv().is_ok() {}
                if !rng.random_bool(config.alert_probability) {
                    continue;
                }
                let vehicles = store.snapshot_vehicles();
                let Some(vehicle) = vehicles.choose(&mut rng) else {
                    continue;
                };
                let Some((kind, message, severity)) = ALERT_CATALOG.choose(&mut rng) else {
                    continue;
                };
                router.raise_alert(
                    connection,
                    *kind,
                    *message,
                    *severity,
                    AlertScope::Route(vehicle.route_id.clone()),
                );
            }
        }
    }
    router.disconnect(connection);
}
