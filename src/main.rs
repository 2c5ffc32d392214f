use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::info;

use transit_track::tracking::{
    demo, ArrivalEstimator, BroadcastRouter, Clock, FleetStore, GeoQuery, MotionSimulator,
    SimulatorConfig, SystemClock, Topic, TrackEvent, VehicleStatus,
};

#[derive(Parser)]
#[command(name = "transit_track")]
#[command(about = "Fleet tracking engine driven by a synthetic motion feed")]
struct Cli {
    /// Base milliseconds between updates for each simulated vehicle
    #[arg(long, default_value = "2000")]
    interval_ms: u64,

    /// Upper bound of the per-vehicle random stagger in milliseconds
    #[arg(long, default_value = "1000")]
    stagger_ms: u64,

    /// How long to run the simulation, in seconds
    #[arg(long, default_value = "20")]
    duration_secs: u64,

    /// Seconds between fleet status reports
    #[arg(long, default_value = "5")]
    report_secs: u64,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Also raise random service alerts
    #[arg(long)]
    alerts: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let clock = Arc::new(SystemClock);
    let store = Arc::new(FleetStore::new(clock.clone()));
    let seed_data = demo::demo_persistence(clock.now());
    let (routes, vehicles) = store.seed_from(&seed_data)?;
    info!("fleet loaded: {} routes, {} vehicles", routes, vehicles);

    let router = Arc::new(BroadcastRouter::new(store.clone(), clock.clone()));

    // An anonymous observer subscribed to every route, counting what the
    // fan-out delivers.
    let (observer, mut feed) = router.connect(None);
    for route in store.list_routes(None) {
        router.subscribe(observer, Topic::Route(route.id));
    }
    let positions = Arc::new(AtomicU64::new(0));
    let occupancies = Arc::new(AtomicU64::new(0));
    let alerts = Arc::new(AtomicU64::new(0));
    let observer_task = {
        let positions = positions.clone();
        let occupancies = occupancies.clone();
        let alerts = alerts.clone();
        tokio::spawn(async move {
            while let Some(event) = feed.recv().await {
                match event {
                    TrackEvent::PositionUpdated { .. } => {
                        positions.fetch_add(1, Ordering::Relaxed);
                    }
                    TrackEvent::OccupancyUpdated { .. } => {
                        occupancies.fetch_add(1, Ordering::Relaxed);
                    }
                    TrackEvent::ServiceAlert(_) => {
                        alerts.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {}
                }
            }
        })
    };

    let config = SimulatorConfig {
        base_interval: Duration::from_millis(cli.interval_ms),
        max_stagger: Duration::from_millis(cli.stagger_ms),
        enable_alerts: cli.alerts,
        seed: cli.seed,
        ..SimulatorConfig::default()
    };
    let simulator = MotionSimulator::new(store.clone(), router.clone(), clock.clone(), config);
    let handle = simulator.spawn();

    let deadline = tokio::time::sleep(Duration::from_secs(cli.duration_secs));
    tokio::pin!(deadline);
    let mut report = tokio::time::interval(Duration::from_secs(cli.report_secs.max(1)));

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, stopping");
                break;
            }
            _ = report.tick() => log_fleet_status(&store),
        }
    }

    handle.shutdown().await;
    router.disconnect(observer);
    let _ = observer_task.await;

    log_closing_summary(&store, clock)?;
    info!(
        "simulation complete: {} position updates, {} occupancy updates, {} alerts observed",
        positions.load(Ordering::Relaxed),
        occupancies.load(Ordering::Relaxed),
        alerts.load(Ordering::Relaxed),
    );
    Ok(())
}

/// Run the proximity query and the arrival board once over the final state
fn log_closing_summary(store: &Arc<FleetStore>, clock: Arc<SystemClock>) -> Result<()> {
    let routes = store.list_routes(None);
    let Some(route) = routes.first() else {
        return Ok(());
    };

    if let Some(stop) = route.stops.first() {
        let query = GeoQuery::new(store.clone());
        let nearby = query.nearby_vehicles(stop.position.latitude, stop.position.longitude, 5000.0);
        info!("{} vehicles within 5 km of {}", nearby.len(), stop.name);
    }

    let estimator = ArrivalEstimator::new(store.clone(), clock);
    let board = estimator.route_arrivals(&route.id)?;
    let predicted = board.stops.iter().filter(|s| !s.arrivals.is_empty()).count();
    info!(
        "arrival board for route {}: predictions at {} of {} stops",
        board.route_number,
        predicted,
        board.stops.len()
    );
    Ok(())
}

/// Log a one-line fleet status summary
fn log_fleet_status(store: &FleetStore) {
    let vehicles = store.snapshot_vehicles();
    if vehicles.is_empty() {
        info!("fleet status: no vehicles");
        return;
    }
    let active = vehicles
        .iter()
        .filter(|v| v.status == VehicleStatus::Active)
        .count();
    let avg_occupancy = vehicles.iter().map(|v| v.occupancy.ratio()).sum::<f64>()
        / vehicles.len() as f64
        * 100.0;
    let avg_speed =
        vehicles.iter().map(|v| v.speed_kmh).sum::<f64>() / vehicles.len() as f64;
    info!(
        "fleet status: {} active vehicles, {:.0}% average occupancy, {:.0} km/h average speed",
        active, avg_occupancy, avg_speed
    );
}
