//! Topic-based broadcast router for live connections
//!
//! Manages the connection lifecycle, topic subscriptions, and event fan-out.
//! The router reads fleet state to build payloads but never mutates it
//! except through the role-gated report actions, which apply to the store
//! first and then broadcast, the same path a live device report takes.
//!
//! Delivery is at-most-once per connection per publish call. Each connection
//! gets a bounded channel written with `try_send`: a slow or vanished
//! subscriber is skipped, never waited on, and one unreachable subscriber
//! never aborts delivery to the rest.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::{debug, info};
use tokio::sync::mpsc;

use super::clock::Clock;
use super::error::TrackError;
use super::events::{AlertScope, ServiceAlert, Topic, TrackEvent};
use super::query::BoundingBox;
use super::store::FleetStore;
use super::types::{ConnectionId, Role, Severity, VehicleId, VehicleStatus};

/// Buffered events per connection before fan-out starts skipping it
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A resolved authentication result handed in by the auth collaborator
///
/// Connections presenting no identity stay anonymous and keep read access
/// to public events; only the report actions check the role.
#[derive(Debug, Clone)]
pub struct Identity {
    pub name: String,
    pub role: Role,
}

impl Identity {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

struct Connection {
    identity: Option<Identity>,
    sender: mpsc::Sender<TrackEvent>,
    topics: HashSet<Topic>,
}

#[derive(Default)]
struct RouterState {
    connections: HashMap<ConnectionId, Connection>,
    topics: HashMap<Topic, HashSet<ConnectionId>>,
}

pub struct BroadcastRouter {
    store: Arc<FleetStore>,
    clock: Arc<dyn Clock>,
    state: RwLock<RouterState>,
    next_connection_id: AtomicU64,
}

impl BroadcastRouter {
    pub fn new(store: Arc<FleetStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            state: RwLock::new(RouterState::default()),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Open a connection, anonymous or authenticated
    ///
    /// Never rejects: an absent or unverifiable credential simply arrives
    /// here as `None`. Returns the connection id and the receiving end of
    /// its event channel, which the transport drains.
    pub fn connect(
        &self,
        identity: Option<Identity>,
    ) -> (ConnectionId, mpsc::Receiver<TrackEvent>) {
        let id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        match &identity {
            Some(who) => info!("connection {} opened for {} ({:?})", id, who.name, who.role),
            None => info!("connection {} opened anonymously", id),
        }
        let mut state = self.state.write().expect("router state lock poisoned");
        state.connections.insert(
            id,
            Connection {
                identity,
                sender,
                topics: HashSet::new(),
            },
        );
        (id, receiver)
    }

    /// Close a connection and release all its topics in one step
    ///
    /// No event is emitted to other parties. Unknown ids are a no-op.
    pub fn disconnect(&self, id: ConnectionId) {
        let mut state = self.state.write().expect("router state lock poisoned");
        if let Some(connection) = state.connections.remove(&id) {
            for topic in &connection.topics {
                let now_empty = state.topics.get_mut(topic).is_some_and(|subscribers| {
                    subscribers.remove(&id);
                    subscribers.is_empty()
                });
                if now_empty {
                    state.topics.remove(topic);
                }
            }
            info!("connection {} closed", id);
        }
    }

    /// Subscribe a connection to a topic
    ///
    /// Idempotent: subscribing twice holds exactly one subscription. Every
    /// call answers the requester with a confirmation event, and nobody
    /// else hears about it.
    pub fn subscribe(&self, id: ConnectionId, topic: Topic) {
        let confirmation = {
            let mut state = self.state.write().expect("router state lock poisoned");
            let Some(connection) = state.connections.get_mut(&id) else {
                return;
            };
            connection.topics.insert(topic.clone());
            let sender = connection.sender.clone();
            state.topics.entry(topic.clone()).or_default().insert(id);
            sender
        };
        debug!("connection {} subscribed to {}", id, topic);
        self.deliver(
            id,
            &confirmation,
            TrackEvent::SubscriptionConfirmed {
                topic,
                subscribed: true,
            },
        );
    }

    /// Unsubscribe a connection from a topic
    ///
    /// Unsubscribing from a topic not held is a no-op, but still confirmed.
    pub fn unsubscribe(&self, id: ConnectionId, topic: Topic) {
        let confirmation = {
            let mut state = self.state.write().expect("router state lock poisoned");
            let Some(connection) = state.connections.get_mut(&id) else {
                return;
            };
            connection.topics.remove(&topic);
            let sender = connection.sender.clone();
            let now_empty = state.topics.get_mut(&topic).is_some_and(|subscribers| {
                subscribers.remove(&id);
                subscribers.is_empty()
            });
            if now_empty {
                state.topics.remove(&topic);
            }
            sender
        };
        debug!("connection {} unsubscribed from {}", id, topic);
        self.deliver(
            id,
            &confirmation,
            TrackEvent::SubscriptionConfirmed {
                topic,
                subscribed: false,
            },
        );
    }

    /// Connection-health probe, answered to the caller only
    pub fn ping(&self, id: ConnectionId) {
        let sender = {
            let state = self.state.read().expect("router state lock poisoned");
            state.connections.get(&id).map(|c| c.sender.clone())
        };
        if let Some(sender) = sender {
            self.deliver(
                id,
                &sender,
                TrackEvent::Pong {
                    timestamp: self.clock.now(),
                },
            );
        }
    }

    /// Fan an event out to its audience
    ///
    /// The audience is the union of the source topic's subscribers, every
    /// connection when the event category is global, and, for position
    /// events, subscribers of any cell whose box contains the position.
    /// The union is deduplicated, so one publish delivers at most one copy
    /// per connection.
    pub fn publish(&self, event: TrackEvent, source: Option<Topic>) {
        match source {
            Some(topic) => self.publish_to(event, &[topic]),
            None => self.publish_to(event, &[]),
        }
    }

    fn publish_to(&self, event: TrackEvent, sources: &[Topic]) {
        let state = self.state.read().expect("router state lock poisoned");

        let mut audience: HashSet<ConnectionId> = HashSet::new();
        if event.is_global() {
            audience.extend(state.connections.keys().copied());
        }
        for topic in sources {
            if let Some(subscribers) = state.topics.get(topic) {
                audience.extend(subscribers.iter().copied());
            }
        }
        if let Some(position) = event.position() {
            for (topic, subscribers) in &state.topics {
                if let Topic::Cell {
                    latitude,
                    longitude,
                    radius_m,
                } = topic
                {
                    let bbox = BoundingBox::from_radius(
                        latitude.into_inner(),
                        longitude.into_inner(),
                        radius_m.into_inner(),
                    );
                    if bbox.contains(position) {
                        audience.extend(subscribers.iter().copied());
                    }
                }
            }
        }

        for id in audience {
            if let Some(connection) = state.connections.get(&id) {
                self.deliver(id, &connection.sender, event.clone());
            }
        }
    }

    /// Report a vehicle position, as a driver device would
    ///
    /// Requires a driver, operator, or admin role; anything else is
    /// rejected silently with no state change and no event. Applies to the
    /// store first, then broadcasts.
    pub fn report_position(
        &self,
        id: ConnectionId,
        vehicle_id: &VehicleId,
        latitude: f64,
        longitude: f64,
        speed_kmh: f64,
        bearing: f64,
    ) -> Result<(), TrackError> {
        if !self.has_role(id, &[Role::Driver, Role::Operator, Role::Admin]) {
            debug!("connection {} not allowed to report positions", id);
            return Ok(());
        }
        let timestamp = self.clock.now();
        self.store
            .upsert_vehicle_position(vehicle_id, latitude, longitude, timestamp)?;
        let vehicle = self.store.set_vehicle_motion(vehicle_id, speed_kmh, bearing)?;

        let event = TrackEvent::PositionUpdated {
            vehicle_id: vehicle.id.clone(),
            route_id: vehicle.route_id.clone(),
            position: vehicle.position,
            speed_kmh: vehicle.speed_kmh,
            bearing: vehicle.bearing,
            timestamp,
        };
        self.publish_to(
            event,
            &[
                Topic::Vehicle(vehicle.id),
                Topic::Route(vehicle.route_id),
            ],
        );
        Ok(())
    }

    /// Report a vehicle occupancy count, as a driver or conductor would
    pub fn report_occupancy(
        &self,
        id: ConnectionId,
        vehicle_id: &VehicleId,
        occupied: u32,
        total: u32,
    ) -> Result<(), TrackError> {
        if !self.has_role(id, &[Role::Driver, Role::Operator, Role::Admin]) {
            debug!("connection {} not allowed to report occupancy", id);
            return Ok(());
        }
        let vehicle = self
            .store
            .upsert_vehicle_occupancy(vehicle_id, occupied, total)?;

        let event = TrackEvent::OccupancyUpdated {
            vehicle_id: vehicle.id.clone(),
            occupancy: vehicle.occupancy,
            status: vehicle.occupancy_status,
            occupancy_percentage: vehicle.occupancy.percentage(),
            available_seats: vehicle.occupancy.available_seats(),
            timestamp: vehicle.occupancy_updated,
        };
        self.publish_to(event, &[Topic::Vehicle(vehicle.id)]);
        Ok(())
    }

    /// Change a vehicle's operational status
    pub fn set_status(
        &self,
        id: ConnectionId,
        vehicle_id: &VehicleId,
        status: VehicleStatus,
    ) -> Result<(), TrackError> {
        if !self.has_role(id, &[Role::Operator, Role::Admin]) {
            debug!("connection {} not allowed to change vehicle status", id);
            return Ok(());
        }
        let vehicle = self.store.set_vehicle_status(vehicle_id, status)?;
        info!("vehicle {} status changed to {}", vehicle.id, status);

        let event = TrackEvent::StatusChanged {
            vehicle_id: vehicle.id.clone(),
            status,
            timestamp: self.clock.now(),
        };
        self.publish_to(event, &[Topic::Vehicle(vehicle.id)]);
        Ok(())
    }

    /// Raise a service alert, scoped or global
    ///
    /// Requires an operator or admin role. A scoped alert reaches only the
    /// subscribers of its route or vehicle topic; an unscoped one goes out
    /// to everyone.
    pub fn raise_alert(
        &self,
        id: ConnectionId,
        kind: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        scope: AlertScope,
    ) {
        let Some(identity) = self.identity_with_role(id, &[Role::Operator, Role::Admin]) else {
            debug!("connection {} not allowed to raise alerts", id);
            return;
        };
        let alert = ServiceAlert {
            kind: kind.into(),
            message: message.into(),
            severity,
            scope: scope.clone(),
            timestamp: self.clock.now(),
            sender: Some(identity.name),
        };
        info!("service alert ({:?}): {}", severity, alert.message);
        self.publish(TrackEvent::ServiceAlert(alert), scope.topic());
    }

    /// How many connections are currently open
    pub fn connection_count(&self) -> usize {
        self.state
            .read()
            .expect("router state lock poisoned")
            .connections
            .len()
    }

    /// How many subscriptions a connection currently holds
    pub fn subscription_count(&self, id: ConnectionId) -> usize {
        self.state
            .read()
            .expect("router state lock poisoned")
            .connections
            .get(&id)
            .map_or(0, |c| c.topics.len())
    }

    fn has_role(&self, id: ConnectionId, allowed: &[Role]) -> bool {
        self.identity_with_role(id, allowed).is_some()
    }

    fn identity_with_role(&self, id: ConnectionId, allowed: &[Role]) -> Option<Identity> {
        let state = self.state.read().expect("router state lock poisoned");
        state
            .connections
            .get(&id)?
            .identity
            .clone()
            .filter(|who| allowed.contains(&who.role))
    }

    /// Hand one event to one connection, skipping on a full or dead channel
    fn deliver(&self, id: ConnectionId, sender: &mpsc::Sender<TrackEvent>, event: TrackEvent) {
        if sender.try_send(event).is_err() {
            debug!("connection {} unavailable, event skipped", id);
        }
    }
}
