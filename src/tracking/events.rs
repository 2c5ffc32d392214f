//! Broadcast topics and event payloads
//!
//! Events are plain data. Serialization onto a wire format is the transport
//! collaborator's job, not the core's.

use std::fmt;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;

use super::types::{
    GeoPoint, Occupancy, OccupancyStatus, RouteId, Severity, VehicleId, VehicleStatus,
};

/// An addressable broadcast channel a connection can subscribe to
///
/// Cell components are wrapped in `OrderedFloat` so topics can key the
/// subscription table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Vehicle(VehicleId),
    Route(RouteId),
    Cell {
        latitude: OrderedFloat<f64>,
        longitude: OrderedFloat<f64>,
        radius_m: OrderedFloat<f64>,
    },
}

impl Topic {
    pub fn vehicle(id: impl Into<String>) -> Self {
        Topic::Vehicle(VehicleId::new(id))
    }

    pub fn route(id: impl Into<String>) -> Self {
        Topic::Route(RouteId::new(id))
    }

    pub fn cell(latitude: f64, longitude: f64, radius_m: f64) -> Self {
        Topic::Cell {
            latitude: OrderedFloat(latitude),
            longitude: OrderedFloat(longitude),
            radius_m: OrderedFloat(radius_m),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Vehicle(id) => write!(f, "vehicle:{}", id),
            Topic::Route(id) => write!(f, "route:{}", id),
            Topic::Cell {
                latitude,
                longitude,
                radius_m,
            } => write!(f, "cell:{},{},{}", latitude, longitude, radius_m),
        }
    }
}

/// What a service alert applies to
#[derive(Debug, Clone, PartialEq)]
pub enum AlertScope {
    Global,
    Route(RouteId),
    Vehicle(VehicleId),
}

impl AlertScope {
    /// The topic an alert with this scope is published under, if any
    pub fn topic(&self) -> Option<Topic> {
        match self {
            AlertScope::Global => None,
            AlertScope::Route(id) => Some(Topic::Route(id.clone())),
            AlertScope::Vehicle(id) => Some(Topic::Vehicle(id.clone())),
        }
    }
}

/// An ephemeral service disruption notice, never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceAlert {
    pub kind: String,
    pub message: String,
    pub severity: Severity,
    pub scope: AlertScope,
    pub timestamp: DateTime<Utc>,
    pub sender: Option<String>,
}

/// An event fanned out to subscribed connections
#[derive(Debug, Clone, PartialEq)]
pub enum TrackEvent {
    PositionUpdated {
        vehicle_id: VehicleId,
        route_id: RouteId,
        position: GeoPoint,
        speed_kmh: f64,
        bearing: f64,
        timestamp: DateTime<Utc>,
    },
    OccupancyUpdated {
        vehicle_id: VehicleId,
        occupancy: Occupancy,
        status: OccupancyStatus,
        occupancy_percentage: u32,
        available_seats: u32,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        vehicle_id: VehicleId,
        status: VehicleStatus,
        timestamp: DateTime<Utc>,
    },
    ServiceAlert(ServiceAlert),
    SubscriptionConfirmed {
        topic: Topic,
        subscribed: bool,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
}

impl TrackEvent {
    /// Whether every connection receives this event regardless of topics
    ///
    /// Position, occupancy, and status changes go out on the implicit
    /// all feed. Alerts do too, but only when no route or vehicle scoping
    /// was given.
    pub fn is_global(&self) -> bool {
        match self {
            TrackEvent::PositionUpdated { .. }
            | TrackEvent::OccupancyUpdated { .. }
            | TrackEvent::StatusChanged { .. } => true,
            TrackEvent::ServiceAlert(alert) => alert.scope == AlertScope::Global,
            TrackEvent::SubscriptionConfirmed { .. } | TrackEvent::Pong { .. } => false,
        }
    }

    /// The reported position, for matching against cell subscriptions
    pub fn position(&self) -> Option<&GeoPoint> {
        match self {
            TrackEvent::PositionUpdated { position, .. } => Some(position),
            _ => None,
        }
    }
}
