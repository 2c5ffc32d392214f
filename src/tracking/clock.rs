//! Injectable wall-clock source
//!
//! The estimator's "now plus minutes" arithmetic and the simulator's
//! rush-hour and night bias both read time through this trait so tests can
//! pin the clock.

use chrono::{DateTime, Local, Timelike, Utc};

pub trait Clock: Send + Sync {
    /// Current instant in UTC
    fn now(&self) -> DateTime<Utc>;

    /// Current hour of day (0..=23) in the installation's local timezone
    fn local_hour(&self) -> u32;
}

/// Clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_hour(&self) -> u32 {
        Local::now().hour()
    }
}

/// Clock pinned to a fixed instant and local hour, for deterministic tests
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub timestamp: DateTime<Utc>,
    pub hour: u32,
}

impl FixedClock {
    pub fn new(timestamp: DateTime<Utc>, hour: u32) -> Self {
        Self { timestamp, hour }
    }

    /// A fixed clock at the given local hour on an arbitrary reference day
    pub fn at_hour(hour: u32) -> Self {
        let timestamp = DateTime::from_timestamp(1_700_000_000, 0)
            .unwrap_or_else(|| Utc::now());
        Self { timestamp, hour }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn local_hour(&self) -> u32 {
        self.hour
    }
}
