//! Clock and id-generation seams, injectable for deterministic tests.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of event timestamps.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn current_time_seconds(&self) -> i64;
}

/// Source of event ids.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// [`Clock`] backed by the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn current_time_seconds(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}

/// [`IdGenerator`] producing random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
