//! Data types for the file lock manager.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An advisory, TTL-bounded reservation of a path by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLock {
    pub path: String,
    pub agent_id: String,
    pub task_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl FileLock {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Outcome of an `Acquire`/`AcquireMultiple` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockResult {
    pub acquired: bool,
    pub lock: Option<FileLock>,
    pub waited_for: Duration,
    pub held_by: Option<String>,
    pub queue_depth: usize,
}

impl LockResult {
    pub fn granted(lock: FileLock, waited_for: Duration) -> Self {
        Self {
            acquired: true,
            lock: Some(lock),
            waited_for,
            held_by: None,
            queue_depth: 0,
        }
    }

    pub fn denied(held_by: String, queue_depth: usize, waited_for: Duration) -> Self {
        Self {
            acquired: false,
            lock: None,
            waited_for,
            held_by: Some(held_by),
            queue_depth,
        }
    }
}

/// Serializable form of a wait duration, since [`Duration`] does not
/// implement `Serialize`/`Deserialize` in a human-friendly way.
impl Serialize for OldestLock {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.0.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for OldestLock {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(OldestLock(Duration::from_secs_f64(secs)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OldestLock(pub Duration);

/// Point-in-time snapshot of lock table occupancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockStats {
    pub active_locks: usize,
    pub total_waiters: usize,
    pub oldest_lock: Option<OldestLock>,
}

/// Internal timing anchor; kept separate from the serializable
/// `DateTime<Utc>` fields on `FileLock` because elapsed-time math
/// should use a monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct AcquireStart(pub Instant);

impl AcquireStart {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}
