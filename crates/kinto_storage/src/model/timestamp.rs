//! Modification timestamps.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Epoch-millisecond modification timestamp.
///
/// Stored as `INTEGER` in every table so that ordering and comparison stay
/// native to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Reported by namespaces that never held a record.
    pub const EPOCH: Timestamp = Timestamp(0);

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time. Clocks before the epoch read as zero.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(millis)
    }

    /// Returns the timestamp for the next write in a namespace.
    ///
    /// The result is `now`, unless the clock has not moved past `previous`,
    /// in which case it is `previous + 1`.
    pub fn next_after(previous: Option<Timestamp>) -> Self {
        let now = Self::now();
        match previous {
            Some(previous) if previous >= now => previous.successor(),
            _ => now,
        }
    }

    pub fn successor(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
