//! Removal marker state evaluation.
//!
//! # Responsibility
//! - Define the marker value shape shared by every record type.
//! - Answer "is this record removed?" without touching storage.
//!
//! # Invariants
//! - A marker is either absent (kept) or a point in time (removed).
//! - Evaluation is pure and O(1).

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix epoch milliseconds.
pub type Timestamp = i64;

/// Removal marker value. `None` means kept.
pub type Marker = Option<Timestamp>;

/// Returns whether the marker flags the record as removed.
pub fn is_removed(marker: Marker) -> bool {
    marker.is_some()
}

/// Returns whether the marker flags the record as kept.
pub fn is_kept(marker: Marker) -> bool {
    !is_removed(marker)
}

/// Current wall-clock time in epoch milliseconds.
///
/// Clocks set before the epoch collapse to `0` instead of failing, so a
/// removal always records a present marker.
pub fn now_epoch_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| Timestamp::try_from(elapsed.as_millis()).unwrap_or(Timestamp::MAX))
        .unwrap_or(0)
}

/// Named lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Kept -> removed.
    Remove,
    /// Removed -> kept.
    Restore,
}

impl Transition {
    /// Whether a record whose removal state is `removed` can take this
    /// transition.
    pub fn is_eligible(self, removed: bool) -> bool {
        match self {
            Self::Remove => !removed,
            Self::Restore => removed,
        }
    }

    /// Marker value written when this transition is applied at `now`.
    pub fn target_marker(self, now: Timestamp) -> Marker {
        match self {
            Self::Remove => Some(now),
            Self::Restore => None,
        }
    }

    /// Stable name used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Restore => "restore",
        }
    }
}

impl Display for Transition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution mode for one transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Runs type-level guards/observers; may be aborted.
    Hooked,
    /// Single-field persist with no hooks of any kind.
    Direct,
}

impl WriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hooked => "hooked",
            Self::Direct => "direct",
        }
    }
}
