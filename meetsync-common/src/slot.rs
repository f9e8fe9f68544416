//! Free time windows returned by availability queries.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A free `[start, end)` window on one calendar day.
///
/// `label` is rendered in the organizer's local time; the UTC fields are what
/// a client passes back when booking the slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Human-readable local range, e.g. `"09:00 AM - 10:00 AM"`.
    pub label: String,
    #[serde(rename = "startUTC")]
    pub start_utc: DateTime<Utc>,
    #[serde(rename = "endUTC")]
    pub end_utc: DateTime<Utc>,
}

impl Slot {
    /// Length of the window.
    pub fn duration(&self) -> Duration {
        self.end_utc - self.start_utc
    }
}
