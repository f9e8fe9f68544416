//! Free/busy computation for a single organizer-local day.

mod engine;
pub mod tz;

pub use engine::{
    candidate_windows, free_slots, Availability, AvailabilityEngine, AvailabilityQuery,
    MAX_DURATION_MINUTES, WORKDAY_END_HOUR, WORKDAY_START_HOUR,
};
