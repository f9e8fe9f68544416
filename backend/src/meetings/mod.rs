//! Meeting lifecycle: validation, ownership and domain events.

mod events;
mod service;

pub use events::{EventBus, MeetingEvent};
pub use service::MeetingService;
