pub mod availability;
pub mod health;
pub mod meetings;
pub mod notifications;
pub mod users;
