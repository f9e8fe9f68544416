pub mod meeting;
pub mod notification;
pub mod user;
