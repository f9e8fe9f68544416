pub mod attendees;
pub mod auth;
pub mod availability;
pub mod config;
pub mod error;
pub mod logging;
pub mod meetings;
pub mod models;
pub mod notify;
pub mod reminder;
pub mod routes;
pub mod store;
pub mod test_util;

pub use auth::AuthUser;
pub use availability::AvailabilityEngine;
pub use config::Config;
pub use error::{Error, Result};
pub use meetings::{EventBus, MeetingEvent, MeetingService};
pub use notify::{ChannelRegistry, NotificationDispatcher};
pub use reminder::{LogReminderSender, ReminderScheduler, ReminderSender};
pub use store::{MeetingStore, NotificationStore, SqliteStore, UserStore};

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{middleware, routing::get, Router};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserStore>,
    pub meetings: Arc<dyn MeetingStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub availability: AvailabilityEngine,
    pub meeting_service: MeetingService,
    /// Live notification channels of connected users.
    pub registry: Arc<ChannelRegistry>,
    pub dispatcher: Arc<NotificationDispatcher>,
    /// Meeting mutations, fanned out to the notifier and reminder worker.
    pub events: EventBus,
    pub reminders: Arc<ReminderScheduler>,
}

impl AppState {
    /// Wire every component on top of one store, with reminders going to the log.
    pub fn new(config: Config, store: Arc<SqliteStore>) -> Self {
        Self::with_reminder_sender(config, store, Arc::new(LogReminderSender))
    }

    pub fn with_reminder_sender(
        config: Config,
        store: Arc<SqliteStore>,
        sender: Arc<dyn ReminderSender>,
    ) -> Self {
        let users: Arc<dyn UserStore> = store.clone();
        let meetings: Arc<dyn MeetingStore> = store.clone();
        let notifications: Arc<dyn NotificationStore> = store;

        let events = EventBus::new(config.realtime.event_capacity);
        let registry = Arc::new(ChannelRegistry::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            notifications.clone(),
            registry.clone(),
        ));

        Self {
            availability: AvailabilityEngine::new(
                users.clone(),
                meetings.clone(),
                config.scheduling.default_duration_minutes,
            ),
            meeting_service: MeetingService::new(users.clone(), meetings.clone(), events.clone()),
            reminders: Arc::new(ReminderScheduler::new(sender, config.reminders.lead_minutes)),
            config,
            users,
            meetings,
            notifications,
            registry,
            dispatcher,
            events,
        }
    }

    /// Start the background consumers of meeting events.
    pub fn spawn_subscribers(&self) -> Vec<JoinHandle<()>> {
        let mut handles = vec![notify::spawn_notifier(
            self.events.subscribe(),
            self.dispatcher.clone(),
        )];
        if self.config.reminders.enabled {
            handles.push(reminder::spawn_reminder_worker(
                self.events.subscribe(),
                self.reminders.clone(),
            ));
        } else {
            tracing::info!("Meeting reminders disabled");
        }
        handles
    }
}

/// Build the full HTTP and WebSocket router.
pub fn app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(routes::users::router(state.clone()))
        .merge(routes::availability::router(state.clone()))
        .merge(routes::meetings::router(state.clone()))
        .merge(routes::notifications::router(state.clone()));

    Router::new()
        .merge(routes::health::router(state.clone()))
        .nest("/api", api)
        .route("/ws", get(notify::ws::ws_handler).with_state(state.clone()))
        .layer(middleware::from_fn(logging::request_logger))
        .layer(cors_layer(&state.config.cors.origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.trim() == "*" {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}
