//! Live event model and the sweeper's collaborator seams.

pub mod store;
pub mod sweeper;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One listed event. Dates are `YYYY-MM-DD`, clock times `HH:MM`; the
/// sweeper combines the end fields against a single fixed timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEvent {
    pub id: i64,
    pub name: String,
    pub organizer_email: String,
    pub location: String,
    pub category: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
    pub likes: i64,
}

/// Row-level access the sweeper is granted over event storage. The trait is
/// synchronous (rusqlite-style); the sweeper wraps calls in
/// `spawn_blocking`.
pub trait EventStore: Send + Sync {
    fn list_live_events(&self) -> Result<Vec<LiveEvent>, String>;
    fn delete_event(&self, id: i64) -> Result<(), String>;
}

/// Outbound notification channel. Fire-and-forget from the sweeper's point
/// of view: no delivery guarantee, no retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_notification(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError>;
}

#[derive(Debug)]
pub enum NotifyError {
    Api(String),
    Timeout,
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Api(msg) => write!(f, "notifier API error: {msg}"),
            NotifyError::Timeout => write!(f, "notification timeout"),
        }
    }
}

/// Render an event's descriptive fields for a notification body.
pub fn format_details(event: &LiveEvent) -> String {
    format!(
        "Name: {}\nLocation: {}\nCategory: {}\nStarts: {} {}\nEnds: {} {}\n\n{}",
        event.name,
        event.location,
        event.category,
        event.start_date,
        event.start_time,
        event.end_date,
        event.end_time,
        event.description,
    )
}
