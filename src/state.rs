use std::sync::atomic::AtomicI64;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::BookingEvent;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
    pub events_tx: broadcast::Sender<BookingEvent>,
    /// Highest event id already sent on `events_tx`. Only moved while the
    /// db lock is held.
    pub events_published: AtomicI64,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        let published = queries::latest_booking_event_id(&conn).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read the event log position");
            0
        });
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            clock,
            events_tx,
            events_published: AtomicI64::new(published),
        }
    }

    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Persistence(anyhow::anyhow!("database lock poisoned")))
    }
}
