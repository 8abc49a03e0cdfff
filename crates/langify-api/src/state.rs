use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use langify_db::Database;
use tracing::error;

use crate::error::{ApiError, ApiResult};
use crate::password::Passwords;
use crate::sessions::SessionRegistry;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub passwords: Passwords,
    /// Zone whose calendar days drive streaks.
    pub calendar: FixedOffset,
    pub sessions: SessionRegistry,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: impl Into<String>) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
            passwords: Passwords::default(),
            calendar: Utc.fix(),
            sessions: SessionRegistry::default(),
        }
    }

    pub fn with_passwords(mut self, passwords: Passwords) -> Self {
        self.passwords = passwords;
        self
    }

    pub fn with_calendar(mut self, calendar: FixedOffset) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn into_shared(self) -> AppState {
        Arc::new(self)
    }
}

/// Runs a synchronous store operation off the async workers.
pub async fn blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&AppStateInner) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
}
