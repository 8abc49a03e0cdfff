pub mod memory;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod query;
pub mod seed;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use langify_types::models::{HistoryEntry, Language, Lesson, Notification, ProgressEntry};
use thiserror::Error;
use tracing::{info, warn};

use crate::memory::MemoryBackend;
use crate::models::{LessonContentRow, NewUser, UserRow, UserUpdate};
use crate::queries::SqliteBackend;
use crate::query::{Query, Rows};
use crate::seed::ReferenceData;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("username already taken: {0}")]
    Conflict(String),

    #[error("DB lock poisoned")]
    LockPoisoned,

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("expected {expected} rows from query")]
    UnexpectedRows { expected: &'static str },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl DbError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;

/// Per-entity persistence operations over the seven Langify collections.
///
/// Reads never fail on a missing row (they return `None` or an empty list);
/// updates and deletes by id return `DbError::NotFound`. Cascades across
/// collections are the caller's job, inside `Database::transaction`.
pub trait Backend: Send {
    /// Loads reference data. Must be a no-op on the second call.
    fn seed(&mut self, data: &ReferenceData) -> DbResult<()>;

    fn begin(&mut self) -> DbResult<()>;
    fn commit(&mut self) -> DbResult<()>;
    fn rollback(&mut self) -> DbResult<()>;

    // -- Users --
    fn user_by_username(&self, username: &str) -> DbResult<Option<UserRow>>;
    fn user_by_id(&self, id: &str) -> DbResult<Option<UserRow>>;
    /// Highest points first; ties keep insertion order.
    fn users_by_points(&self) -> DbResult<Vec<UserRow>>;
    fn insert_user(&mut self, user: NewUser) -> DbResult<UserRow>;
    fn update_user(&mut self, id: &str, update: &UserUpdate) -> DbResult<()>;
    fn delete_user(&mut self, id: &str) -> DbResult<()>;

    // -- Reference data --
    fn languages(&self) -> DbResult<Vec<Language>>;
    /// Lessons of one language by `order` ascending.
    fn lessons_for_language(&self, language_id: &str) -> DbResult<Vec<Lesson>>;
    fn lesson_by_id(&self, id: &str) -> DbResult<Option<Lesson>>;
    /// Content of one lesson in presentation (insertion) order.
    fn lesson_content(&self, lesson_id: &str) -> DbResult<Vec<LessonContentRow>>;
    /// Newest first.
    fn notifications(&self) -> DbResult<Vec<Notification>>;

    // -- Progress --
    /// Insert or overwrite the row for `(user_id, lesson_id)`.
    fn upsert_progress(&mut self, entry: &ProgressEntry) -> DbResult<()>;
    /// Flags the pair completed, creating a zero-score row if there is none.
    fn mark_complete(&mut self, user_id: &str, lesson_id: &str) -> DbResult<ProgressEntry>;
    fn progress(&self, user_id: &str, lesson_id: &str) -> DbResult<Option<ProgressEntry>>;
    fn progress_for_language(&self, user_id: &str, language_id: &str) -> DbResult<Vec<ProgressEntry>>;
    fn delete_progress_for_user(&mut self, user_id: &str) -> DbResult<usize>;

    // -- History --
    fn insert_history(&mut self, entry: &HistoryEntry) -> DbResult<()>;
    /// Oldest first.
    fn history_for_user(&self, user_id: &str) -> DbResult<Vec<HistoryEntry>>;
    fn delete_history_for_user(&mut self, user_id: &str) -> DbResult<usize>;
}

/// The store. One backend behind one lock, so every closure handed to
/// `with_conn` or `transaction` runs alone.
pub struct Database {
    backend: Mutex<Box<dyn Backend>>,
}

impl Database {
    /// SQLite-backed store at `path`, migrated and seeded.
    pub fn open(path: &Path) -> DbResult<Self> {
        let db = Self::with_backend(SqliteBackend::open(path)?)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Process-local store; everything is lost on restart.
    pub fn in_memory() -> DbResult<Self> {
        let db = Self::with_backend(MemoryBackend::new())?;
        info!("In-memory database ready");
        Ok(db)
    }

    pub fn with_backend(backend: impl Backend + 'static) -> DbResult<Self> {
        let mut backend: Box<dyn Backend> = Box::new(backend);
        backend.seed(&seed::reference_data()?)?;
        Ok(Self {
            backend: Mutex::new(backend),
        })
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Box<dyn Backend>>> {
        self.backend.lock().map_err(|_| DbError::LockPoisoned)
    }

    pub fn with_conn<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Backend) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut guard = self.lock()?;
        f(&mut **guard)
    }

    /// Runs `f` atomically: any error rolls back every write it made.
    pub fn transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Backend) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut guard = self.lock()?;
        let backend: &mut dyn Backend = &mut **guard;
        backend.begin()?;

        match f(&mut *backend) {
            Ok(value) => {
                backend.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = backend.rollback() {
                    warn!("Rollback failed: {}", rb);
                }
                Err(e)
            }
        }
    }

    /// Typed single-entry dispatch; see [`Query`].
    pub fn query(&self, q: Query) -> DbResult<Rows> {
        self.with_conn(|backend| query::dispatch(backend, q))
    }
}
