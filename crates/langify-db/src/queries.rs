use std::path::Path;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use langify_types::DEFAULT_UI_LANGUAGE;
use langify_types::models::{
    HistoryEntry, Language, Lesson, Notification, NotificationKind, ProgressEntry, TimerConfig,
};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use tracing::info;
use uuid::Uuid;

use crate::models::{LessonContentRow, NewUser, UserRow, UserUpdate};
use crate::seed::ReferenceData;
use crate::{Backend, DbError, DbResult, migrations};

const USER_COLUMNS: &str = "id, username, password_hash, points, level, current_streak, \
     last_lesson_completed_at, is_admin, ui_language, created_at";

const LESSON_COLUMNS: &str =
    "id, language_id, title, description, sort_order, timer_enabled, timer_duration";

/// SQLite store with the same seven collections as tables.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self { conn })
    }
}

impl Backend for SqliteBackend {
    fn seed(&mut self, data: &ReferenceData) -> DbResult<()> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;

        for lang in &data.languages {
            inserted += tx.execute(
                "INSERT OR IGNORE INTO languages (id, name, code, flag) VALUES (?1, ?2, ?3, ?4)",
                params![lang.id, lang.name, lang.code, lang.flag],
            )?;
        }
        for lesson in &data.lessons {
            inserted += tx.execute(
                "INSERT OR IGNORE INTO lessons (id, language_id, title, description, sort_order, timer_enabled, timer_duration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    lesson.id,
                    lesson.language_id,
                    lesson.title,
                    lesson.description,
                    lesson.order,
                    lesson.timer.enabled,
                    lesson.timer.duration_secs
                ],
            )?;
        }
        for item in &data.content {
            inserted += tx.execute(
                "INSERT OR IGNORE INTO lesson_content (id, lesson_id, type, data) VALUES (?1, ?2, ?3, ?4)",
                params![item.id, item.lesson_id, item.kind, item.data],
            )?;
        }
        for n in &data.notifications {
            inserted += tx.execute(
                "INSERT OR IGNORE INTO notifications (id, message, type, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![n.id, n.message, n.kind.as_str(), encode_ts(&n.created_at)],
            )?;
        }

        tx.commit()?;
        if inserted > 0 {
            info!("Seeded {} reference rows", inserted);
        }
        Ok(())
    }

    fn begin(&mut self) -> DbResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> DbResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    // -- Users --

    fn user_by_username(&self, username: &str) -> DbResult<Option<UserRow>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
        self.conn.query_row(&sql, [username], map_user).optional()
    }

    fn user_by_id(&self, id: &str) -> DbResult<Option<UserRow>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        self.conn.query_row(&sql, [id], map_user).optional()
    }

    fn users_by_points(&self) -> DbResult<Vec<UserRow>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY points DESC, rowid ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_user)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert_user(&mut self, user: NewUser) -> DbResult<UserRow> {
        if self.user_by_username(&user.username)?.is_some() {
            return Err(DbError::Conflict(user.username));
        }

        let row = UserRow {
            id: Uuid::new_v4().to_string(),
            username: user.username,
            password_hash: user.password_hash,
            points: 0,
            level: 1,
            current_streak: 0,
            last_lesson_completed_at: None,
            is_admin: false,
            ui_language: user
                .ui_language
                .unwrap_or_else(|| DEFAULT_UI_LANGUAGE.to_string()),
            // Stored with microsecond precision; match what a re-read returns.
            created_at: Utc::now().trunc_subsecs(6),
        };

        self.conn.execute(
            "INSERT INTO users (id, username, password_hash, ui_language, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![row.id, row.username, row.password_hash, row.ui_language, encode_ts(&row.created_at)],
        )?;
        Ok(row)
    }

    fn update_user(&mut self, id: &str, update: &UserUpdate) -> DbResult<()> {
        let mut row = self
            .user_by_id(id)?
            .ok_or_else(|| DbError::not_found("user", id))?;
        update.apply(&mut row);

        self.conn.execute(
            "UPDATE users SET password_hash = ?1, points = ?2, level = ?3, current_streak = ?4,
                    last_lesson_completed_at = ?5, is_admin = ?6, ui_language = ?7
             WHERE id = ?8",
            params![
                row.password_hash,
                row.points,
                row.level,
                row.current_streak,
                row.last_lesson_completed_at.as_ref().map(encode_ts),
                row.is_admin,
                row.ui_language,
                id
            ],
        )?;
        Ok(())
    }

    fn delete_user(&mut self, id: &str) -> DbResult<()> {
        let deleted = self.conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(DbError::not_found("user", id));
        }
        Ok(())
    }

    // -- Reference data --

    fn languages(&self) -> DbResult<Vec<Language>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, code, flag FROM languages ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Language {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    code: row.get(2)?,
                    flag: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn lessons_for_language(&self, language_id: &str) -> DbResult<Vec<Lesson>> {
        let sql = format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE language_id = ?1 ORDER BY sort_order ASC, rowid ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([language_id], map_lesson)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn lesson_by_id(&self, id: &str) -> DbResult<Option<Lesson>> {
        let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?1");
        self.conn.query_row(&sql, [id], map_lesson).optional()
    }

    fn lesson_content(&self, lesson_id: &str) -> DbResult<Vec<LessonContentRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, lesson_id, type, data FROM lesson_content WHERE lesson_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([lesson_id], |row| {
                Ok(LessonContentRow {
                    id: row.get(0)?,
                    lesson_id: row.get(1)?,
                    kind: row.get(2)?,
                    data: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn notifications(&self) -> DbResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, message, type, created_at FROM notifications ORDER BY created_at DESC, rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Notification {
                    id: row.get(0)?,
                    message: row.get(1)?,
                    kind: NotificationKind::parse(&row.get::<_, String>(2)?),
                    created_at: ts_column(row, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- Progress --

    fn upsert_progress(&mut self, entry: &ProgressEntry) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO user_progress (user_id, lesson_id, completed, score) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, lesson_id) DO UPDATE SET completed = excluded.completed, score = excluded.score",
            params![entry.user_id, entry.lesson_id, entry.completed, entry.score],
        )?;
        Ok(())
    }

    fn mark_complete(&mut self, user_id: &str, lesson_id: &str) -> DbResult<ProgressEntry> {
        self.conn.execute(
            "INSERT INTO user_progress (user_id, lesson_id, completed, score) VALUES (?1, ?2, 1, 0)
             ON CONFLICT(user_id, lesson_id) DO UPDATE SET completed = 1",
            [user_id, lesson_id],
        )?;
        self.progress(user_id, lesson_id)?
            .ok_or_else(|| DbError::not_found("progress", format!("{user_id}/{lesson_id}")))
    }

    fn progress(&self, user_id: &str, lesson_id: &str) -> DbResult<Option<ProgressEntry>> {
        self.conn
            .query_row(
                "SELECT user_id, lesson_id, completed, score FROM user_progress
                 WHERE user_id = ?1 AND lesson_id = ?2",
                [user_id, lesson_id],
                map_progress,
            )
            .optional()
    }

    fn progress_for_language(&self, user_id: &str, language_id: &str) -> DbResult<Vec<ProgressEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.user_id, p.lesson_id, p.completed, p.score
             FROM user_progress p
             JOIN lessons l ON p.lesson_id = l.id
             WHERE p.user_id = ?1 AND l.language_id = ?2
             ORDER BY p.rowid",
        )?;
        let rows = stmt
            .query_map([user_id, language_id], map_progress)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn delete_progress_for_user(&mut self, user_id: &str) -> DbResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM user_progress WHERE user_id = ?1", [user_id])?)
    }

    // -- History --

    fn insert_history(&mut self, entry: &HistoryEntry) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO user_history (user_id, timestamp, points, level) VALUES (?1, ?2, ?3, ?4)",
            params![entry.user_id, encode_ts(&entry.timestamp), entry.points, entry.level],
        )?;
        Ok(())
    }

    fn history_for_user(&self, user_id: &str) -> DbResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, timestamp, points, level FROM user_history
             WHERE user_id = ?1 ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt
            .query_map([user_id], |row| {
                Ok(HistoryEntry {
                    user_id: row.get(0)?,
                    timestamp: ts_column(row, 1)?,
                    points: row.get(2)?,
                    level: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn delete_history_for_user(&mut self, user_id: &str) -> DbResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM user_history WHERE user_id = ?1", [user_id])?)
    }
}

fn map_user(row: &Row) -> rusqlite::Result<UserRow> {
    let last: Option<String> = row.get(6)?;
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        points: row.get(3)?,
        level: row.get(4)?,
        current_streak: row.get(5)?,
        last_lesson_completed_at: last.map(|s| parse_ts(6, &s)).transpose()?,
        is_admin: row.get(7)?,
        ui_language: row.get(8)?,
        created_at: ts_column(row, 9)?,
    })
}

fn map_lesson(row: &Row) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: row.get(0)?,
        language_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        order: row.get(4)?,
        timer: TimerConfig {
            enabled: row.get(5)?,
            duration_secs: row.get(6)?,
        },
    })
}

fn map_progress(row: &Row) -> rusqlite::Result<ProgressEntry> {
    Ok(ProgressEntry {
        user_id: row.get(0)?,
        lesson_id: row.get(1)?,
        completed: row.get(2)?,
        score: row.get(3)?,
    })
}

/// Fixed-width RFC 3339 so that text ordering is chronological.
fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone; it is UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                format!("bad timestamp '{raw}': {e}").into(),
            )
        })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> DbResult<Option<T>>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> DbResult<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
