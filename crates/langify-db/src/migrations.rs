use rusqlite::Connection;
use tracing::info;

use crate::DbResult;

pub fn run(conn: &Connection) -> DbResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                        TEXT PRIMARY KEY,
                username                  TEXT NOT NULL UNIQUE,
                password_hash             TEXT NOT NULL,
                points                    INTEGER NOT NULL DEFAULT 0,
                level                     INTEGER NOT NULL DEFAULT 1,
                current_streak            INTEGER NOT NULL DEFAULT 0,
                last_lesson_completed_at  TEXT,
                is_admin                  INTEGER NOT NULL DEFAULT 0,
                ui_language               TEXT NOT NULL DEFAULT 'en',
                created_at                TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_users_points ON users(points DESC);

            CREATE TABLE languages (
                id      TEXT PRIMARY KEY,
                name    TEXT NOT NULL,
                code    TEXT NOT NULL UNIQUE,
                flag    TEXT NOT NULL
            );

            CREATE TABLE lessons (
                id              TEXT PRIMARY KEY,
                language_id     TEXT NOT NULL REFERENCES languages(id),
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                sort_order      INTEGER NOT NULL,
                timer_enabled   INTEGER NOT NULL DEFAULT 0,
                timer_duration  INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_lessons_language ON lessons(language_id, sort_order);

            CREATE TABLE lesson_content (
                id          TEXT PRIMARY KEY,
                lesson_id   TEXT NOT NULL REFERENCES lessons(id),
                type        TEXT NOT NULL,
                data        TEXT NOT NULL
            );

            CREATE INDEX idx_lesson_content_lesson ON lesson_content(lesson_id);

            CREATE TABLE user_progress (
                user_id     TEXT NOT NULL REFERENCES users(id),
                lesson_id   TEXT NOT NULL REFERENCES lessons(id),
                completed   INTEGER NOT NULL DEFAULT 0,
                score       INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, lesson_id)
            );

            CREATE TABLE user_history (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id),
                timestamp   TEXT NOT NULL,
                points      INTEGER NOT NULL,
                level       INTEGER NOT NULL
            );

            CREATE INDEX idx_user_history_user ON user_history(user_id, timestamp);

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                message     TEXT NOT NULL,
                type        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
