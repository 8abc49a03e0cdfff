use langify_types::models::{HistoryEntry, Language, Lesson, Notification, ProgressEntry};

use crate::models::{LessonContentRow, NewUser, UserRow, UserUpdate};
use crate::{Backend, DbError, DbResult};

/// Every store operation as data. Each variant names one operation and
/// carries its parameters, so "unsupported operation" cannot be expressed.
#[derive(Debug, Clone)]
pub enum Query {
    UserByUsername(String),
    UserById(String),
    UsersByPoints,
    InsertUser(NewUser),
    UpdateUser { id: String, update: UserUpdate },
    DeleteUser(String),
    Languages,
    LessonsForLanguage(String),
    LessonById(String),
    LessonContent(String),
    Notifications,
    UpsertProgress(ProgressEntry),
    MarkLessonComplete { user_id: String, lesson_id: String },
    ProgressForLanguage { user_id: String, language_id: String },
    InsertHistory(HistoryEntry),
    HistoryForUser(String),
}

#[derive(Debug)]
pub enum Rows {
    Users(Vec<UserRow>),
    Languages(Vec<Language>),
    Lessons(Vec<Lesson>),
    Content(Vec<LessonContentRow>),
    Notifications(Vec<Notification>),
    Progress(Vec<ProgressEntry>),
    History(Vec<HistoryEntry>),
    /// Write with nothing to return.
    Done,
}

impl Rows {
    pub fn into_users(self) -> DbResult<Vec<UserRow>> {
        match self {
            Self::Users(rows) => Ok(rows),
            _ => Err(DbError::UnexpectedRows { expected: "user" }),
        }
    }

    pub fn into_languages(self) -> DbResult<Vec<Language>> {
        match self {
            Self::Languages(rows) => Ok(rows),
            _ => Err(DbError::UnexpectedRows { expected: "language" }),
        }
    }

    pub fn into_lessons(self) -> DbResult<Vec<Lesson>> {
        match self {
            Self::Lessons(rows) => Ok(rows),
            _ => Err(DbError::UnexpectedRows { expected: "lesson" }),
        }
    }

    pub fn into_content(self) -> DbResult<Vec<LessonContentRow>> {
        match self {
            Self::Content(rows) => Ok(rows),
            _ => Err(DbError::UnexpectedRows { expected: "content" }),
        }
    }

    pub fn into_notifications(self) -> DbResult<Vec<Notification>> {
        match self {
            Self::Notifications(rows) => Ok(rows),
            _ => Err(DbError::UnexpectedRows { expected: "notification" }),
        }
    }

    pub fn into_progress(self) -> DbResult<Vec<ProgressEntry>> {
        match self {
            Self::Progress(rows) => Ok(rows),
            _ => Err(DbError::UnexpectedRows { expected: "progress" }),
        }
    }

    pub fn into_history(self) -> DbResult<Vec<HistoryEntry>> {
        match self {
            Self::History(rows) => Ok(rows),
            _ => Err(DbError::UnexpectedRows { expected: "history" }),
        }
    }
}

pub fn dispatch(backend: &mut dyn Backend, query: Query) -> DbResult<Rows> {
    let rows = match query {
        Query::UserByUsername(username) => {
            Rows::Users(backend.user_by_username(&username)?.into_iter().collect())
        }
        Query::UserById(id) => Rows::Users(backend.user_by_id(&id)?.into_iter().collect()),
        Query::UsersByPoints => Rows::Users(backend.users_by_points()?),
        Query::InsertUser(user) => Rows::Users(vec![backend.insert_user(user)?]),
        Query::UpdateUser { id, update } => {
            backend.update_user(&id, &update)?;
            Rows::Done
        }
        Query::DeleteUser(id) => {
            backend.delete_user(&id)?;
            Rows::Done
        }
        Query::Languages => Rows::Languages(backend.languages()?),
        Query::LessonsForLanguage(language_id) => {
            Rows::Lessons(backend.lessons_for_language(&language_id)?)
        }
        Query::LessonById(id) => Rows::Lessons(backend.lesson_by_id(&id)?.into_iter().collect()),
        Query::LessonContent(lesson_id) => Rows::Content(backend.lesson_content(&lesson_id)?),
        Query::Notifications => Rows::Notifications(backend.notifications()?),
        Query::UpsertProgress(entry) => {
            backend.upsert_progress(&entry)?;
            Rows::Done
        }
        Query::MarkLessonComplete { user_id, lesson_id } => {
            Rows::Progress(vec![backend.mark_complete(&user_id, &lesson_id)?])
        }
        Query::ProgressForLanguage {
            user_id,
            language_id,
        } => Rows::Progress(backend.progress_for_language(&user_id, &language_id)?),
        Query::InsertHistory(entry) => {
            backend.insert_history(&entry)?;
            Rows::Done
        }
        Query::HistoryForUser(user_id) => Rows::History(backend.history_for_user(&user_id)?),
    };
    Ok(rows)
}
