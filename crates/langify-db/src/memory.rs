use std::collections::HashSet;

use chrono::Utc;
use langify_types::DEFAULT_UI_LANGUAGE;
use langify_types::models::{HistoryEntry, Language, Lesson, Notification, ProgressEntry};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{LessonContentRow, NewUser, UserRow, UserUpdate};
use crate::seed::ReferenceData;
use crate::{Backend, DbError, DbResult};

#[derive(Debug, Default)]
struct Collections {
    users: Vec<UserRow>,
    languages: Vec<Language>,
    lessons: Vec<Lesson>,
    lesson_content: Vec<LessonContentRow>,
    user_progress: Vec<ProgressEntry>,
    user_history: Vec<HistoryEntry>,
    notifications: Vec<Notification>,
}

/// Inverse of one write to a collection.
#[derive(Debug)]
enum Change<T> {
    Appended,
    Replaced(usize, T),
    /// Removed items with their original indices, ascending.
    Removed(Vec<(usize, T)>),
}

impl<T> Change<T> {
    fn revert(self, items: &mut Vec<T>) {
        match self {
            Change::Appended => {
                items.pop();
            }
            Change::Replaced(idx, old) => items[idx] = old,
            Change::Removed(removed) => {
                for (idx, item) in removed {
                    items.insert(idx, item);
                }
            }
        }
    }
}

#[derive(Debug)]
enum Undo {
    Users(Change<UserRow>),
    Progress(Change<ProgressEntry>),
    History(Change<HistoryEntry>),
}

/// Drains the items matching `pred`, remembering where each one was.
fn remove_where<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> Vec<(usize, T)> {
    let mut removed = Vec::new();
    let mut kept = Vec::with_capacity(items.len());
    for (idx, item) in std::mem::take(items).into_iter().enumerate() {
        if pred(&item) {
            removed.push((idx, item));
        } else {
            kept.push(item);
        }
    }
    *items = kept;
    removed
}

/// Vec-backed store. Inside a transaction every write journals its inverse;
/// `rollback` replays the journal backwards, so a transaction costs what it
/// touches rather than the size of the store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Collections,
    journal: Option<Vec<Undo>>,
    seeded: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, undo: Undo) {
        if let Some(journal) = &mut self.journal {
            journal.push(undo);
        }
    }
}

impl Backend for MemoryBackend {
    fn seed(&mut self, data: &ReferenceData) -> DbResult<()> {
        if self.seeded {
            debug!("Memory store already seeded");
            return Ok(());
        }
        self.data.languages = data.languages.clone();
        self.data.lessons = data.lessons.clone();
        self.data.lesson_content = data.content.clone();
        self.data.notifications = data.notifications.clone();
        self.seeded = true;

        info!(
            "Memory store seeded: {} languages, {} lessons, {} content items",
            data.languages.len(),
            data.lessons.len(),
            data.content.len()
        );
        Ok(())
    }

    fn begin(&mut self) -> DbResult<()> {
        self.journal = Some(Vec::new());
        Ok(())
    }

    fn commit(&mut self) -> DbResult<()> {
        self.journal = None;
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        let Some(journal) = self.journal.take() else {
            return Ok(());
        };
        for undo in journal.into_iter().rev() {
            match undo {
                Undo::Users(change) => change.revert(&mut self.data.users),
                Undo::Progress(change) => change.revert(&mut self.data.user_progress),
                Undo::History(change) => change.revert(&mut self.data.user_history),
            }
        }
        Ok(())
    }

    // -- Users --

    fn user_by_username(&self, username: &str) -> DbResult<Option<UserRow>> {
        Ok(self.data.users.iter().find(|u| u.username == username).cloned())
    }

    fn user_by_id(&self, id: &str) -> DbResult<Option<UserRow>> {
        Ok(self.data.users.iter().find(|u| u.id == id).cloned())
    }

    fn users_by_points(&self) -> DbResult<Vec<UserRow>> {
        let mut users = self.data.users.clone();
        // sort_by is stable, so equal points keep insertion order
        users.sort_by(|a, b| b.points.cmp(&a.points));
        Ok(users)
    }

    fn insert_user(&mut self, user: NewUser) -> DbResult<UserRow> {
        if self.data.users.iter().any(|u| u.username == user.username) {
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
            created_at: Utc::now(),
        };
        self.data.users.push(row.clone());
        self.record(Undo::Users(Change::Appended));
        Ok(row)
    }

    fn update_user(&mut self, id: &str, update: &UserUpdate) -> DbResult<()> {
        let idx = self
            .data
            .users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| DbError::not_found("user", id))?;
        let old = self.data.users[idx].clone();
        update.apply(&mut self.data.users[idx]);
        self.record(Undo::Users(Change::Replaced(idx, old)));
        Ok(())
    }

    fn delete_user(&mut self, id: &str) -> DbResult<()> {
        let idx = self
            .data
            .users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| DbError::not_found("user", id))?;
        let removed = self.data.users.remove(idx);
        self.record(Undo::Users(Change::Removed(vec![(idx, removed)])));
        Ok(())
    }

    // -- Reference data --

    fn languages(&self) -> DbResult<Vec<Language>> {
        Ok(self.data.languages.clone())
    }

    fn lessons_for_language(&self, language_id: &str) -> DbResult<Vec<Lesson>> {
        let mut lessons: Vec<Lesson> = self
            .data
            .lessons
            .iter()
            .filter(|l| l.language_id == language_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| l.order);
        Ok(lessons)
    }

    fn lesson_by_id(&self, id: &str) -> DbResult<Option<Lesson>> {
        Ok(self.data.lessons.iter().find(|l| l.id == id).cloned())
    }

    fn lesson_content(&self, lesson_id: &str) -> DbResult<Vec<LessonContentRow>> {
        Ok(self
            .data
            .lesson_content
            .iter()
            .filter(|c| c.lesson_id == lesson_id)
            .cloned()
            .collect())
    }

    fn notifications(&self) -> DbResult<Vec<Notification>> {
        let mut notifications = self.data.notifications.clone();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    // -- Progress --

    fn upsert_progress(&mut self, entry: &ProgressEntry) -> DbResult<()> {
        let progress = &mut self.data.user_progress;
        let change = match progress
            .iter()
            .position(|p| p.user_id == entry.user_id && p.lesson_id == entry.lesson_id)
        {
            Some(idx) => Change::Replaced(idx, std::mem::replace(&mut progress[idx], entry.clone())),
            None => {
                progress.push(entry.clone());
                Change::Appended
            }
        };
        self.record(Undo::Progress(change));
        Ok(())
    }

    fn mark_complete(&mut self, user_id: &str, lesson_id: &str) -> DbResult<ProgressEntry> {
        let progress = &mut self.data.user_progress;
        let (idx, change) = match progress
            .iter()
            .position(|p| p.user_id == user_id && p.lesson_id == lesson_id)
        {
            Some(idx) => (idx, Change::Replaced(idx, progress[idx].clone())),
            None => {
                progress.push(ProgressEntry {
                    user_id: user_id.to_string(),
                    lesson_id: lesson_id.to_string(),
                    completed: false,
                    score: 0,
                });
                (progress.len() - 1, Change::Appended)
            }
        };
        progress[idx].completed = true;
        let entry = progress[idx].clone();
        self.record(Undo::Progress(change));
        Ok(entry)
    }

    fn progress(&self, user_id: &str, lesson_id: &str) -> DbResult<Option<ProgressEntry>> {
        Ok(self
            .data
            .user_progress
            .iter()
            .find(|p| p.user_id == user_id && p.lesson_id == lesson_id)
            .cloned())
    }

    fn progress_for_language(&self, user_id: &str, language_id: &str) -> DbResult<Vec<ProgressEntry>> {
        let lesson_ids: HashSet<&str> = self
            .data
            .lessons
            .iter()
            .filter(|l| l.language_id == language_id)
            .map(|l| l.id.as_str())
            .collect();

        Ok(self
            .data
            .user_progress
            .iter()
            .filter(|p| p.user_id == user_id && lesson_ids.contains(p.lesson_id.as_str()))
            .cloned()
            .collect())
    }

    fn delete_progress_for_user(&mut self, user_id: &str) -> DbResult<usize> {
        let removed = remove_where(&mut self.data.user_progress, |p| p.user_id == user_id);
        let count = removed.len();
        self.record(Undo::Progress(Change::Removed(removed)));
        Ok(count)
    }

    // -- History --

    fn insert_history(&mut self, entry: &HistoryEntry) -> DbResult<()> {
        self.data.user_history.push(entry.clone());
        self.record(Undo::History(Change::Appended));
        Ok(())
    }

    fn history_for_user(&self, user_id: &str) -> DbResult<Vec<HistoryEntry>> {
        let mut history: Vec<HistoryEntry> = self
            .data
            .user_history
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        history.sort_by_key(|h| h.timestamp);
        Ok(history)
    }

    fn delete_history_for_user(&mut self, user_id: &str) -> DbResult<usize> {
        let removed = remove_where(&mut self.data.user_history, |h| h.user_id == user_id);
        let count = removed.len();
        self.record(Undo::History(Change::Removed(removed)));
        Ok(count)
    }
}
