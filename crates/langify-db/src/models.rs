//! Store row types. Users carry the password hash and content keeps its
//! payload as the raw JSON string, so neither maps 1:1 onto the API models.

use chrono::{DateTime, Utc};
use langify_engine::level_for_points;
use langify_types::models::{Content, LessonContentItem, PublicUser};
use serde_json::{Value, json};

use crate::{DbError, DbResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub points: u32,
    pub level: u32,
    pub current_streak: u32,
    pub last_lesson_completed_at: Option<DateTime<Utc>>,
    pub is_admin: bool,
    pub ui_language: String,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            points: self.points,
            level: self.level,
            current_streak: self.current_streak,
            last_lesson_completed_at: self.last_lesson_completed_at,
            is_admin: self.is_admin,
            ui_language: self.ui_language.clone(),
        }
    }
}

/// Registration input. The store assigns the id and zeroes progression.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub ui_language: Option<String>,
}

/// Partial update of a user row.
///
/// Points and level only travel together: `points()` derives the level, and
/// there is no way to set a level on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    progression: Option<(u32, u32)>,
    streak: Option<(u32, Option<DateTime<Utc>>)>,
    password_hash: Option<String>,
    ui_language: Option<String>,
    is_admin: Option<bool>,
}

impl UserUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points 0, level 1, streak 0, no last completion.
    pub fn reset_progression() -> Self {
        Self::new().points(0).streak(0, None)
    }

    pub fn points(mut self, points: u32) -> Self {
        self.progression = Some((points, level_for_points(points)));
        self
    }

    pub fn streak(mut self, streak: u32, last_completed_at: Option<DateTime<Utc>>) -> Self {
        self.streak = Some((streak, last_completed_at));
        self
    }

    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn ui_language(mut self, code: impl Into<String>) -> Self {
        self.ui_language = Some(code.into());
        self
    }

    pub fn admin(mut self, is_admin: bool) -> Self {
        self.is_admin = Some(is_admin);
        self
    }

    pub fn apply(&self, row: &mut UserRow) {
        if let Some((points, level)) = self.progression {
            row.points = points;
            row.level = level;
        }
        if let Some((streak, last)) = self.streak {
            row.current_streak = streak;
            row.last_lesson_completed_at = last;
        }
        if let Some(hash) = &self.password_hash {
            row.password_hash = hash.clone();
        }
        if let Some(code) = &self.ui_language {
            row.ui_language = code.clone();
        }
        if let Some(is_admin) = self.is_admin {
            row.is_admin = is_admin;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonContentRow {
    pub id: String,
    pub lesson_id: String,
    pub kind: String,
    pub data: String,
}

impl LessonContentRow {
    pub fn from_item(item: &LessonContentItem) -> DbResult<Self> {
        let value = serde_json::to_value(&item.content).map_err(|e| DbError::Corrupt(e.to_string()))?;
        let data = value.get("data").cloned().unwrap_or(Value::Null);
        Ok(Self {
            id: item.id.clone(),
            lesson_id: item.lesson_id.clone(),
            kind: item.content.kind().to_string(),
            data: data.to_string(),
        })
    }

    /// Parses the stored payload into its typed variant.
    pub fn parse(&self) -> DbResult<LessonContentItem> {
        let data: Value = serde_json::from_str(&self.data)
            .map_err(|e| DbError::Corrupt(format!("content {}: {}", self.id, e)))?;
        let content: Content = serde_json::from_value(json!({ "type": self.kind, "data": data }))
            .map_err(|e| DbError::Corrupt(format!("content {}: {}", self.id, e)))?;
        Ok(LessonContentItem {
            id: self.id.clone(),
            lesson_id: self.lesson_id.clone(),
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use langify_types::models::ChoiceData;

    fn row() -> UserRow {
        UserRow {
            id: "u1".into(),
            username: "alice".into(),
            password_hash: "secret-hash".into(),
            points: 0,
            level: 1,
            current_streak: 0,
            last_lesson_completed_at: None,
            is_admin: false,
            ui_language: "en".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn points_update_derives_level() {
        let mut user = row();
        UserUpdate::new().points(420).apply(&mut user);
        assert_eq!((user.points, user.level), (420, 5));

        UserUpdate::reset_progression().apply(&mut user);
        assert_eq!((user.points, user.level, user.current_streak), (0, 1, 0));
        assert_eq!(user.last_lesson_completed_at, None);
    }

    #[test]
    fn empty_update_changes_nothing() {
        let mut user = row();
        let before = user.clone();
        UserUpdate::new().apply(&mut user);
        assert_eq!(user, before);
    }

    #[test]
    fn public_view_has_no_hash() {
        let json = serde_json::to_string(&row().to_public()).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn content_row_round_trips_payload() {
        let item = LessonContentItem {
            id: "c1".into(),
            lesson_id: "lesson-1".into(),
            content: Content::MultipleChoice(ChoiceData {
                question: "What does 'Ciao' mean?".into(),
                options: vec!["Hello".into(), "Goodbye".into()],
                correct_answer: "Hello".into(),
                points_awarded: 10,
            }),
        };
        let row = LessonContentRow::from_item(&item).unwrap();
        assert_eq!(row.kind, "multiple_choice");
        assert!(!row.data.contains("multiple_choice"));
        assert_eq!(row.parse().unwrap(), item);
    }

    #[test]
    fn corrupt_payload_is_reported() {
        let row = LessonContentRow {
            id: "c9".into(),
            lesson_id: "l".into(),
            kind: "multiple_choice".into(),
            data: "{not json".into(),
        };
        assert!(matches!(row.parse(), Err(DbError::Corrupt(_))));
    }
}
