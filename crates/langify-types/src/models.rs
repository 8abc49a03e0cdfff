use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Users --

/// What the client is allowed to see about a user. Never carries the hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub points: u32,
    pub level: u32,
    pub current_streak: u32,
    pub last_lesson_completed_at: Option<DateTime<Utc>>,
    pub is_admin: bool,
    pub ui_language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: String,
    pub username: String,
    pub points: u32,
    pub level: u32,
}

impl From<&PublicUser> for LeaderboardEntry {
    fn from(user: &PublicUser) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            points: user.points,
            level: user.level,
        }
    }
}

// -- Reference data --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: String,
    pub name: String,
    pub code: String,
    pub flag: String,
}

/// Countdown configuration of a lesson. A disabled timer or a zero
/// duration both mean the lesson is untimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    pub enabled: bool,
    pub duration_secs: u32,
}

impl TimerConfig {
    pub fn untimed() -> Self {
        Self::default()
    }

    pub fn seconds(duration_secs: u32) -> Self {
        Self {
            enabled: true,
            duration_secs,
        }
    }

    pub fn is_timed(&self) -> bool {
        self.enabled && self.duration_secs > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub language_id: String,
    pub title: String,
    pub description: String,
    pub order: i32,
    pub timer: TimerConfig,
}

// -- Lesson content --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceData {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub points_awarded: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillInBlankData {
    pub sentence_before: String,
    pub blank_placeholder: String,
    pub sentence_after: String,
    pub correct_answer: String,
    pub points_awarded: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioChoiceData {
    pub audio_url: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub points_awarded: u32,
}

/// One gradeable prompt. Serialized as `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Content {
    MultipleChoice(ChoiceData),
    FillInBlank(FillInBlankData),
    AudioMultipleChoiceText(AudioChoiceData),
    AudioMultipleChoiceTranslation(AudioChoiceData),
}

impl Content {
    pub fn points_awarded(&self) -> u32 {
        match self {
            Self::MultipleChoice(d) => d.points_awarded,
            Self::FillInBlank(d) => d.points_awarded,
            Self::AudioMultipleChoiceText(d) | Self::AudioMultipleChoiceTranslation(d) => {
                d.points_awarded
            }
        }
    }

    pub fn correct_answer(&self) -> &str {
        match self {
            Self::MultipleChoice(d) => &d.correct_answer,
            Self::FillInBlank(d) => &d.correct_answer,
            Self::AudioMultipleChoiceText(d) | Self::AudioMultipleChoiceTranslation(d) => {
                &d.correct_answer
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::MultipleChoice(_) => "multiple_choice",
            Self::FillInBlank(_) => "fill_in_blank",
            Self::AudioMultipleChoiceText(_) => "audio_multiple_choice_text",
            Self::AudioMultipleChoiceTranslation(_) => "audio_multiple_choice_translation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContentItem {
    pub id: String,
    pub lesson_id: String,
    #[serde(flatten)]
    pub content: Content,
}

/// What a player sees of a content item during a session: the same shape as
/// [`Content`] without the correct answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Prompt {
    MultipleChoice {
        question: String,
        options: Vec<String>,
        points_awarded: u32,
    },
    FillInBlank {
        sentence_before: String,
        blank_placeholder: String,
        sentence_after: String,
        points_awarded: u32,
    },
    AudioMultipleChoiceText(AudioPrompt),
    AudioMultipleChoiceTranslation(AudioPrompt),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPrompt {
    pub audio_url: String,
    pub question: String,
    pub options: Vec<String>,
    pub points_awarded: u32,
}

impl From<&AudioChoiceData> for AudioPrompt {
    fn from(d: &AudioChoiceData) -> Self {
        Self {
            audio_url: d.audio_url.clone(),
            question: d.question.clone(),
            options: d.options.clone(),
            points_awarded: d.points_awarded,
        }
    }
}

impl From<&Content> for Prompt {
    fn from(content: &Content) -> Self {
        match content {
            Content::MultipleChoice(d) => Self::MultipleChoice {
                question: d.question.clone(),
                options: d.options.clone(),
                points_awarded: d.points_awarded,
            },
            Content::FillInBlank(d) => Self::FillInBlank {
                sentence_before: d.sentence_before.clone(),
                blank_placeholder: d.blank_placeholder.clone(),
                sentence_after: d.sentence_after.clone(),
                points_awarded: d.points_awarded,
            },
            Content::AudioMultipleChoiceText(d) => Self::AudioMultipleChoiceText(d.into()),
            Content::AudioMultipleChoiceTranslation(d) => {
                Self::AudioMultipleChoiceTranslation(d.into())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionItem {
    pub id: String,
    pub lesson_id: String,
    #[serde(flatten)]
    pub prompt: Prompt,
}

impl From<&LessonContentItem> for SessionItem {
    fn from(item: &LessonContentItem) -> Self {
        Self {
            id: item.id.clone(),
            lesson_id: item.lesson_id.clone(),
            prompt: (&item.content).into(),
        }
    }
}

// -- Progress --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub user_id: String,
    pub lesson_id: String,
    pub completed: bool,
    pub score: u32,
}

/// Snapshot of a user's points and level, appended on every completion
/// and every admin stats edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub points: u32,
    pub level: u32,
}

// -- Notifications --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Warning,
    Event,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Event => "event",
        }
    }

    /// Unknown kinds fall back to `Info`, which is how clients render them.
    pub fn parse(s: &str) -> Self {
        match s {
            "warning" => Self::Warning,
            "event" => Self::Event,
            _ => Self::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_serializes_with_type_and_data() {
        let item = LessonContentItem {
            id: "content-1".into(),
            lesson_id: "lesson-1".into(),
            content: Content::FillInBlank(FillInBlankData {
                sentence_before: "Sto ".into(),
                blank_placeholder: "...".into(),
                sentence_after: ".".into(),
                correct_answer: "bene".into(),
                points_awarded: 15,
            }),
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "fill_in_blank");
        assert_eq!(json["data"]["correct_answer"], "bene");
        assert_eq!(json["lesson_id"], "lesson-1");
        assert_eq!(item.content.kind(), "fill_in_blank");
        assert_eq!(item.content.points_awarded(), 15);
    }

    #[test]
    fn audio_variant_parses_from_client_shape() {
        let json = r#"{
            "id": "c", "lesson_id": "l", "type": "audio_multiple_choice_text",
            "data": {"audio_url": "/a.mp3", "question": "q", "options": ["a", "b"],
                     "correct_answer": "b", "points_awarded": 20}
        }"#;
        let item: LessonContentItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.content.correct_answer(), "b");
        assert!(matches!(item.content, Content::AudioMultipleChoiceText(_)));
    }

    #[test]
    fn session_items_hide_the_answer() {
        let item = LessonContentItem {
            id: "content-1".into(),
            lesson_id: "lesson-1".into(),
            content: Content::MultipleChoice(ChoiceData {
                question: "Ciao means?".into(),
                options: vec!["Hello".into(), "Thanks".into()],
                correct_answer: "Hello".into(),
                points_awarded: 10,
            }),
        };

        let json = serde_json::to_value(SessionItem::from(&item)).unwrap();
        assert_eq!(json["id"], "content-1");
        assert_eq!(json["type"], "multiple_choice");
        assert_eq!(json["data"]["question"], "Ciao means?");
        assert_eq!(json["data"]["points_awarded"], 10);
        assert!(json["data"].get("correct_answer").is_none());
        assert!(!json.to_string().contains("correct_answer"));

        let audio = Content::AudioMultipleChoiceTranslation(AudioChoiceData {
            audio_url: "/a.mp3".into(),
            question: "q".into(),
            options: vec!["a".into()],
            correct_answer: "a".into(),
            points_awarded: 20,
        });
        let json = serde_json::to_value(Prompt::from(&audio)).unwrap();
        assert_eq!(json["type"], "audio_multiple_choice_translation");
        assert_eq!(json["data"]["audio_url"], "/a.mp3");
        assert!(json["data"].get("correct_answer").is_none());
    }

    #[test]
    fn zero_duration_timer_is_untimed() {
        assert!(!TimerConfig::untimed().is_timed());
        assert!(!TimerConfig { enabled: true, duration_secs: 0 }.is_timed());
        assert!(!TimerConfig { enabled: false, duration_secs: 60 }.is_timed());
        assert!(TimerConfig::seconds(60).is_timed());
    }

    #[test]
    fn notification_kind_renames_to_type() {
        let n = Notification {
            id: "n1".into(),
            message: "hi".into(),
            kind: NotificationKind::Event,
            created_at: DateTime::default(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(NotificationKind::parse("bogus"), NotificationKind::Info);
    }
}
