use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ProgressEntry, PublicUser, SessionItem};

// -- JWT Claims --

/// Session token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    pub ui_language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: PublicUser,
    pub token: String,
}

// -- Account --

#[derive(Debug, Default, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Username + password re-entered before destructive account actions.
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmIdentityRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUiLanguageRequest {
    pub ui_language: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: PublicUser,
}

impl UserResponse {
    pub fn ok(user: PublicUser) -> Self {
        Self { success: true, user }
    }
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

impl AckResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: PublicUser,
    pub points_to_next_level: Option<u32>,
}

// -- Lessons --

#[derive(Debug, Deserialize)]
pub struct SubmitLessonRequest {
    pub score: u32,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub lesson_id: String,
    pub items: Vec<SessionItem>,
    pub started_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
}

/// Result of answering one session item. When the countdown had already
/// run out, `finished` carries the auto-finished result instead.
#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub correct: bool,
    pub points_awarded: u32,
    pub accumulated_points: u32,
    pub remaining_items: usize,
    pub finished: Option<FinishResponse>,
}

#[derive(Debug, Serialize)]
pub struct FinishResponse {
    pub success: bool,
    pub accumulated_points: u32,
    pub time_bonus: u32,
    pub final_score: u32,
    pub auto_finished: bool,
    pub user: PublicUser,
}

// -- Admin --

#[derive(Debug, Deserialize)]
pub struct SetStatsRequest {
    pub points: u32,
    pub level: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub success: bool,
    pub progress: ProgressEntry,
}
