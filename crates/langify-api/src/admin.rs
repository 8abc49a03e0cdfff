//! Operator tooling. Every route here sits behind `require_admin`.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use langify_db::models::UserUpdate;
use langify_engine::level_for_points;
use langify_types::{
    api::{ProgressResponse, SetStatsRequest, UserResponse},
    models::{HistoryEntry, ProgressEntry, PublicUser},
};
use tracing::info;

use crate::accounts::reset_cascade;
use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::state::{AppState, AppStateInner, blocking};

/// Flags a lesson completed without touching points. An existing row keeps
/// its score; a new one starts at zero.
pub fn mark_lesson_complete(
    app: &AppStateInner,
    user_id: &str,
    lesson_id: &str,
) -> ApiResult<ProgressEntry> {
    let entry = app.db.transaction(|b| {
        b.user_by_id(user_id)?.ok_or(ApiError::NotFound("User"))?;
        b.lesson_by_id(lesson_id)?.ok_or(ApiError::NotFound("Lesson"))?;
        Ok::<_, ApiError>(b.mark_complete(user_id, lesson_id)?)
    })?;
    info!("Admin marked {} complete for {}", lesson_id, user_id);
    Ok(entry)
}

pub fn add_streak_day(
    app: &AppStateInner,
    user_id: &str,
    now: DateTime<Utc>,
) -> ApiResult<PublicUser> {
    let user = app.db.transaction(|b| {
        let user = b.user_by_id(user_id)?.ok_or(ApiError::NotFound("User"))?;
        b.update_user(
            user_id,
            &UserUpdate::new().streak(user.current_streak.saturating_add(1), Some(now)),
        )?;
        b.user_by_id(user_id)?.ok_or(ApiError::NotFound("User"))
    })?;
    info!("Admin extended streak of {} to {}", user.username, user.current_streak);
    Ok(user.to_public())
}

/// Overrides points. A supplied level must agree with the points; the
/// change lands in the history like any other progression step.
pub fn set_points_and_level(
    app: &AppStateInner,
    user_id: &str,
    points: u32,
    level: Option<u32>,
    now: DateTime<Utc>,
) -> ApiResult<PublicUser> {
    let derived = level_for_points(points);
    if let Some(level) = level.filter(|&l| l != derived) {
        return Err(ApiError::validation(format!(
            "Level {level} does not match {points} points (expected level {derived})."
        )));
    }

    let user = app.db.transaction(|b| {
        b.update_user(user_id, &UserUpdate::new().points(points))?;
        let user = b.user_by_id(user_id)?.ok_or(ApiError::NotFound("User"))?;
        b.insert_history(&HistoryEntry {
            user_id: user_id.to_string(),
            timestamp: now,
            points: user.points,
            level: user.level,
        })?;
        Ok::<_, ApiError>(user)
    })?;
    info!("Admin set {} to {} points", user.username, user.points);
    Ok(user.to_public())
}

/// Same cascade as the self-service reset, minus identity confirmation.
pub fn reset_progress_unconditional(app: &AppStateInner, user_id: &str) -> ApiResult<PublicUser> {
    let user = app.db.transaction(|b| reset_cascade(b, user_id))?;
    info!("Admin reset progress for {}", user.username);
    Ok(user.to_public())
}

// -- Handlers --

pub async fn post_complete(
    State(state): State<AppState>,
    Path((user_id, lesson_id)): Path<(String, String)>,
) -> ApiResult<Json<ProgressResponse>> {
    let progress =
        blocking(&state, move |app| mark_lesson_complete(app, &user_id, &lesson_id)).await?;
    Ok(Json(ProgressResponse {
        success: true,
        progress,
    }))
}

pub async fn post_streak(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let user = blocking(&state, move |app| add_streak_day(app, &user_id, Utc::now())).await?;
    Ok(Json(UserResponse::ok(user)))
}

pub async fn put_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    JsonBody(req): JsonBody<SetStatsRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = blocking(&state, move |app| {
        set_points_and_level(app, &user_id, req.points, req.level, Utc::now())
    })
    .await?;
    Ok(Json(UserResponse::ok(user)))
}

pub async fn post_reset(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let user = blocking(&state, move |app| reset_progress_unconditional(app, &user_id)).await?;
    Ok(Json(UserResponse::ok(user)))
}
