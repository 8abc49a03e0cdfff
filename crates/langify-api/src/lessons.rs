use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::{DateTime, FixedOffset, Utc};
use langify_db::{Backend, DbResult, models::UserRow, models::UserUpdate, query::Query};
use langify_engine::{max_score, update_streak_in};
use langify_types::{
    api::{Claims, SubmitLessonRequest, UserResponse},
    models::{
        HistoryEntry, Language, LeaderboardEntry, Lesson, LessonContentItem, Notification,
        ProgressEntry, PublicUser,
    },
};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::state::{AppState, AppStateInner, blocking};

pub fn languages(app: &AppStateInner) -> ApiResult<Vec<Language>> {
    Ok(app.db.query(Query::Languages)?.into_languages()?)
}

pub fn lessons(app: &AppStateInner, language_id: &str) -> ApiResult<Vec<Lesson>> {
    Ok(app
        .db
        .query(Query::LessonsForLanguage(language_id.to_string()))?
        .into_lessons()?)
}

pub fn lesson(app: &AppStateInner, lesson_id: &str) -> ApiResult<Lesson> {
    app.db
        .query(Query::LessonById(lesson_id.to_string()))?
        .into_lessons()?
        .pop()
        .ok_or(ApiError::NotFound("Lesson"))
}

/// Items of an existing lesson, with their payloads decoded.
pub fn lesson_content(app: &AppStateInner, lesson_id: &str) -> ApiResult<Vec<LessonContentItem>> {
    app.db.with_conn(|b| content_of(&*b, lesson_id))
}

fn content_of(b: &dyn Backend, lesson_id: &str) -> ApiResult<Vec<LessonContentItem>> {
    if b.lesson_by_id(lesson_id)?.is_none() {
        return Err(ApiError::NotFound("Lesson"));
    }
    let items = b
        .lesson_content(lesson_id)?
        .iter()
        .map(|row| row.parse())
        .collect::<DbResult<Vec<_>>>()?;
    Ok(items)
}

pub fn leaderboard(app: &AppStateInner) -> ApiResult<Vec<LeaderboardEntry>> {
    let users = app.db.query(Query::UsersByPoints)?.into_users()?;
    Ok(users
        .iter()
        .map(|u| LeaderboardEntry::from(&u.to_public()))
        .collect())
}

pub fn notifications(app: &AppStateInner) -> ApiResult<Vec<Notification>> {
    Ok(app.db.query(Query::Notifications)?.into_notifications()?)
}

pub fn user_progress(
    app: &AppStateInner,
    user_id: &str,
    language_id: &str,
) -> ApiResult<Vec<ProgressEntry>> {
    Ok(app
        .db
        .query(Query::ProgressForLanguage {
            user_id: user_id.to_string(),
            language_id: language_id.to_string(),
        })?
        .into_progress()?)
}

pub fn user_history(app: &AppStateInner, user_id: &str) -> ApiResult<Vec<HistoryEntry>> {
    Ok(app
        .db
        .query(Query::HistoryForUser(user_id.to_string()))?
        .into_history()?)
}

/// Records a finished lesson scored on the client. The score may not exceed
/// what the lesson can award, bonus included.
pub fn submit_lesson(
    app: &AppStateInner,
    user_id: &str,
    lesson_id: &str,
    score: u32,
    now: DateTime<Utc>,
) -> ApiResult<PublicUser> {
    let user = app.db.transaction(|b| {
        let lesson = b.lesson_by_id(lesson_id)?.ok_or(ApiError::NotFound("Lesson"))?;
        let items = content_of(&*b, lesson_id)?;
        let max = max_score(items.iter().map(|i| &i.content), &lesson.timer);
        if score > max {
            return Err(ApiError::validation(format!(
                "Score {score} exceeds the maximum of {max} for this lesson."
            )));
        }
        record_completion(b, user_id, lesson_id, score, now, &app.calendar)
    })?;
    Ok(user.to_public())
}

/// Points, derived level, streak, progress row and history point, applied
/// together. Callers run this inside a transaction.
pub(crate) fn record_completion(
    b: &mut dyn Backend,
    user_id: &str,
    lesson_id: &str,
    score: u32,
    now: DateTime<Utc>,
    calendar: &FixedOffset,
) -> ApiResult<UserRow> {
    let user = b.user_by_id(user_id)?.ok_or(ApiError::NotFound("User"))?;
    let streak = update_streak_in(
        user.current_streak,
        user.last_lesson_completed_at,
        now,
        calendar,
    );

    b.update_user(
        user_id,
        &UserUpdate::new()
            .points(user.points.saturating_add(score))
            .streak(streak.streak, Some(streak.last_completed_at)),
    )?;
    b.upsert_progress(&ProgressEntry {
        user_id: user_id.to_string(),
        lesson_id: lesson_id.to_string(),
        completed: true,
        score,
    })?;

    let updated = b.user_by_id(user_id)?.ok_or(ApiError::NotFound("User"))?;
    b.insert_history(&HistoryEntry {
        user_id: user_id.to_string(),
        timestamp: now,
        points: updated.points,
        level: updated.level,
    })?;

    debug!(
        "{} completed {} for {} points (total {}, level {}, streak {})",
        updated.username, lesson_id, score, updated.points, updated.level, updated.current_streak
    );
    Ok(updated)
}

// -- Handlers --

pub async fn get_languages(State(state): State<AppState>) -> ApiResult<Json<Vec<Language>>> {
    Ok(Json(blocking(&state, languages).await?))
}

pub async fn get_lessons(
    State(state): State<AppState>,
    Path(language_id): Path<String>,
) -> ApiResult<Json<Vec<Lesson>>> {
    let lessons = blocking(&state, move |app| lessons(app, &language_id)).await?;
    Ok(Json(lessons))
}

pub async fn get_lesson_content(
    State(state): State<AppState>,
    Path(lesson_id): Path<String>,
) -> ApiResult<Json<Vec<LessonContentItem>>> {
    let items = blocking(&state, move |app| lesson_content(app, &lesson_id)).await?;
    Ok(Json(items))
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    Ok(Json(blocking(&state, leaderboard).await?))
}

pub async fn get_notifications(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(blocking(&state, notifications).await?))
}

pub async fn get_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(language_id): Path<String>,
) -> ApiResult<Json<Vec<ProgressEntry>>> {
    let progress =
        blocking(&state, move |app| user_progress(app, &claims.sub, &language_id)).await?;
    Ok(Json(progress))
}

pub async fn get_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let history = blocking(&state, move |app| user_history(app, &claims.sub)).await?;
    Ok(Json(history))
}

pub async fn post_submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<String>,
    JsonBody(req): JsonBody<SubmitLessonRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = blocking(&state, move |app| {
        submit_lesson(app, &claims.sub, &lesson_id, req.score, Utc::now())
    })
    .await?;
    Ok(Json(UserResponse::ok(user)))
}
