use std::collections::HashMap;
use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, TimeDelta, Utc};
use langify_engine::{LessonSession, SessionError, SessionState};
use langify_types::{
    api::{AnswerRequest, AnswerResponse, Claims, FinishResponse, StartSessionResponse},
    models::SessionItem,
};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::lessons::{self, record_completion};
use crate::state::{AppState, blocking};

/// Untimed attempts with no activity for this long are discarded.
const IDLE_LIMIT_HOURS: i64 = 6;

struct ActiveSession {
    user_id: String,
    session: LessonSession,
    last_activity: DateTime<Utc>,
}

/// Lesson attempts in flight, keyed by session id. Each one belongs to the
/// user that started it; anyone else gets `NotFound`.
#[derive(Default)]
pub struct SessionRegistry {
    active: Mutex<HashMap<Uuid, ActiveSession>>,
}

impl SessionRegistry {
    pub async fn len(&self) -> usize {
        self.active.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Forgets every attempt of a user, e.g. after the account is deleted.
    pub async fn drop_user(&self, user_id: &str) -> usize {
        let mut active = self.active.lock().await;
        let before = active.len();
        active.retain(|_, s| s.user_id != user_id);
        before - active.len()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub auto_finished: usize,
    pub dropped: usize,
}

fn owned<'a>(
    active: &'a mut HashMap<Uuid, ActiveSession>,
    session_id: &Uuid,
    user_id: &str,
) -> ApiResult<&'a mut ActiveSession> {
    active
        .get_mut(session_id)
        .filter(|s| s.user_id == user_id)
        .ok_or(ApiError::NotFound("Session"))
}

pub async fn start(
    state: &AppState,
    user_id: &str,
    lesson_id: &str,
    now: DateTime<Utc>,
) -> ApiResult<StartSessionResponse> {
    let id = lesson_id.to_string();
    let (lesson, items) = blocking(state, move |app| {
        Ok((lessons::lesson(app, &id)?, lessons::lesson_content(app, &id)?))
    })
    .await?;
    if items.is_empty() {
        return Err(ApiError::validation("This lesson has no content yet."));
    }

    let session = LessonSession::start(
        lesson.id.clone(),
        items.iter().map(|i| i.content.clone()).collect(),
        lesson.timer,
        now,
    );
    let session_id = Uuid::new_v4();
    let response = StartSessionResponse {
        session_id: session_id.to_string(),
        lesson_id: lesson.id,
        items: items.iter().map(SessionItem::from).collect(),
        started_at: now,
        deadline: session.deadline(),
    };

    state.sessions.active.lock().await.insert(
        session_id,
        ActiveSession {
            user_id: user_id.to_string(),
            session,
            last_activity: now,
        },
    );
    info!("Session {} started on {}", session_id, response.lesson_id);
    Ok(response)
}

/// Grades the current item. An answer arriving after the deadline finishes
/// the attempt instead and reports the persisted result.
pub async fn answer(
    state: &AppState,
    user_id: &str,
    session_id: Uuid,
    answer: &str,
    now: DateTime<Utc>,
) -> ApiResult<AnswerResponse> {
    let mut active = state.sessions.active.lock().await;
    let entry = owned(&mut active, &session_id, user_id)?;

    if entry.session.tick(now).is_some() {
        let expired = active
            .remove(&session_id)
            .ok_or(ApiError::NotFound("Session"))?;
        drop(active);
        let finished = persist(state, expired, now).await?;
        return Ok(AnswerResponse {
            correct: false,
            points_awarded: 0,
            accumulated_points: finished.accumulated_points,
            remaining_items: 0,
            finished: Some(finished),
        });
    }

    let outcome = entry.session.answer(answer, now)?;
    entry.last_activity = now;
    Ok(AnswerResponse {
        correct: outcome.correct,
        points_awarded: outcome.points_awarded,
        accumulated_points: outcome.accumulated,
        remaining_items: outcome.remaining,
        finished: None,
    })
}

pub async fn finish(
    state: &AppState,
    user_id: &str,
    session_id: Uuid,
    now: DateTime<Utc>,
) -> ApiResult<FinishResponse> {
    let finished = {
        let mut active = state.sessions.active.lock().await;
        owned(&mut active, &session_id, user_id)?
            .session
            .finish(now)?;
        active
            .remove(&session_id)
            .ok_or(ApiError::NotFound("Session"))?
    };
    persist(state, finished, now).await
}

/// Writes a `Submitting` attempt through the regular completion path.
async fn persist(
    state: &AppState,
    mut finished: ActiveSession,
    now: DateTime<Utc>,
) -> ApiResult<FinishResponse> {
    let score = match finished.session.state() {
        SessionState::Submitting(score) => *score,
        _ => return Err(SessionError::NotSubmitting.into()),
    };
    let user_id = finished.user_id.clone();
    let lesson_id = finished.session.lesson_id().to_string();

    let result = blocking(state, move |app| {
        app.db.transaction(|b| {
            record_completion(b, &user_id, &lesson_id, score.total, now, &app.calendar)
        })
    })
    .await;

    match result {
        Ok(user) => {
            finished.session.complete()?;
            info!(
                "{} finished {}: {} points + {} bonus{}",
                user.username,
                finished.session.lesson_id(),
                score.accumulated,
                score.bonus,
                if score.auto_finished { " (time up)" } else { "" }
            );
            Ok(FinishResponse {
                success: true,
                accumulated_points: score.accumulated,
                time_bonus: score.bonus,
                final_score: score.total,
                auto_finished: score.auto_finished,
                user: user.to_public(),
            })
        }
        Err(e) => {
            finished.session.abort();
            warn!("Session for {} aborted: {}", finished.user_id, e);
            Err(e)
        }
    }
}

/// Auto-finishes timed attempts past their deadline and discards idle
/// untimed ones.
pub async fn sweep(state: &AppState, now: DateTime<Utc>) -> SweepOutcome {
    let idle_limit = TimeDelta::hours(IDLE_LIMIT_HOURS);
    let (expired, dropped) = {
        let mut active = state.sessions.active.lock().await;
        let before = active.len();
        active.retain(|_, s| s.session.deadline().is_some() || now - s.last_activity <= idle_limit);
        let dropped = before - active.len();

        let ids: Vec<Uuid> = active
            .iter_mut()
            .filter_map(|(id, s)| s.session.tick(now).map(|_| *id))
            .collect();
        let expired: Vec<ActiveSession> = ids.iter().filter_map(|id| active.remove(id)).collect();
        (expired, dropped)
    };

    let mut outcome = SweepOutcome {
        auto_finished: 0,
        dropped,
    };
    for session in expired {
        if persist(state, session, now).await.is_ok() {
            outcome.auto_finished += 1;
        }
    }
    outcome
}

/// Background task driving [`sweep`].
pub async fn run_expiry_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        interval.tick().await;

        let outcome = sweep(&state, Utc::now()).await;
        if outcome.auto_finished > 0 || outcome.dropped > 0 {
            info!(
                "Session sweep: auto-finished {}, dropped {} idle",
                outcome.auto_finished, outcome.dropped
            );
        }
    }
}

// -- Handlers --

pub async fn post_start(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<String>,
) -> ApiResult<(StatusCode, Json<StartSessionResponse>)> {
    let response = start(&state, &claims.sub, &lesson_id, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn post_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
    JsonBody(req): JsonBody<AnswerRequest>,
) -> ApiResult<Json<AnswerResponse>> {
    let response = answer(&state, &claims.sub, session_id, &req.answer, Utc::now()).await?;
    Ok(Json(response))
}

pub async fn post_finish(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<FinishResponse>> {
    let response = finish(&state, &claims.sub, session_id, Utc::now()).await?;
    Ok(Json(response))
}
