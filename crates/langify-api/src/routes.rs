use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;
use crate::{accounts, admin, auth, lessons, sessions};

async fn health() -> &'static str {
    "ok"
}

/// Full HTTP surface. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/languages", get(lessons::get_languages))
        .route("/languages/{language_id}/lessons", get(lessons::get_lessons))
        .route("/lessons/{lesson_id}/content", get(lessons::get_lesson_content))
        .route("/leaderboard", get(lessons::get_leaderboard))
        .route("/notifications", get(lessons::get_notifications));

    let protected_routes = Router::new()
        .route("/me", get(accounts::get_me))
        .route("/me/history", get(lessons::get_history))
        .route("/me/password", post(accounts::post_password))
        .route("/me/ui-language", put(accounts::put_ui_language))
        .route("/me/reset", post(accounts::post_reset))
        .route("/me/delete", post(accounts::post_delete))
        .route("/languages/{language_id}/progress", get(lessons::get_progress))
        .route("/lessons/{lesson_id}/submit", post(lessons::post_submit))
        .route("/lessons/{lesson_id}/sessions", post(sessions::post_start))
        .route("/sessions/{session_id}/answers", post(sessions::post_answer))
        .route("/sessions/{session_id}/finish", post(sessions::post_finish))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Layers run outside-in: authenticate first, then check the admin flag.
    let admin_routes = Router::new()
        .route(
            "/admin/users/{user_id}/lessons/{lesson_id}/complete",
            post(admin::post_complete),
        )
        .route("/admin/users/{user_id}/streak", post(admin::post_streak))
        .route("/admin/users/{user_id}/stats", put(admin::put_stats))
        .route("/admin/users/{user_id}/reset", post(admin::post_reset))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state)
}
