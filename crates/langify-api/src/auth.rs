use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use langify_types::api::{AuthResponse, LoginRequest, RegisterRequest};

use crate::accounts;
use crate::error::ApiResult;
use crate::extract::JsonBody;
use crate::middleware::create_token;
use crate::state::{AppState, blocking};

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = blocking(&state, move |app| accounts::register(app, req)).await?;
    let token = create_token(&state.jwt_secret, &user.id, &user.username)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            user,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = blocking(&state, move |app| accounts::login(app, req)).await?;
    let token = create_token(&state.jwt_secret, &user.id, &user.username)?;

    Ok(Json(AuthResponse {
        success: true,
        user,
        token,
    }))
}
