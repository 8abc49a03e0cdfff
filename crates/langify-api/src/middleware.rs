use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use langify_types::api::Claims;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};

const TOKEN_LIFETIME_DAYS: i64 = 30;

pub fn create_token(secret: &str, user_id: &str, username: &str) -> ApiResult<String> {
    let exp = (Utc::now() + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))
}

pub fn verify_token(secret: &str, token: &str) -> ApiResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized)
}

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let claims = verify_token(&state.jwt_secret, token)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Must run after [`require_auth`]. The admin flag is read from the store on
/// every request, so revoking it takes effect without reissuing tokens.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or(ApiError::Unauthorized)?;

    let user_id = claims.sub.clone();
    let user = blocking(&state, move |app| {
        Ok(app.db.with_conn(|b| b.user_by_id(&user_id))?)
    })
    .await?;

    match user {
        Some(user) if user.is_admin => Ok(next.run(req).await),
        Some(user) => {
            warn!("Non-admin {} attempted an admin operation", user.username);
            Err(ApiError::Forbidden)
        }
        None => Err(ApiError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let token = create_token("secret", "user-1", "alice").unwrap();
        let claims = verify_token("secret", &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > Utc::now().timestamp() as usize);
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = create_token("secret", "user-1", "alice").unwrap();
        assert!(matches!(
            verify_token("other", &token),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            verify_token("secret", "garbage"),
            Err(ApiError::Unauthorized)
        ));
    }
}
