use axum::{Extension, Json, extract::State};
use langify_db::{
    Backend,
    models::{NewUser, UserRow, UserUpdate},
};
use langify_engine::points_to_next_level;
use langify_types::{
    SUPPORTED_UI_LANGUAGES,
    api::{
        AckResponse, ChangePasswordRequest, Claims, ConfirmIdentityRequest, LoginRequest,
        ProfileResponse, RegisterRequest, UpdateUiLanguageRequest, UserResponse,
    },
    models::PublicUser,
};
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::state::{AppState, AppStateInner, blocking};

pub const MAX_USERNAME_LEN: usize = 32;

pub fn register(app: &AppStateInner, req: RegisterRequest) -> ApiResult<PublicUser> {
    if req.username.trim().is_empty() || req.password.is_empty() || req.confirm_password.is_empty()
    {
        return Err(ApiError::validation(
            "Username, password and password confirmation are required.",
        ));
    }
    if req.username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::validation(format!(
            "Username must be at most {MAX_USERNAME_LEN} characters."
        )));
    }
    if req.password != req.confirm_password {
        return Err(ApiError::validation("Passwords do not match."));
    }
    let ui_language = match req.ui_language {
        Some(code) if !code.is_empty() => {
            validate_ui_language(&code)?;
            Some(code)
        }
        _ => None,
    };

    // Skip the hash when the name is obviously taken.
    if app.db.with_conn(|b| b.user_by_username(&req.username))?.is_some() {
        return Err(ApiError::Conflict);
    }

    let password_hash = app.passwords.hash(&req.password)?;
    let user = app.db.transaction(|b| {
        if b.user_by_username(&req.username)?.is_some() {
            return Err(ApiError::Conflict);
        }
        Ok(b.insert_user(NewUser {
            username: req.username,
            password_hash,
            ui_language,
        })?)
    })?;

    info!("Registered user {}", user.username);
    Ok(user.to_public())
}

pub fn login(app: &AppStateInner, req: LoginRequest) -> ApiResult<PublicUser> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Username and password are required."));
    }
    let user = app
        .db
        .with_conn(|b| b.user_by_username(&req.username))?
        .ok_or(ApiError::InvalidCredentials)?;

    if !app.passwords.verify(&req.password, &user.password_hash)? {
        debug!("Failed login for {}", req.username);
        return Err(ApiError::InvalidCredentials);
    }
    Ok(user.to_public())
}

pub fn change_password(
    app: &AppStateInner,
    user_id: &str,
    req: ChangePasswordRequest,
) -> ApiResult<()> {
    if req.current_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::validation(
            "Current and new password are required.",
        ));
    }

    let user = app
        .db
        .with_conn(|b| b.user_by_id(user_id))?
        .ok_or(ApiError::NotFound("User"))?;
    if !app.passwords.verify(&req.current_password, &user.password_hash)? {
        return Err(ApiError::WrongPassword);
    }

    let hash = app.passwords.hash(&req.new_password)?;
    app.db
        .with_conn(|b| b.update_user(user_id, &UserUpdate::new().password_hash(hash)))?;
    info!("Password changed for {}", user.username);
    Ok(())
}

pub fn delete_account(
    app: &AppStateInner,
    user_id: &str,
    req: ConfirmIdentityRequest,
) -> ApiResult<()> {
    let confirmed = confirm_identity(app, user_id, &req)?;
    app.db.transaction(|b| {
        still_current(&*b, &confirmed)?;
        delete_cascade(b, user_id)
    })?;
    info!("Deleted account {}", confirmed.username);
    Ok(())
}

pub fn reset_progress(
    app: &AppStateInner,
    user_id: &str,
    req: ConfirmIdentityRequest,
) -> ApiResult<PublicUser> {
    let confirmed = confirm_identity(app, user_id, &req)?;
    let user = app.db.transaction(|b| {
        still_current(&*b, &confirmed)?;
        reset_cascade(b, user_id)
    })?;
    info!("Reset progress for {}", user.username);
    Ok(user.to_public())
}

pub fn update_ui_language(app: &AppStateInner, user_id: &str, code: &str) -> ApiResult<PublicUser> {
    validate_ui_language(code)?;
    let user = app.db.transaction(|b| {
        b.update_user(user_id, &UserUpdate::new().ui_language(code))?;
        b.user_by_id(user_id)?.ok_or(ApiError::NotFound("User"))
    })?;
    Ok(user.to_public())
}

pub fn profile(app: &AppStateInner, user_id: &str) -> ApiResult<ProfileResponse> {
    let user = app
        .db
        .with_conn(|b| b.user_by_id(user_id))?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(ProfileResponse {
        points_to_next_level: points_to_next_level(user.points),
        user: user.to_public(),
    })
}

pub fn validate_ui_language(code: &str) -> ApiResult<()> {
    if SUPPORTED_UI_LANGUAGES.contains(&code) {
        Ok(())
    } else {
        Err(ApiError::validation(format!(
            "Unsupported interface language '{code}'."
        )))
    }
}

/// Demo accounts for local development. Existing usernames are left alone,
/// so running this on every start is harmless. Returns how many were created.
pub fn seed_demo_accounts(app: &AppStateInner, admin_password: &str) -> ApiResult<usize> {
    let demo = [
        ("alice", "password123", 150, false),
        ("bob", "securepass", 200, false),
        ("charlie", "testpass", 80, false),
        ("admin", admin_password, 0, true),
    ];

    let mut created = 0;
    for (username, password, points, is_admin) in demo {
        if app.db.with_conn(|b| b.user_by_username(username))?.is_some() {
            continue;
        }
        let password_hash = app.passwords.hash(password)?;
        app.db.transaction(|b| {
            let user = b.insert_user(NewUser {
                username: username.to_string(),
                password_hash,
                ui_language: None,
            })?;
            b.update_user(&user.id, &UserUpdate::new().points(points).admin(is_admin))?;
            Ok::<_, ApiError>(())
        })?;
        created += 1;
    }

    if created > 0 {
        info!("Seeded {} demo accounts", created);
    }
    Ok(created)
}

/// The caller already holds a session, but destructive actions still need
/// the username and password re-entered. The hash check runs without the
/// store lock; pair it with [`still_current`] inside the transaction.
fn confirm_identity(
    app: &AppStateInner,
    user_id: &str,
    req: &ConfirmIdentityRequest,
) -> ApiResult<UserRow> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Username and password are required."));
    }
    let user = app
        .db
        .with_conn(|b| b.user_by_id(user_id))?
        .ok_or(ApiError::NotFound("User"))?;
    if user.username != req.username || !app.passwords.verify(&req.password, &user.password_hash)? {
        return Err(ApiError::InvalidCredentials);
    }
    Ok(user)
}

/// Fails if the confirmed credentials changed between verification and the
/// transaction, e.g. a concurrent password change.
fn still_current(b: &dyn Backend, confirmed: &UserRow) -> ApiResult<()> {
    let user = b.user_by_id(&confirmed.id)?.ok_or(ApiError::NotFound("User"))?;
    if user.username != confirmed.username || user.password_hash != confirmed.password_hash {
        return Err(ApiError::InvalidCredentials);
    }
    Ok(())
}

/// Progress, then history, then the user row.
pub(crate) fn delete_cascade(b: &mut dyn Backend, user_id: &str) -> ApiResult<()> {
    let progress = b.delete_progress_for_user(user_id)?;
    let history = b.delete_history_for_user(user_id)?;
    b.delete_user(user_id)?;
    debug!(
        "Cascade removed {} progress and {} history rows",
        progress, history
    );
    Ok(())
}

pub(crate) fn reset_cascade(b: &mut dyn Backend, user_id: &str) -> ApiResult<UserRow> {
    b.user_by_id(user_id)?.ok_or(ApiError::NotFound("User"))?;
    b.delete_progress_for_user(user_id)?;
    b.delete_history_for_user(user_id)?;
    b.update_user(user_id, &UserUpdate::reset_progression())?;
    b.user_by_id(user_id)?.ok_or(ApiError::NotFound("User"))
}

// -- Handlers --

pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = blocking(&state, move |app| profile(app, &claims.sub)).await?;
    Ok(Json(profile))
}

pub async fn post_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> ApiResult<Json<AckResponse>> {
    blocking(&state, move |app| change_password(app, &claims.sub, req)).await?;
    Ok(Json(AckResponse::ok("Password updated.")))
}

pub async fn put_ui_language(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<UpdateUiLanguageRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = blocking(&state, move |app| {
        update_ui_language(app, &claims.sub, &req.ui_language)
    })
    .await?;
    Ok(Json(UserResponse::ok(user)))
}

pub async fn post_reset(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<ConfirmIdentityRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = blocking(&state, move |app| reset_progress(app, &claims.sub, req)).await?;
    Ok(Json(UserResponse::ok(user)))
}

pub async fn post_delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<ConfirmIdentityRequest>,
) -> ApiResult<Json<AckResponse>> {
    let user_id = claims.sub.clone();
    blocking(&state, move |app| delete_account(app, &user_id, req)).await?;
    state.sessions.drop_user(&claims.sub).await;
    Ok(Json(AckResponse::ok("Account deleted.")))
}

#[cfg(test)]
mod tests {
    use langify_db::Database;
    use langify_types::models::{HistoryEntry, ProgressEntry};

    use super::*;
    use crate::password::Passwords;

    fn app() -> AppStateInner {
        AppStateInner::new(Database::in_memory().unwrap(), "test-secret")
            .with_passwords(Passwords::low_cost())
    }

    fn register_req(username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            password: password.into(),
            confirm_password: password.into(),
            ui_language: None,
        }
    }

    fn login_req(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.into(),
            password: password.into(),
        }
    }

    fn confirm(username: &str, password: &str) -> ConfirmIdentityRequest {
        ConfirmIdentityRequest {
            username: username.into(),
            password: password.into(),
        }
    }

    #[test]
    fn register_then_login() {
        let app = app();
        let user = register(&app, register_req("maria", "s3cret")).unwrap();
        assert_eq!(user.points, 0);
        assert_eq!(user.level, 1);
        assert_eq!(user.current_streak, 0);
        assert_eq!(user.last_lesson_completed_at, None);
        assert_eq!(user.ui_language, "en");
        assert!(!user.is_admin);

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));

        let logged_in = login(&app, login_req("maria", "s3cret")).unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(matches!(
            login(&app, login_req("maria", "S3cret")),
            Err(ApiError::InvalidCredentials)
        ));
    }

    #[test]
    fn login_requires_both_fields() {
        let app = app();
        register(&app, register_req("maria", "s3cret")).unwrap();
        for req in [login_req("", "s3cret"), login_req("maria", ""), login_req("", "")] {
            let err = login(&app, req).unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
            assert_eq!(err.to_string(), "Username and password are required.");
        }
    }

    #[test]
    fn unknown_user_and_bad_password_look_the_same() {
        let app = app();
        register(&app, register_req("maria", "s3cret")).unwrap();
        let unknown = login(&app, login_req("nobody", "s3cret")).unwrap_err();
        let wrong = login(&app, login_req("maria", "nope")).unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn register_validation() {
        let app = app();
        let mut req = register_req("", "pw");
        assert!(matches!(register(&app, req), Err(ApiError::Validation(_))));

        req = register_req("maria", "pw");
        req.confirm_password = "other".into();
        assert!(matches!(register(&app, req), Err(ApiError::Validation(_))));

        req = register_req(&"x".repeat(MAX_USERNAME_LEN + 1), "pw");
        assert!(matches!(register(&app, req), Err(ApiError::Validation(_))));

        req = register_req("maria", "pw");
        req.ui_language = Some("de".into());
        assert!(matches!(register(&app, req), Err(ApiError::Validation(_))));

        req = register_req("maria", "pw");
        req.ui_language = Some("it".into());
        assert_eq!(register(&app, req).unwrap().ui_language, "it");
    }

    #[test]
    fn duplicate_username_conflicts_case_sensitively() {
        let app = app();
        register(&app, register_req("maria", "pw")).unwrap();
        assert!(matches!(
            register(&app, register_req("maria", "pw2")),
            Err(ApiError::Conflict)
        ));
        assert!(register(&app, register_req("Maria", "pw")).is_ok());
    }

    #[test]
    fn change_password_flow() {
        let app = app();
        let user = register(&app, register_req("maria", "old")).unwrap();

        let wrong = ChangePasswordRequest {
            current_password: "bad".into(),
            new_password: "new".into(),
        };
        assert!(matches!(
            change_password(&app, &user.id, wrong),
            Err(ApiError::WrongPassword)
        ));

        let missing = ChangePasswordRequest {
            current_password: "old".into(),
            new_password: "new".into(),
        };
        assert!(matches!(
            change_password(&app, "no-such-user", missing),
            Err(ApiError::NotFound("User"))
        ));

        let ok = ChangePasswordRequest {
            current_password: "old".into(),
            new_password: "new".into(),
        };
        change_password(&app, &user.id, ok).unwrap();
        assert!(login(&app, login_req("maria", "old")).is_err());
        assert!(login(&app, login_req("maria", "new")).is_ok());
    }

    fn give_activity(app: &AppStateInner, user_id: &str) {
        app.db
            .with_conn(|b| {
                b.upsert_progress(&ProgressEntry {
                    user_id: user_id.into(),
                    lesson_id: "lesson-1".into(),
                    completed: true,
                    score: 35,
                })?;
                b.insert_history(&HistoryEntry {
                    user_id: user_id.into(),
                    timestamp: chrono::Utc::now(),
                    points: 35,
                    level: 1,
                })?;
                b.update_user(user_id, &UserUpdate::new().points(135).streak(3, Some(chrono::Utc::now())))
            })
            .unwrap();
    }

    #[test]
    fn delete_cascades_and_blocks_login() {
        let app = app();
        let user = register(&app, register_req("maria", "pw")).unwrap();
        give_activity(&app, &user.id);

        assert!(matches!(
            delete_account(&app, &user.id, confirm("Maria", "pw")),
            Err(ApiError::InvalidCredentials)
        ));
        assert!(matches!(
            delete_account(&app, &user.id, confirm("maria", "bad")),
            Err(ApiError::InvalidCredentials)
        ));

        delete_account(&app, &user.id, confirm("maria", "pw")).unwrap();

        app.db
            .with_conn(|b| {
                assert!(b.user_by_id(&user.id)?.is_none());
                assert!(b.history_for_user(&user.id)?.is_empty());
                assert!(b.progress_for_language(&user.id, "lang-1")?.is_empty());
                Ok::<_, langify_db::DbError>(())
            })
            .unwrap();
        assert!(matches!(
            login(&app, login_req("maria", "pw")),
            Err(ApiError::InvalidCredentials)
        ));
        assert!(matches!(
            delete_account(&app, &user.id, confirm("maria", "pw")),
            Err(ApiError::NotFound("User"))
        ));
    }

    #[test]
    fn password_change_after_confirmation_invalidates_it() {
        let app = app();
        let user = register(&app, register_req("maria", "pw")).unwrap();

        let confirmed = confirm_identity(&app, &user.id, &confirm("maria", "pw")).unwrap();
        app.db
            .transaction(|b| still_current(&*b, &confirmed))
            .unwrap();

        change_password(
            &app,
            &user.id,
            ChangePasswordRequest {
                current_password: "pw".into(),
                new_password: "pw2".into(),
            },
        )
        .unwrap();
        assert!(matches!(
            app.db.transaction(|b| still_current(&*b, &confirmed)),
            Err(ApiError::InvalidCredentials)
        ));
        assert!(matches!(
            confirm_identity(&app, &user.id, &confirm("maria", "")),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn reset_clears_progression_but_keeps_account() {
        let app = app();
        let user = register(&app, register_req("maria", "pw")).unwrap();
        give_activity(&app, &user.id);

        let reset = reset_progress(&app, &user.id, confirm("maria", "pw")).unwrap();
        assert_eq!(reset.points, 0);
        assert_eq!(reset.level, 1);
        assert_eq!(reset.current_streak, 0);
        assert_eq!(reset.last_lesson_completed_at, None);

        app.db
            .with_conn(|b| {
                assert!(b.history_for_user(&user.id)?.is_empty());
                assert!(b.progress(&user.id, "lesson-1")?.is_none());
                Ok::<_, langify_db::DbError>(())
            })
            .unwrap();
        assert!(login(&app, login_req("maria", "pw")).is_ok());
    }

    #[test]
    fn ui_language_and_profile() {
        let app = app();
        let user = register(&app, register_req("maria", "pw")).unwrap();

        assert_eq!(update_ui_language(&app, &user.id, "it").unwrap().ui_language, "it");
        assert!(matches!(
            update_ui_language(&app, &user.id, "fr"),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            update_ui_language(&app, "ghost", "en"),
            Err(ApiError::NotFound(_))
        ));

        let p = profile(&app, &user.id).unwrap();
        assert_eq!(p.points_to_next_level, Some(100));
    }

    #[test]
    fn demo_seeding_is_idempotent() {
        let app = app();
        assert_eq!(seed_demo_accounts(&app, "adminpass").unwrap(), 4);
        assert_eq!(seed_demo_accounts(&app, "adminpass").unwrap(), 0);

        let bob = login(&app, login_req("bob", "securepass")).unwrap();
        assert_eq!((bob.points, bob.level), (200, 3));
        let charlie = login(&app, login_req("charlie", "testpass")).unwrap();
        assert_eq!((charlie.points, charlie.level), (80, 1));
        assert!(login(&app, login_req("admin", "adminpass")).unwrap().is_admin);
    }
}
