use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use rand_core::OsRng;
use tracing::{error, info, warn};
use uuid::Uuid;

use quill_types::api::{AuthResponse, LoginRequest, MeResponse, RegisterRequest};
use quill_types::models::UserProfile;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::{AppState, validate, with_db};

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;

    // Validate input
    validate::required("username", &req.username)?;
    validate::email(&req.email)?;
    validate::required("password", &req.password)?;

    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Upstream(e.to_string())
        })?
        .to_string();

    let user_id = Uuid::new_v4();

    // Unique username/email is enforced by the store and surfaces as a 400
    let id = user_id.to_string();
    let user = with_db(&state, move |db| db.create_user(&id, &username, &email, &password_hash))
        .await
        .inspect_err(|e| warn!("Registration rejected: {}", e))?;

    let token = issue_token(&state, user_id)?;
    info!("User {} registered", user.username);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserProfile {
                username: user.username,
                email: user.email,
            },
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let Json(req) = payload?;
    validate::required("email", &req.email)?;
    validate::required("password", &req.password)?;

    let email = req.email.trim().to_string();
    let user = with_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
        error!("Stored password hash for {} is unreadable: {}", user.id, e);
        ApiError::Upstream(e.to_string())
    })?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|_| ApiError::Upstream(format!("corrupt user id '{}'", user.id)))?;

    let token = issue_token(&state, user_id)?;
    info!("User {} logged in", user.username);

    Ok(Json(AuthResponse {
        token,
        user: UserProfile {
            username: user.username,
            email: user.email,
        },
    }))
}

/// GET /api/auth/me: identity resolved by the gate.
pub async fn me(Extension(user): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        id: user.id,
        username: user.username,
        email: user.email,
    })
}

fn issue_token(state: &AppState, user_id: Uuid) -> ApiResult<String> {
    state.tokens.issue(user_id).map_err(|e| {
        error!("Token signing failed: {}", e);
        ApiError::Upstream(e.to_string())
    })
}
