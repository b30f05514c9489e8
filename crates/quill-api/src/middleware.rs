use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::ApiError;
use crate::{AppState, with_db};

/// Identity of the caller, attached to request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// Extract and validate the bearer token, then resolve it to a user.
///
/// Every failure is the same 401: missing header, wrong scheme, bad
/// signature, expired token, unknown user, or a failed lookup.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::Unauthenticated)?;

    let user_id = state.tokens.verify(bearer.token()).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::Unauthenticated
    })?;

    let id = user_id.to_string();
    let user = with_db(&state, move |db| db.get_user_by_id(&id))
        .await
        .map_err(|e| {
            error!("User lookup failed during auth: {}", e);
            ApiError::Unauthenticated
        })?
        .ok_or(ApiError::Unauthenticated)?;

    req.extensions_mut().insert(AuthUser {
        id: user_id,
        username: user.username,
        email: user.email,
    });
    Ok(next.run(req).await)
}
