use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{api::AppState, error::AppError, models::UserId};

/// The caller's identity, resolved from the request's session
///
/// Handlers that take this extractor never run for anonymous requests.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserId);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match state.sessions.resolve(&parts.headers).await? {
            Some(user_id) => Ok(AuthenticatedUser(user_id)),
            None => Err(AppError::Unauthenticated(
                "User is not authenticated".to_string(),
            )),
        }
    }
}
