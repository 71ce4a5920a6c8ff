use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

use super::{repo_types::User, services};
use crate::{error::AppError, state::AppState};

/// The authenticated caller, resolved from `Authorization: Bearer <token>`
/// before the handler runs.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Token is missing"))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Invalid Authorization header"))?;

        match services::validate(state, token).await {
            Ok(user) => Ok(CurrentUser(user)),
            // A deleted subject makes the token unusable, not the route missing.
            Err(AppError::NotFound(_)) => Err(AppError::unauthorized("User not found")),
            Err(e) => Err(e),
        }
    }
}
