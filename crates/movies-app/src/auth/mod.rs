use axum::extract::FromRequestParts;
use http::{request::Parts, StatusCode};
use movies_dal::Caller;
use movies_types::claim::ApiClaim;
use uuid::Uuid;

use crate::state::AppState;

pub mod token;

/// Id of authenticated user, rejects anonymous requests with 401
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ApiClaim>()
            .and_then(ApiClaim::user_id)
            .map(CurrentUser)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ApiClaim>()
            .and_then(ApiClaim::user_id)
            .into())
    }
}
