use std::{
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    extract::{FromRequestParts, Request},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use headers::{authorization::Bearer, Authorization, HeaderMapExt as _};
use http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode};
use movies_types::claim::{ApiClaim, Authorization as _, Policy, Role};
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::state::AppState;

impl FromRequestParts<AppState> for ApiClaim {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<ApiClaim>() {
            Some(claim) => Ok(claim.clone()),
            None => {
                debug!("No token found");
                Err(StatusCode::UNAUTHORIZED)
            }
        }
    }
}

/// Validates bearer token if present and stores its claim in request extensions.
///
/// Requests without token pass through as anonymous, invalid token is rejected with 401.
#[derive(Clone)]
pub struct TokenLayer {
    state: AppState,
}

impl TokenLayer {
    pub fn new(state: AppState) -> Self {
        TokenLayer { state }
    }
}

impl<S> Layer<S> for TokenLayer {
    type Service = TokenService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenService {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TokenService<S> {
    inner: S,
    state: AppState,
}

impl<S> TokenService<S> {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Option<ApiClaim>, StatusCode> {
        if !headers.contains_key(AUTHORIZATION) {
            return Ok(None);
        }
        let bearer = headers
            .typed_get::<Authorization<Bearer>>()
            .ok_or_else(|| {
                debug!("Authorization header is not bearer token");
                StatusCode::UNAUTHORIZED
            })?;
        let claim = self
            .state
            .tokens()
            .validate::<ApiClaim>(bearer.token())
            .map_err(|e| {
                warn!("Failed to validate token: {e}");
                StatusCode::UNAUTHORIZED
            })?;
        if claim.user_id().is_none() {
            warn!("Token subject {} is not user id", claim.sub);
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(Some(claim))
    }
}

impl<S> Service<Request> for TokenService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        match self.authenticate(req.headers()) {
            Ok(Some(claim)) => {
                req.extensions_mut().insert(claim);
            }
            Ok(None) => (),
            Err(status) => return Box::pin(futures::future::ready(Ok(status.into_response()))),
        }
        Box::pin(self.inner.call(req))
    }
}

/// Lets request through only if its claim has at least one of given roles.
///
/// Must be applied inside [`TokenLayer`]. Missing claim is 401, missing role 403.
#[derive(Clone)]
pub struct RequiredRolesLayer {
    roles: Arc<[Role]>,
}

impl RequiredRolesLayer {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        RequiredRolesLayer {
            roles: roles.into_iter().collect(),
        }
    }

    pub fn for_policy(policy: Policy) -> Self {
        Self::new(policy.roles().iter().copied())
    }
}

impl<S> Layer<S> for RequiredRolesLayer {
    type Service = RequiredRolesService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequiredRolesService {
            inner,
            roles: self.roles.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequiredRolesService<S> {
    inner: S,
    roles: Arc<[Role]>,
}

impl<S> Service<Request> for RequiredRolesService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let status = match req.extensions().get::<ApiClaim>() {
            None => Some(StatusCode::UNAUTHORIZED),
            Some(claim) if claim.has_any_role(self.roles.iter()) => None,
            Some(claim) => {
                debug!(
                    "User {} lacks any of required roles {:?}",
                    claim.sub, self.roles
                );
                Some(StatusCode::FORBIDDEN)
            }
        };
        match status {
            Some(status) => Box::pin(futures::future::ready(Ok(status.into_response()))),
            None => Box::pin(self.inner.call(req)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        routing::{delete, get},
        Router,
    };
    use movies_auth::token::TokenManager;
    use movies_dal::Caller;
    use tower::ServiceExt as _;
    use tracing_test::traced_test;
    use uuid::Uuid;

    use super::*;
    use crate::{auth::CurrentUser, state::AppConfig};

    async fn test_state() -> AppState {
        let pool = movies_dal::new_pool("sqlite::memory:").await.unwrap();
        let tokens = TokenManager::new("test secret", Duration::from_secs(600));
        AppState::new(AppConfig::default(), pool, tokens)
    }

    async fn whoami(caller: Caller) -> String {
        caller
            .user_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    async fn me(CurrentUser(id): CurrentUser) -> String {
        id.to_string()
    }

    fn router(state: AppState) -> Router<()> {
        Router::new()
            .route("/", delete(|| async { "deleted" }))
            .layer(RequiredRolesLayer::for_policy(Policy::Admin))
            .route("/", get(whoami))
            .route("/me", get(me))
            .layer(TokenLayer::new(state.clone()))
            .with_state(state)
    }

    fn token(state: &AppState, user: Uuid, roles: impl IntoIterator<Item = Role>) -> String {
        state
            .tokens()
            .issue(ApiClaim::new_expired(user.to_string(), roles))
            .unwrap()
    }

    async fn send(
        router: &Router<()>,
        method: &str,
        uri: &str,
        token: Option<&str>,
    ) -> (StatusCode, String) {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    #[traced_test]
    async fn test_anonymous_access() {
        let state = test_state().await;
        let router = router(state);

        let (status, body) = send(&router, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");

        let (status, _) = send(&router, "DELETE", "/", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&router, "GET", "/me", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_roles() {
        let state = test_state().await;
        let router = router(state.clone());
        let user = Uuid::new_v4();

        let trusted = token(&state, user, [Role::TrustedMember]);
        let (status, body) = send(&router, "GET", "/", Some(&trusted)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, user.to_string());
        let (status, _) = send(&router, "DELETE", "/", Some(&trusted)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = token(&state, user, [Role::Admin]);
        let (status, body) = send(&router, "DELETE", "/", Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "deleted");

        let (status, body) = send(&router, "GET", "/me", Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, user.to_string());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_invalid_token() {
        let state = test_state().await;
        let router = router(state);

        let (status, _) = send(&router, "GET", "/", Some("not.a.token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let foreign = TokenManager::new("other secret", Duration::from_secs(600))
            .issue(ApiClaim::new_expired(Uuid::new_v4().to_string(), [Role::Admin]))
            .unwrap();
        let (status, _) = send(&router, "DELETE", "/", Some(&foreign)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_subject_must_be_user_id() {
        let state = test_state().await;
        let router = router(state.clone());
        let token = state
            .tokens()
            .issue(ApiClaim::new_expired("operator", [Role::Admin]))
            .unwrap();
        let (status, _) = send(&router, "GET", "/", Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
