//! Authentication middleware.
//!
//! Features:
//! - Bearer token extraction from the `Authorization` header
//! - Token validation through the [`AuthorizationGate`]
//! - Caller context injection for handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use housing_core::middleware::auth::{AuthLayer, Caller};
//!
//! async fn whoami(caller: Caller) -> String {
//!     caller.username
//! }
//!
//! let app = Router::new()
//!     .route("/api/auth/access", get(whoami))
//!     .route_layer(AuthLayer::new(gate));
//! ```

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use uuid::Uuid;

use crate::auth::{AuthError, Claims};
use crate::error::HousingError;
use crate::rbac::AuthorizationGate;

// ═══════════════════════════════════════════════════════════════════════════════
// Caller Context
// ═══════════════════════════════════════════════════════════════════════════════

/// The authenticated caller attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Token subject
    pub username: String,

    /// Token issue time
    pub issued_at: Option<DateTime<Utc>>,

    /// Token expiration
    pub expires_at: Option<DateTime<Utc>>,

    /// Request ID for correlation
    pub request_id: String,
}

impl Caller {
    /// Create from validated token claims.
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
            username: claims.sub,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

/// Extract the token from a `Bearer` authorization value. The scheme is
/// matched case-insensitively.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|token| !token.is_empty())
}

fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer and Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication layer for Tower.
#[derive(Clone)]
pub struct AuthLayer {
    gate: AuthorizationGate,
}

impl AuthLayer {
    /// Create a new auth layer.
    pub fn new(gate: AuthorizationGate) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    gate: AuthorizationGate,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let gate = self.gate.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let headers = request.headers();
            let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

            match gate.authenticate(authorization) {
                Ok(caller) => {
                    let caller = match request_id(headers) {
                        Some(id) => caller.with_request_id(id),
                        None => caller,
                    };
                    request.extensions_mut().insert(caller);
                    inner.call(request).await
                }
                Err(e) => Ok(HousingError::from(e).into_response()),
            }
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Extractor
// ═══════════════════════════════════════════════════════════════════════════════

/// Extractor for the caller in handlers behind [`AuthLayer`].
#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = HousingError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| AuthError::MissingCredentials.into())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenService;
    use crate::rbac::AccessEvaluator;
    use crate::store::InMemoryStore;
    use axum::{http::StatusCode, routing::get, Router};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("BEARER abc"), Some("abc"));
        assert_eq!(bearer_token("BeArEr  abc "), Some("abc"));
        assert_eq!(bearer_token("Bearerabc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic dXNlcjpwdw=="), None);
        assert_eq!(bearer_token("abc.def.ghi"), None);
    }

    #[test]
    fn test_caller_from_claims() {
        let claims = Claims {
            sub: "alice".into(),
            iat: 1_700_000_000,
            exp: 1_700_003_600,
        };
        let caller = Caller::from_claims(claims).with_request_id("req-1");
        assert_eq!(caller.username, "alice");
        assert_eq!(caller.request_id, "req-1");
        assert_eq!(caller.expires_at.unwrap().timestamp(), 1_700_003_600);
    }

    fn app(tokens: Arc<TokenService>) -> Router {
        let gate = AuthorizationGate::new(
            tokens,
            AccessEvaluator::new(Arc::new(InMemoryStore::new())),
        );
        Router::new()
            .route("/whoami", get(|caller: Caller| async move { caller.username }))
            .route_layer(AuthLayer::new(gate))
    }

    #[tokio::test]
    async fn test_layer_injects_caller() {
        let tokens = Arc::new(TokenService::new("layer-test-secret").unwrap());
        let token = tokens.issue("alice").unwrap();

        let response = app(tokens)
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"alice");
    }

    #[tokio::test]
    async fn test_layer_rejects_missing_token() {
        let tokens = Arc::new(TokenService::new("layer-test-secret").unwrap());
        let response = app(tokens)
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
