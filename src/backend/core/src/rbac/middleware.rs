//! Axum authorization middleware for role-only requirements.
//!
//! This middleware reads the [`Caller`] injected by the auth middleware and
//! asks the [`AuthorizationGate`] whether the request may proceed. Requirements
//! that depend on the target resource's owner are enforced inside handlers.

use axum::{
    body::Body,
    extract::Request,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use super::models::AccessRequirement;
use super::policy::AuthorizationGate;
use crate::auth::AuthError;
use crate::error::HousingError;
use crate::middleware::auth::Caller;

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Layer that wraps services with an access requirement.
///
/// # Example
///
/// ```rust,ignore
/// let admin_routes = Router::new()
///     .route("/api/students", get(list_students))
///     .route_layer(RequireAccessLayer::new(gate.clone(), AccessRequirement::AdminRead));
/// ```
#[derive(Clone)]
pub struct RequireAccessLayer {
    gate: AuthorizationGate,
    requirement: AccessRequirement,
}

impl RequireAccessLayer {
    pub fn new(gate: AuthorizationGate, requirement: AccessRequirement) -> Self {
        Self { gate, requirement }
    }

    pub fn admin_read(gate: AuthorizationGate) -> Self {
        Self::new(gate, AccessRequirement::AdminRead)
    }

    pub fn admin_write(gate: AuthorizationGate) -> Self {
        Self::new(gate, AccessRequirement::AdminWrite)
    }
}

impl<S> Layer<S> for RequireAccessLayer {
    type Service = RequireAccessService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireAccessService {
            inner,
            gate: self.gate.clone(),
            requirement: self.requirement.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Service that enforces an access requirement per request.
#[derive(Clone)]
pub struct RequireAccessService<S> {
    inner: S,
    gate: AuthorizationGate,
    requirement: AccessRequirement,
}

impl<S> Service<Request<Body>> for RequireAccessService<S>
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

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let gate = self.gate.clone();
        let requirement = self.requirement.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(caller) = request.extensions().get::<Caller>().cloned() else {
                return Ok(HousingError::from(AuthError::MissingCredentials).into_response());
            };

            match gate.enforce(&caller, &requirement).await {
                Ok(()) => inner.call(request).await,
                Err(e) => Ok(e.into_response()),
            }
        })
    }
}
