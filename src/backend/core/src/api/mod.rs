//! REST API for the housing portal.
//!
//! # Routes
//!
//! Public:
//! - `GET  /health`, `GET /metrics`, `GET /api`
//! - `POST /api/auth/register/{user,admin,student}`
//! - `POST /api/auth/login`
//!
//! Bearer token required:
//! - `GET  /api/auth/access`, `PUT /api/auth/password`
//! - `GET  /api/students` (admin-read)
//! - `GET  /api/students/:student_id` (self or admin-read)
//! - `PUT  /api/students/:student_id` (self or admin-write)
//! - `PUT  /api/students/:student_id/{identity,set_hg,revoke_hg}` (admin-write)

mod auth;
mod handlers;
mod students;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    routing::{get, post, put},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::{CredentialHasher, TokenService};
use crate::error::HousingError;
use crate::middleware::auth::AuthLayer;
use crate::rbac::{AccessEvaluator, AuthorizationGate, RequireAccessLayer};
use crate::store::IdentityStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn IdentityStore>,
    pub hasher: Arc<CredentialHasher>,
    pub tokens: Arc<TokenService>,
    pub gate: AuthorizationGate,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        hasher: Arc<CredentialHasher>,
        tokens: Arc<TokenService>,
    ) -> Self {
        let gate = AuthorizationGate::new(tokens.clone(), AccessEvaluator::new(store.clone()));
        Self {
            store,
            hasher,
            tokens,
            gate,
            metrics: None,
        }
    }

    /// Serve `/metrics` from this Prometheus handle.
    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    pub fn evaluator(&self) -> &AccessEvaluator {
        self.gate.evaluator()
    }
}

/// Build the API router.
///
/// Authentication runs as a route layer on the protected routes, so unknown
/// paths answer 404 rather than 401. Role-only requirements are layered per
/// route group; owner checks happen in the handlers.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/api", get(handlers::index))
        .route("/api/auth/register/user", post(auth::register_user))
        .route("/api/auth/register/admin", post(auth::register_admin))
        .route("/api/auth/register/student", post(auth::register_student))
        .route("/api/auth/login", post(auth::login));

    let admin_read = Router::new()
        .route("/api/students", get(students::list_students))
        .route_layer(RequireAccessLayer::admin_read(state.gate.clone()));

    let admin_write = Router::new()
        .route(
            "/api/students/:student_id/identity",
            put(students::update_student_identity),
        )
        .route(
            "/api/students/:student_id/set_hg",
            put(students::set_house_guardian),
        )
        .route(
            "/api/students/:student_id/revoke_hg",
            put(students::revoke_house_guardian),
        )
        .route_layer(RequireAccessLayer::admin_write(state.gate.clone()));

    let caller_scoped = Router::new()
        .route("/api/auth/access", get(auth::access))
        .route("/api/auth/password", put(auth::change_password))
        .route(
            "/api/students/:student_id",
            get(students::get_student).put(students::update_student),
        );

    let protected = Router::new()
        .merge(admin_read)
        .merge(admin_write)
        .merge(caller_scoped)
        .route_layer(AuthLayer::new(state.gate.clone()));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// JSON body extractor whose rejections use the service error envelope.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HousingError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| HousingError::validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("test data");
        assert!(response.success);
        assert_eq!(response.data, "test data");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": "test data"}));
    }
}
