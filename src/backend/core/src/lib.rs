#![allow(clippy::result_large_err)]
//! # Housing Core
//!
//! Identity, token and role-based access control for the housing portal API.
//!
//! ## Architecture
//!
//! - **Auth**: Argon2id credential hashing and HS256 identity tokens
//! - **Store**: Identity store interface with in-memory and PostgreSQL adapters
//! - **RBAC**: Role flags from store membership, access requirements and the per-request gate
//! - **Middleware**: Bearer token authentication layer and caller extractor
//! - **API**: Registration, login, role lookup and student profile routes
//! - **Observability**: Structured logging, optional OTLP tracing and Prometheus metrics

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod rbac;
pub mod store;
pub mod validation;

pub use error::{ErrorCode, ErrorDetails, ErrorSeverity, HousingError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{build_router, ApiResponse, AppState};
    pub use crate::auth::{AuthError, Claims, CredentialHasher, TokenService};
    pub use crate::config::Config;
    pub use crate::error::{ErrorCode, ErrorDetails, ErrorSeverity, HousingError, Result};
    pub use crate::middleware::auth::{AuthLayer, Caller};
    pub use crate::rbac::{
        AccessDecision, AccessEvaluator, AccessRequirement, AuthorizationGate, DenyReason,
        RequireAccessLayer, RoleFlags,
    };
    pub use crate::store::{Collection, Document, IdentityStore, InMemoryStore, StoreError};
    pub use crate::validation::{Validate, ValidationErrors, ValidationResult};
}
