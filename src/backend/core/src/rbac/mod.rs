//! Role-based access control for the housing API.
//!
//! This module provides:
//! - **Models**: role flags, access requirements and decisions
//! - **Evaluator**: role predicates answered from the identity store
//! - **Gate**: token check, caller resolution and requirement enforcement
//! - **Authorization Middleware**: route layer for role-only requirements
//!
//! # Usage
//!
//! ```rust,ignore
//! use housing_core::rbac::{AccessEvaluator, AccessRequirement, AuthorizationGate};
//!
//! let gate = AuthorizationGate::new(tokens, AccessEvaluator::new(store));
//! let caller = gate.authenticate(headers.get("authorization"))?;
//! gate.enforce(&caller, &AccessRequirement::self_or_admin_write(&student_id)).await?;
//! ```

pub mod evaluator;
pub mod middleware;
pub mod models;
pub mod policy;

pub use evaluator::AccessEvaluator;
pub use middleware::{RequireAccessLayer, RequireAccessService};
pub use models::{AccessDecision, AccessRequirement, DenyReason, RoleFlags};
pub use policy::AuthorizationGate;
