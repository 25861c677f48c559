//! HTTP middleware for the housing API.
pub mod auth;

pub use auth::{bearer_token, AuthLayer, AuthService, Caller};
