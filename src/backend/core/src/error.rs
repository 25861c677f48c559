//! Error handling for the housing access core.
//!
//! This module provides:
//! - A single service error type with a stable machine-readable code
//! - HTTP status code mapping for API responses
//! - User-safe messages kept apart from internal (log-only) messages
//! - Error logging by severity with tracing integration
//! - Metrics integration for error tracking
//!
//! # Usage
//!
//! ```rust,ignore
//! use housing_core::error::{HousingError, Result};
//!
//! async fn load(store: &dyn IdentityStore, id: &str) -> Result<Document> {
//!     store
//!         .find_identity_by_username(Collection::Students, id)
//!         .await?
//!         .ok_or_else(|| HousingError::not_found("student", id))
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::store::{Collection, StoreError};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for housing operations.
pub type Result<T> = std::result::Result<T, HousingError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes for API responses.
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication (4000-4049)
    MissingCredentials,
    InvalidToken,
    InvalidCredentials,

    // Authorization (4050-4099)
    PermissionDenied,

    // Validation (4100-4199)
    ValidationError,
    UsernameTaken,
    StudentAlreadyExists,

    // Lookup (4400-4499)
    RecordNotFound,

    // Store (2000-2099)
    StoreUnavailable,
    StoreQueryFailed,
    StoreWriteFailed,
    MalformedRecord,

    // Serialization (2200-2299)
    SerializationError,

    // Internal (9000-9099)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::MissingCredentials => 4000,
            Self::InvalidToken => 4001,
            Self::InvalidCredentials => 4002,

            Self::PermissionDenied => 4050,

            Self::ValidationError => 4100,
            Self::UsernameTaken => 4101,
            Self::StudentAlreadyExists => 4102,

            Self::RecordNotFound => 4400,

            Self::StoreUnavailable => 2000,
            Self::StoreQueryFailed => 2001,
            Self::StoreWriteFailed => 2002,
            Self::MalformedRecord => 2003,

            Self::SerializationError => 2200,

            Self::InternalError => 9000,
        }
    }

    /// Get the HTTP status code for this error.
    ///
    /// Permission denials answer 401 like authentication failures; clients of
    /// the housing API rely on that status.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::MissingCredentials
            | Self::InvalidToken
            | Self::InvalidCredentials
            | Self::PermissionDenied => StatusCode::UNAUTHORIZED,

            Self::ValidationError | Self::UsernameTaken | Self::StudentAlreadyExists => {
                StatusCode::BAD_REQUEST
            }

            Self::RecordNotFound => StatusCode::NOT_FOUND,

            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            Self::StoreQueryFailed
            | Self::StoreWriteFailed
            | Self::MalformedRecord
            | Self::SerializationError
            | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            4000..=4049 => "authentication",
            4050..=4099 => "authorization",
            4100..=4199 => "validation",
            4400..=4499 => "not_found",
            2000..=2099 => "store",
            2200..=2299 => "serialization",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller errors (bad input, bad credentials, denied access)
    Low,
    /// Operational issues
    Medium,
    /// System errors (store failures, corrupt records)
    High,
    /// Errors that prevent the service from working at all
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::MissingCredentials
            | ErrorCode::InvalidToken
            | ErrorCode::InvalidCredentials
            | ErrorCode::PermissionDenied
            | ErrorCode::ValidationError
            | ErrorCode::UsernameTaken
            | ErrorCode::StudentAlreadyExists
            | ErrorCode::RecordNotFound => Self::Low,

            ErrorCode::StoreQueryFailed
            | ErrorCode::StoreWriteFailed
            | ErrorCode::MalformedRecord
            | ErrorCode::SerializationError => Self::High,

            ErrorCode::StoreUnavailable | ErrorCode::InternalError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Related entity ID (username, student id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    fn is_empty(&self) -> bool {
        self.context.is_empty() && self.entity_id.is_none() && self.entity_type.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for the housing access core.
///
/// The user message is the only text that ever reaches a client. Causes from
/// the identity store or the crypto layer are kept in the internal message and
/// the source chain, which are only logged.
#[derive(Error, Debug)]
pub struct HousingError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to clients)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for HousingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl HousingError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::InternalError,
            "An internal error occurred",
            message,
        )
    }

    /// Create a not found error.
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        let entity_id = entity_id.into();
        Self::new(ErrorCode::RecordNotFound, "Item not found")
            .with_internal_message(format!("{} not found: {}", entity_type, entity_id))
            .with_details(ErrorDetails::new().with_entity(&entity_type, &entity_id))
    }

    /// The record an update was aimed at does not exist.
    pub fn target_not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        let entity_id = entity_id.into();
        Self::new(ErrorCode::RecordNotFound, "Target item not found")
            .with_internal_message(format!("{} not found for update: {}", entity_type, entity_id))
            .with_details(ErrorDetails::new().with_entity(&entity_type, &entity_id))
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Registration attempted with a username that already has an identity.
    pub fn username_taken(username: &str) -> Self {
        Self::new(ErrorCode::UsernameTaken, "Username is taken")
            .with_details(ErrorDetails::new().with_entity("user", username))
    }

    /// Student registration attempted for an existing student.
    pub fn student_already_exists(username: &str) -> Self {
        Self::new(ErrorCode::StudentAlreadyExists, "Student already exists")
            .with_details(ErrorDetails::new().with_entity("student", username))
    }

    /// Login with an unknown username or a wrong password.
    pub fn invalid_credentials() -> Self {
        Self::new(
            ErrorCode::InvalidCredentials,
            "Invalid username and/or password",
        )
    }

    /// The caller is authenticated but the access requirement is not met.
    pub fn permission_denied(username: &str, reason: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::PermissionDenied, "Permission denied", reason)
            .with_details(ErrorDetails::new().with_entity("user", username))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    /// Add internal message.
    pub fn with_internal_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = Some(message.into());
        self
    }

    /// Add context to details.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-friendly message.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Get the error details.
    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    details = ?self.details,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    internal_message = ?self.internal_message,
                    "Request rejected"
                );
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metrics
    // ─────────────────────────────────────────────────────────────────────────

    fn record_metrics(&self) {
        counter!(
            "housing_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Whether the request was successful (always false for errors)
    pub success: bool,

    /// Error information
    pub error: ErrorInfo,
}

/// Detailed error information for API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code
    pub numeric_code: u32,

    /// User-friendly error message
    pub message: String,

    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&HousingError> for ErrorResponse {
    fn from(error: &HousingError) -> Self {
        // Store and internal failures never describe the entity they were touching.
        let details = match error.http_status() {
            status if status.is_server_error() => None,
            _ if error.details.is_empty() => None,
            _ => Some(error.details.clone()),
        };

        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                details,
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for HousingError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Conversions
// ═══════════════════════════════════════════════════════════════════════════════

impl From<AuthError> for HousingError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingCredentials => {
                Self::new(ErrorCode::MissingCredentials, "Not authenticated")
            }
            // Expired and invalid tokens look the same from outside.
            AuthError::TokenInvalid | AuthError::TokenExpired => Self::with_internal(
                ErrorCode::InvalidToken,
                "Could not validate credentials",
                error.to_string(),
            ),
            AuthError::InvalidCredentials => Self::invalid_credentials(),
            AuthError::Internal(ref message) => Self::with_internal(
                ErrorCode::InternalError,
                "An internal error occurred",
                message.clone(),
            ),
        }
    }
}

/// A duplicate key only arises from registration, so it surfaces as the
/// registration error for that collection.
impl From<StoreError> for HousingError {
    fn from(error: StoreError) -> Self {
        let code = match &error {
            StoreError::Duplicate {
                collection: Collection::Students,
                key,
            } => return Self::student_already_exists(key),
            StoreError::Duplicate { key, .. } => return Self::username_taken(key),
            StoreError::Unavailable(_) => ErrorCode::StoreUnavailable,
            StoreError::Query(_) => ErrorCode::StoreQueryFailed,
            StoreError::Write(_) => ErrorCode::StoreWriteFailed,
            StoreError::Malformed { .. } => ErrorCode::MalformedRecord,
        };

        Self::with_internal(code, "Database error", error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for HousingError {
    fn from(error: serde_json::Error) -> Self {
        Self::with_internal(
            ErrorCode::SerializationError,
            "Failed to process data",
            error.to_string(),
        )
        .with_source(error)
    }
}

impl From<tokio::task::JoinError> for HousingError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::internal(format!("Blocking task failed: {}", error)).with_source(error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Collection;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::RecordNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::UsernameTaken.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::PermissionDenied.http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::InvalidToken.http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ErrorCode::StoreQueryFailed.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(ErrorCode::MissingCredentials.category(), "authentication");
        assert_eq!(ErrorCode::PermissionDenied.category(), "authorization");
        assert_eq!(ErrorCode::StudentAlreadyExists.category(), "validation");
        assert_eq!(ErrorCode::StoreUnavailable.category(), "store");
    }

    #[test]
    fn test_expired_and_invalid_tokens_share_outward_shape() {
        let expired = HousingError::from(AuthError::TokenExpired);
        let invalid = HousingError::from(AuthError::TokenInvalid);

        assert_eq!(expired.code(), invalid.code());
        assert_eq!(expired.user_message(), invalid.user_message());
        assert_ne!(expired.internal_message(), invalid.internal_message());
    }

    #[test]
    fn test_missing_credentials_distinct_from_invalid_token() {
        let missing = HousingError::from(AuthError::MissingCredentials);
        let invalid = HousingError::from(AuthError::TokenInvalid);
        assert_ne!(missing.code(), invalid.code());
        assert_eq!(missing.http_status(), invalid.http_status());
    }

    #[test]
    fn test_store_error_hides_cause_from_response() {
        let error = HousingError::from(StoreError::Unavailable(
            "connection refused: 10.0.0.7:5432".into(),
        ));
        let response = ErrorResponse::from(&error);
        let json = serde_json::to_string(&response).unwrap();

        assert_eq!(error.http_status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(json.contains("Database error"));
        assert!(!json.contains("10.0.0.7"));
    }

    #[test]
    fn test_duplicate_store_error_maps_to_registration_error() {
        let error = HousingError::from(StoreError::Duplicate {
            collection: Collection::Users,
            key: "alice".into(),
        });
        assert_eq!(error.code(), ErrorCode::UsernameTaken);
        assert_eq!(error.http_status(), StatusCode::BAD_REQUEST);

        let error = HousingError::from(StoreError::Duplicate {
            collection: Collection::Students,
            key: "alice".into(),
        });
        assert_eq!(error.code(), ErrorCode::StudentAlreadyExists);
        assert_eq!(error.user_message(), "Student already exists");
    }

    #[test]
    fn test_not_found_message_is_generic() {
        let error = HousingError::not_found("Student", "1004321");
        assert_eq!(error.user_message(), "Item not found");
        assert_eq!(error.details().entity_id.as_deref(), Some("1004321"));
    }

    #[test]
    fn test_error_response_serialization() {
        let error = HousingError::username_taken("alice");
        let response = ErrorResponse::from(&error);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("USERNAME_TAKEN"));
        assert!(json.contains("Username is taken"));
        assert!(json.contains("\"numeric_code\":4101"));
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::PermissionDenied),
            ErrorSeverity::Low
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::StoreQueryFailed),
            ErrorSeverity::High
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::StoreUnavailable),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_error_display() {
        let error = HousingError::with_internal(
            ErrorCode::StoreQueryFailed,
            "Database error",
            "relation \"identities\" does not exist",
        );

        let display = format!("{}", error);
        assert!(display.contains("StoreQueryFailed"));
        assert!(display.contains("Database error"));
        assert!(display.contains("identities"));
    }
}
