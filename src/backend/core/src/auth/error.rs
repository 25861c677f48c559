use thiserror::Error;

/// Authentication errors.
///
/// `TokenExpired` and `TokenInvalid` stay distinct here so logs and metrics can
/// tell them apart; they are merged into one outward error at the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing authentication credentials")]
    MissingCredentials,

    #[error("Invalid authentication token")]
    TokenInvalid,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Metric label for this failure.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::TokenInvalid => "token_invalid",
            Self::TokenExpired => "token_expired",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Internal(_) => "internal",
        }
    }
}
