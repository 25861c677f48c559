//! Credential hashing and identity tokens.
//!
//! - [`CredentialHasher`]: Argon2id password hashing in PHC format
//! - [`TokenService`]: HS256 identity tokens valid for 60 minutes

pub mod error;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use password::CredentialHasher;
pub use token::{Claims, TokenService, TOKEN_ALGORITHM, TOKEN_TTL_MINUTES};
