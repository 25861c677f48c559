//! Signed identity tokens.
//!
//! Tokens are compact HS256 JWS strings carrying only `sub`, `iat` and `exp`.
//! The server keeps no per-token state, so a token stays valid until it
//! expires.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::AuthError;

/// Token lifetime.
pub const TOKEN_TTL_MINUTES: i64 = 60;

/// The only accepted signing algorithm.
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,
}

impl Claims {
    /// Claims for `subject` issued at `issued_at`.
    pub fn new(subject: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            sub: subject.into(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::minutes(TOKEN_TTL_MINUTES)).timestamp(),
        }
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Issues and validates identity tokens with a server-held secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    /// Create a token service. An empty secret is rejected.
    pub fn new(secret: &str) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Internal("JWT secret must not be empty".into()));
        }

        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Issue a token for `subject`, valid from now.
    pub fn issue(&self, subject: &str) -> Result<String, AuthError> {
        self.issue_at(subject, Utc::now())
    }

    /// Issue a token as if it had been issued at `issued_at`.
    pub fn issue_at(&self, subject: &str, issued_at: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims::new(subject, issued_at);
        encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate a token and return its subject.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.decode_claims(token).map(|claims| claims.sub)
    }

    /// Validate a token and return all of its claims.
    ///
    /// The signature is checked before expiry, so `TokenExpired` means the
    /// token was genuine.
    pub fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Token validation failed");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::TokenInvalid,
                }
            })
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &TOKEN_ALGORITHM)
            .field("ttl_minutes", &TOKEN_TTL_MINUTES)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    fn service() -> TokenService {
        TokenService::new(SECRET).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = service();
        let token = tokens.issue("alice").unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), "alice");
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_expiry_is_sixty_minutes() {
        let tokens = service();
        let issued_at = Utc::now();
        let token = tokens.issue_at("alice", issued_at).unwrap();
        let claims = tokens.decode_claims(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.iat, issued_at.timestamp());
    }

    #[test]
    fn test_expired_token() {
        let tokens = service();
        let token = tokens
            .issue_at("alice", Utc::now() - Duration::minutes(61))
            .unwrap();
        assert_eq!(tokens.verify(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_token_valid_until_expiry() {
        let tokens = service();
        let token = tokens
            .issue_at("alice", Utc::now() - Duration::minutes(59))
            .unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), "alice");
    }

    #[test]
    fn test_token_valid_at_exact_expiry() {
        let tokens = service();

        // Keep issue and verify inside the same wall-clock second.
        let millis = Utc::now().timestamp_subsec_millis();
        if millis > 800 {
            std::thread::sleep(std::time::Duration::from_millis(u64::from(1010 - millis)));
        }
        let now = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap();

        let at_expiry = tokens
            .issue_at("alice", now - Duration::minutes(TOKEN_TTL_MINUTES))
            .unwrap();
        assert_eq!(tokens.verify(&at_expiry).unwrap(), "alice");

        let past_expiry = tokens
            .issue_at("alice", now - Duration::minutes(TOKEN_TTL_MINUTES) - Duration::seconds(1))
            .unwrap();
        assert_eq!(tokens.verify(&past_expiry), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_tampered_signature() {
        let tokens = service();
        let alice = tokens.issue("alice").unwrap();
        let mallory = tokens.issue("mallory").unwrap();

        // alice's header and payload with mallory's signature
        let (alice_body, _) = alice.rsplit_once('.').unwrap();
        let (_, mallory_sig) = mallory.rsplit_once('.').unwrap();
        let forged = format!("{}.{}", alice_body, mallory_sig);

        assert_eq!(tokens.verify(&forged), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_wrong_secret() {
        let other = TokenService::new("another-secret-entirely").unwrap();
        let token = other.issue("alice").unwrap();
        assert_eq!(service().verify(&token), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_expired_token_with_wrong_secret_is_invalid() {
        let other = TokenService::new("another-secret-entirely").unwrap();
        let token = other
            .issue_at("alice", Utc::now() - Duration::hours(3))
            .unwrap();
        assert_eq!(service().verify(&token), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let claims = Claims::new("alice", Utc::now());
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(service().verify(&token), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_unsigned_token_rejected() {
        // {"alg":"none","typ":"JWT"} . {"sub":"alice","iat":1700000000,"exp":4102444800} .
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.\
                     eyJzdWIiOiJhbGljZSIsImlhdCI6MTcwMDAwMDAwMCwiZXhwIjo0MTAyNDQ0ODAwfQ.";
        assert_eq!(service().verify(token), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_malformed_tokens() {
        let tokens = service();
        for token in ["", "garbage", "a.b.c", "Bearer abc"] {
            assert_eq!(tokens.verify(token), Err(AuthError::TokenInvalid));
        }
    }

    #[test]
    fn test_missing_claims_rejected() {
        #[derive(Serialize)]
        struct NoSubject {
            iat: i64,
            exp: i64,
        }

        let now = Utc::now().timestamp();
        let token = encode(
            &Header::new(TOKEN_ALGORITHM),
            &NoSubject { iat: now, exp: now + 600 },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(service().verify(&token), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(TokenService::new(""), Err(AuthError::Internal(_))));
    }

    #[test]
    fn test_debug_hides_keys() {
        let output = format!("{:?}", service());
        assert!(!output.contains(SECRET));
        assert!(output.contains("HS256"));
    }
}
