use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rbac::RoleFlags;
use crate::validation::{Validate, ValidationErrors, ValidationResult};

pub const MAX_USERNAME_LEN: usize = 64;

fn default_read_only() -> bool {
    true
}

// ═══════════════════════════════════════════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════════════════════════════════════════

/// Username and password, for user registration and login.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl Validate for Credentials {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        errors.require("username", &self.username);
        errors.max_length("username", &self.username, MAX_USERNAME_LEN);
        errors.require("password", &self.password);
        errors.into_result()
    }
}

/// Admin registration. `read_only_privilege` defaults to a read-only admin.
#[derive(Clone, Deserialize)]
pub struct AdminRegistration {
    pub username: String,
    pub password: String,
    pub full_name: String,
    #[serde(alias = "email_sutd")]
    pub email: String,
    #[serde(default = "default_read_only")]
    pub read_only_privilege: bool,
}

impl AdminRegistration {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    pub fn record(&self) -> AdminRecord {
        AdminRecord {
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            read_only: self.read_only_privilege,
        }
    }
}

impl fmt::Debug for AdminRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminRegistration")
            .field("username", &self.username)
            .field("full_name", &self.full_name)
            .field("read_only_privilege", &self.read_only_privilege)
            .finish_non_exhaustive()
    }
}

impl Validate for AdminRegistration {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        errors.require("username", &self.username);
        errors.max_length("username", &self.username, MAX_USERNAME_LEN);
        errors.require("password", &self.password);
        errors.require("full_name", &self.full_name);
        errors.require("email", &self.email);
        errors.into_result()
    }
}

/// Password rotation for the calling user.
#[derive(Clone, Deserialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordChange { .. }")
    }
}

impl Validate for PasswordChange {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        errors.require("old_password", &self.old_password);
        errors.require("new_password", &self.new_password);
        errors.into_result()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Stored records
// ═══════════════════════════════════════════════════════════════════════════════

/// Credential record in the `users` collection.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
}

impl UserRecord {
    pub const PASSWORD_HASH_FIELD: &'static str = "password_hash";
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Role overlay in the `admins` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRecord {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub read_only: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Public views
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminProfile {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub read_only: bool,
}

impl From<AdminRecord> for AdminProfile {
    fn from(record: AdminRecord) -> Self {
        Self {
            username: record.username,
            full_name: record.full_name,
            email: record.email,
            read_only: record.read_only,
        }
    }
}

/// Token plus the caller's role flags at login time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(flatten)]
    pub roles: RoleFlags,
}
