//! Request validation.
//!
//! Request bodies implement [`Validate`]; handlers call `validate()` before
//! touching the store. Errors are collected per field and returned together.
//!
//! ```rust,ignore
//! impl Validate for Credentials {
//!     fn validate(&self) -> ValidationResult<()> {
//!         let mut errors = ValidationErrors::new();
//!         errors.require("username", &self.username);
//!         errors.require("password", &self.password);
//!         errors.into_result()
//!     }
//! }
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ErrorDetails, HousingError};

pub type ValidationResult<T> = std::result::Result<T, ValidationErrors>;

/// Validation over a request object.
pub trait Validate {
    /// Validate this object and return any validation errors.
    fn validate(&self) -> ValidationResult<()>;

    /// Check if this object is valid without returning detailed errors.
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Field errors keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Record an error when `value` is empty or only whitespace.
    pub fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "must not be empty");
        }
    }

    /// Record an error when `value` is longer than `max` characters.
    pub fn max_length(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("must be at most {} characters", max));
        }
    }

    /// Get errors for a specific field.
    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.errors.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// `Ok(())` when no error was recorded.
    pub fn into_result(self) -> ValidationResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.errors {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{} {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationErrors> for HousingError {
    fn from(errors: ValidationErrors) -> Self {
        let message = errors.to_string();
        HousingError::validation(message)
            .with_details(ErrorDetails::new().with_context("fields", &errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_require() {
        let mut errors = ValidationErrors::new();
        errors.require("username", "alice");
        assert!(errors.is_empty());

        errors.require("password", "");
        errors.require("username", "   ");
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["password", "username"]);
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_max_length() {
        let mut errors = ValidationErrors::new();
        errors.max_length("username", "abcd", 4);
        assert!(errors.is_empty());
        errors.max_length("username", "abcde", 4);
        assert_eq!(
            errors.get("username").unwrap(),
            &vec!["must be at most 4 characters".to_string()]
        );
    }

    #[test]
    fn test_into_housing_error() {
        let mut errors = ValidationErrors::new();
        errors.require("password", "");
        let error = HousingError::from(errors);

        assert_eq!(error.code(), ErrorCode::ValidationError);
        assert_eq!(error.user_message(), "password must not be empty");
        assert!(error.details().context.contains_key("fields"));
    }
}
