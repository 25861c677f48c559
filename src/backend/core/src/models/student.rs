use serde::{Deserialize, Serialize};
use std::fmt;

use super::user::{Credentials, MAX_USERNAME_LEN};
use crate::validation::{Validate, ValidationErrors, ValidationResult};

/// Student registration. The username doubles as the student id.
#[derive(Clone, Deserialize)]
pub struct StudentRegistration {
    pub username: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub preferred_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub enrollment_type: Option<String>,
    #[serde(default)]
    pub year_of_enrollment: Option<i32>,
    #[serde(default)]
    pub sutd_email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub personal_email: Option<String>,
    #[serde(default)]
    pub local_address: Option<String>,
}

impl StudentRegistration {
    /// Split into the credential part and the student record.
    pub fn into_parts(self) -> (Credentials, StudentProfile) {
        let profile = StudentProfile {
            username: self.username.clone(),
            student_id: self.username.clone(),
            full_name: self.full_name,
            preferred_name: self.preferred_name,
            gender: self.gender,
            enrollment_type: self.enrollment_type,
            year_of_enrollment: self.year_of_enrollment,
            sutd_email: self.sutd_email,
            phone_number: self.phone_number,
            personal_email: self.personal_email,
            local_address: self.local_address,
            travel_time_hrs: None,
            is_house_guardian: false,
        };
        let credentials = Credentials {
            username: self.username,
            password: self.password,
        };
        (credentials, profile)
    }
}

impl fmt::Debug for StudentRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudentRegistration")
            .field("username", &self.username)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

impl Validate for StudentRegistration {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        errors.require("username", &self.username);
        errors.max_length("username", &self.username, MAX_USERNAME_LEN);
        errors.require("password", &self.password);
        errors.require("full_name", &self.full_name);
        errors.into_result()
    }
}

/// Stored student record and its public view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub username: String,
    pub student_id: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_of_enrollment: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sutd_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time_hrs: Option<f64>,
    #[serde(default)]
    pub is_house_guardian: bool,
}

/// Fields a student may change on their own profile. Omitted or null fields
/// are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentEditableProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time_hrs: Option<f64>,
}

impl Validate for StudentEditableProfile {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        if let Some(hours) = self.travel_time_hrs {
            if !hours.is_finite() || hours < 0.0 {
                errors.add("travel_time_hrs", "must be a non-negative number");
            }
        }
        errors.into_result()
    }
}

/// Identity fields only a write admin may change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentIdentityProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_of_enrollment: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sutd_email: Option<String>,
}

impl Validate for StudentIdentityProfile {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        if let Some(ref name) = self.full_name {
            errors.require("full_name", name);
        }
        errors.into_result()
    }
}
