//! Request bodies, stored records and public views.
//!
//! Public views are separate types that list the fields they expose, so a
//! stored field (such as a password hash) can only leave the service if a view
//! names it.

pub mod student;
pub mod user;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::store::{Collection, Document, StoreError, StoreResult, USERNAME_FIELD};

pub use student::{
    StudentEditableProfile, StudentIdentityProfile, StudentProfile, StudentRegistration,
};
pub use user::{
    AdminProfile, AdminRecord, AdminRegistration, Credentials, LoginResponse, PasswordChange,
    UserProfile, UserRecord,
};

/// Serialize a record into a store document. `None` fields are left out when
/// the type skips them.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Read a typed view out of a stored document.
pub fn from_document<T: DeserializeOwned>(
    collection: Collection,
    document: Document,
) -> StoreResult<T> {
    let key = document
        .get(USERNAME_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    serde_json::from_value(Value::Object(document)).map_err(|e| StoreError::Malformed {
        collection,
        key,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Sample {
        username: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    }

    #[test]
    fn test_to_document_skips_none() {
        let doc = to_document(&Sample {
            username: "alice".into(),
            note: None,
        })
        .unwrap();
        assert_eq!(Value::Object(doc), json!({"username": "alice"}));
    }

    #[test]
    fn test_to_document_rejects_non_objects() {
        assert!(to_document(&"just a string").is_err());
    }

    #[test]
    fn test_from_document_malformed() {
        let doc = json!({"username": "alice", "note": 5}).as_object().cloned().unwrap();
        let err = from_document::<Sample>(Collection::Students, doc).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { ref key, .. } if key == "alice"));
    }
}
