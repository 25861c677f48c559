//! Identity store interface.
//!
//! The access core reads and writes identities through [`IdentityStore`].
//! Three collections share the same username key: `users` holds credentials,
//! `students` and `admins` are role overlays.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub use memory::InMemoryStore;

/// A stored identity record as a JSON object.
pub type Document = Map<String, Value>;

/// Field holding the record key in every collection.
pub const USERNAME_FIELD: &str = "username";

/// Identity collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Students,
    Admins,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Self::Users, Self::Students, Self::Admins];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Students => "students",
            Self::Admins => "admins",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} record already exists: {key}")]
    Duplicate { collection: Collection, key: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("malformed {collection} record {key}: {reason}")]
    Malformed {
        collection: Collection,
        key: String,
        reason: String,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Key-value access to identity records.
///
/// Implementations must make `insert_identity` atomic with respect to the
/// duplicate check: two concurrent inserts of the same key yield exactly one
/// success.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up a record by username.
    async fn find_identity_by_username(
        &self,
        collection: Collection,
        username: &str,
    ) -> StoreResult<Option<Document>>;

    /// Insert a new record. The record must carry a string `username` field.
    async fn insert_identity(&self, collection: Collection, record: Document) -> StoreResult<()>;

    /// Merge `fields` into an existing record. Returns the updated record, or
    /// `None` when no record has that key. The key itself cannot be changed.
    async fn update_identity_fields(
        &self,
        collection: Collection,
        username: &str,
        fields: Document,
    ) -> StoreResult<Option<Document>>;

    /// Up to `limit` records, ordered by username.
    async fn list_identities(&self, collection: Collection, limit: usize)
        -> StoreResult<Vec<Document>>;

    /// Check that the backing store answers.
    async fn ping(&self) -> StoreResult<()>;
}

/// Extract the key from a record about to be inserted.
pub(crate) fn record_key(collection: Collection, record: &Document) -> StoreResult<String> {
    match record.get(USERNAME_FIELD) {
        Some(Value::String(username)) if !username.is_empty() => Ok(username.clone()),
        _ => Err(StoreError::Malformed {
            collection,
            key: String::new(),
            reason: "record has no username".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_key() {
        let record = json!({"username": "alice"}).as_object().cloned().unwrap();
        assert_eq!(record_key(Collection::Users, &record).unwrap(), "alice");

        let empty = json!({"username": ""}).as_object().cloned().unwrap();
        assert!(matches!(
            record_key(Collection::Users, &empty),
            Err(StoreError::Malformed { .. })
        ));

        let missing = json!({"password": "x"}).as_object().cloned().unwrap();
        assert!(record_key(Collection::Students, &missing).is_err());
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(Collection::Users.to_string(), "users");
        assert_eq!(Collection::Students.as_str(), "students");
        assert_eq!(
            serde_json::to_string(&Collection::Admins).unwrap(),
            "\"admins\""
        );
    }
}
