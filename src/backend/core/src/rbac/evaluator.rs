//! Role predicates over the identity store.
//!
//! Every call reads the store; nothing is cached, so a role change is visible
//! to the next request. Store failures are returned as errors and never turned
//! into a `true` or `false` answer.

use std::sync::Arc;
use tracing::error;

use super::models::{grants_write, is_house_guardian, RoleFlags};
use crate::store::{Collection, Document, IdentityStore, StoreResult};

/// Answers role questions about a username.
#[derive(Clone)]
pub struct AccessEvaluator {
    store: Arc<dyn IdentityStore>,
}

impl AccessEvaluator {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    async fn lookup(&self, collection: Collection, username: &str) -> StoreResult<Option<Document>> {
        self.store
            .find_identity_by_username(collection, username)
            .await
            .map_err(|e| {
                error!(
                    username = %username,
                    collection = %collection,
                    error = %e,
                    "Role lookup failed"
                );
                e
            })
    }

    /// A student record exists.
    pub async fn is_student(&self, username: &str) -> StoreResult<bool> {
        Ok(self.lookup(Collection::Students, username).await?.is_some())
    }

    /// A student record exists and is marked as house guardian.
    pub async fn is_student_house_guardian(&self, username: &str) -> StoreResult<bool> {
        Ok(self
            .lookup(Collection::Students, username)
            .await?
            .as_ref()
            .is_some_and(is_house_guardian))
    }

    /// An admin record exists.
    pub async fn is_admin(&self, username: &str) -> StoreResult<bool> {
        Ok(self.lookup(Collection::Admins, username).await?.is_some())
    }

    /// An admin record exists with `read_only` explicitly `false`.
    pub async fn is_admin_write(&self, username: &str) -> StoreResult<bool> {
        Ok(self
            .lookup(Collection::Admins, username)
            .await?
            .as_ref()
            .is_some_and(grants_write))
    }

    /// House guardian or write admin.
    pub async fn at_least_house_guardian_write(&self, username: &str) -> StoreResult<bool> {
        Ok(self.role_flags(username).await?.at_least_house_guardian_write())
    }

    /// All role flags from one student and one admin lookup, issued concurrently.
    pub async fn role_flags(&self, username: &str) -> StoreResult<RoleFlags> {
        let (student, admin) = futures::try_join!(
            self.lookup(Collection::Students, username),
            self.lookup(Collection::Admins, username),
        )?;
        Ok(RoleFlags::from_records(student.as_ref(), admin.as_ref()))
    }
}

impl std::fmt::Debug for AccessEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessEvaluator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    async fn seeded() -> AccessEvaluator {
        let store = Arc::new(InMemoryStore::new());
        let records = [
            (Collection::Students, json!({"username": "alice"})),
            (Collection::Students, json!({"username": "gina", "is_house_guardian": true})),
            (Collection::Admins, json!({"username": "rita", "read_only": true})),
            (Collection::Admins, json!({"username": "walt", "read_only": false})),
            (Collection::Admins, json!({"username": "nora"})),
        ];
        for (collection, record) in records {
            store
                .insert_identity(collection, record.as_object().cloned().unwrap())
                .await
                .unwrap();
        }
        AccessEvaluator::new(store)
    }

    #[tokio::test]
    async fn test_student_predicates() {
        let eval = seeded().await;
        assert!(eval.is_student("alice").await.unwrap());
        assert!(!eval.is_student_house_guardian("alice").await.unwrap());
        assert!(eval.is_student_house_guardian("gina").await.unwrap());
        assert!(!eval.is_student("walt").await.unwrap());
    }

    #[tokio::test]
    async fn test_admin_predicates() {
        let eval = seeded().await;
        assert!(eval.is_admin("rita").await.unwrap());
        assert!(!eval.is_admin_write("rita").await.unwrap());
        assert!(eval.is_admin_write("walt").await.unwrap());
        // No read_only field at all means read-only.
        assert!(eval.is_admin("nora").await.unwrap());
        assert!(!eval.is_admin_write("nora").await.unwrap());
        assert!(!eval.is_admin("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_house_guardian_write() {
        let eval = seeded().await;
        assert!(eval.at_least_house_guardian_write("gina").await.unwrap());
        assert!(eval.at_least_house_guardian_write("walt").await.unwrap());
        assert!(!eval.at_least_house_guardian_write("rita").await.unwrap());
        assert!(!eval.at_least_house_guardian_write("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_role_flags() {
        let eval = seeded().await;
        let flags = eval.role_flags("gina").await.unwrap();
        assert_eq!(
            flags,
            RoleFlags {
                is_student: true,
                is_student_house_guardian: true,
                is_admin: false,
                is_admin_write: false,
            }
        );
        assert_eq!(eval.role_flags("nobody").await.unwrap(), RoleFlags::default());
    }
}
