//! In-memory identity store backed by `DashMap`.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

use super::{
    record_key, Collection, Document, IdentityStore, StoreError, StoreResult, USERNAME_FIELD,
};

/// Concurrent in-memory store for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: DashMap<(Collection, String), Document>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: Collection) -> usize {
        self.records
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .count()
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find_identity_by_username(
        &self,
        collection: Collection,
        username: &str,
    ) -> StoreResult<Option<Document>> {
        Ok(self
            .records
            .get(&(collection, username.to_string()))
            .map(|record| record.value().clone()))
    }

    async fn insert_identity(&self, collection: Collection, record: Document) -> StoreResult<()> {
        let key = record_key(collection, &record)?;

        // The entry guard holds the shard lock across the check and the insert.
        match self.records.entry((collection, key.clone())) {
            Entry::Occupied(_) => Err(StoreError::Duplicate { collection, key }),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn update_identity_fields(
        &self,
        collection: Collection,
        username: &str,
        mut fields: Document,
    ) -> StoreResult<Option<Document>> {
        fields.remove(USERNAME_FIELD);

        let Some(mut record) = self.records.get_mut(&(collection, username.to_string())) else {
            return Ok(None);
        };
        for (name, value) in fields {
            record.insert(name, value);
        }
        Ok(Some(record.value().clone()))
    }

    async fn list_identities(
        &self,
        collection: Collection,
        limit: usize,
    ) -> StoreResult<Vec<Document>> {
        let mut records: Vec<Document> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| entry.value().clone())
            .collect();

        records.sort_by(|a, b| username_of(a).cmp(username_of(b)));
        records.truncate(limit);
        Ok(records)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

fn username_of(record: &Document) -> &str {
    record
        .get(USERNAME_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default()
}
