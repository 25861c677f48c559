//! PostgreSQL identity store.
//!
//! All collections share one `identities` table keyed by
//! `(collection, username)`, with each record held as a JSONB document.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::store::{
    record_key, Collection, Document, IdentityStore, StoreError, StoreResult, USERNAME_FIELD,
};

/// Postgres unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Database-backed identity store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new connection pool.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("database_url is not configured".into()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(map_read_error)?;

        info!(
            max_connections = config.max_connections,
            "Connected to identity database"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_identity_by_username(
        &self,
        collection: Collection,
        username: &str,
    ) -> StoreResult<Option<Document>> {
        let document = sqlx::query_scalar::<_, Json<Document>>(
            r#"
            SELECT document FROM identities
            WHERE collection = $1 AND username = $2
            "#,
        )
        .bind(collection.as_str())
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_read_error)?;

        Ok(document.map(|Json(document)| document))
    }

    async fn insert_identity(&self, collection: Collection, record: Document) -> StoreResult<()> {
        let key = record_key(collection, &record)?;

        let result = sqlx::query(
            r#"
            INSERT INTO identities (collection, username, document)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, username) DO NOTHING
            "#,
        )
        .bind(collection.as_str())
        .bind(&key)
        .bind(Json(&record))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                StoreError::Duplicate {
                    collection,
                    key: key.clone(),
                }
            }
            other => map_write_error(other),
        })?;

        if result.rows_affected() == 0 {
            debug!(collection = %collection, username = %key, "Insert skipped, record exists");
            return Err(StoreError::Duplicate { collection, key });
        }
        Ok(())
    }

    async fn update_identity_fields(
        &self,
        collection: Collection,
        username: &str,
        mut fields: Document,
    ) -> StoreResult<Option<Document>> {
        fields.remove(USERNAME_FIELD);

        let document = sqlx::query_scalar::<_, Json<Document>>(
            r#"
            UPDATE identities
            SET document = document || $3, updated_at = NOW()
            WHERE collection = $1 AND username = $2
            RETURNING document
            "#,
        )
        .bind(collection.as_str())
        .bind(username)
        .bind(Json(&fields))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(document.map(|Json(document)| document))
    }

    async fn list_identities(
        &self,
        collection: Collection,
        limit: usize,
    ) -> StoreResult<Vec<Document>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let documents = sqlx::query_scalar::<_, Json<Document>>(
            r#"
            SELECT document FROM identities
            WHERE collection = $1
            ORDER BY username
            LIMIT $2
            "#,
        )
        .bind(collection.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_read_error)?;

        Ok(documents.into_iter().map(|Json(document)| document).collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_read_error)?;
        Ok(())
    }
}

fn is_connection_error(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_)
    )
}

fn map_read_error(error: sqlx::Error) -> StoreError {
    if is_connection_error(&error) {
        StoreError::Unavailable(error.to_string())
    } else {
        StoreError::Query(error.to_string())
    }
}

fn map_write_error(error: sqlx::Error) -> StoreError {
    if is_connection_error(&error) {
        StoreError::Unavailable(error.to_string())
    } else {
        StoreError::Write(error.to_string())
    }
}
