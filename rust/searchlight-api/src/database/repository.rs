//! Repository traits and the backend dispatch enum.
//!
//! Records live in an external managed datastore. The service talks to it
//! through [`LibraryRepository`] and [`UserRepository`]; [`Database`] picks
//! the PostgREST client or the in-memory fallback at startup.

use async_trait::async_trait;

use super::memory::InMemoryStore;
use super::postgrest::PostgrestClient;
use crate::config::DatastoreConfig;
use crate::domain::{
    LibraryFilter, NewSearchRecord, NewUser, RecordError, RecordPatch, SearchRecord, SortOrder,
    UserRecord,
};

/// Datastore failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("invalid record: {0}")]
    Invalid(#[from] RecordError),
    #[error("record {0} not found")]
    NotFound(i64),
    #[error("datastore unreachable: {0}")]
    Transport(String),
    #[error("datastore rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected datastore response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Access to the `Library` table.
#[async_trait]
pub trait LibraryRepository: Send + Sync + std::fmt::Debug {
    /// Insert one record and return it with its assigned id and timestamp.
    async fn insert(&self, record: &NewSearchRecord) -> Result<SearchRecord, StoreError>;

    /// Records matching `filter`, ordered by creation time.
    async fn select(
        &self,
        filter: &LibraryFilter,
        order: SortOrder,
    ) -> Result<Vec<SearchRecord>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<SearchRecord>, StoreError>;

    /// Apply `patch` to record `id`.
    async fn update(&self, id: i64, patch: &RecordPatch) -> Result<SearchRecord, StoreError>;

    /// Permanently remove record `id`.
    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Connectivity probe; returns the raw probe rows.
    async fn ping(&self) -> Result<serde_json::Value, StoreError>;

    fn backend_name(&self) -> &'static str;
}

/// Access to the `Users` table.
#[async_trait]
pub trait UserRepository: Send + Sync + std::fmt::Debug {
    async fn find_user(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn create_user(&self, user: &NewUser) -> Result<UserRecord, StoreError>;

    /// Return the row for `user.email`, creating it when absent.
    async fn ensure_user(&self, user: &NewUser) -> Result<UserRecord, StoreError> {
        if let Some(existing) = self.find_user(&user.email).await? {
            return Ok(existing);
        }
        tracing::info!(email = %user.email, "Creating user row");
        self.create_user(user).await
    }
}

/// The configured datastore backend.
#[derive(Debug, Clone)]
pub enum Database {
    /// Managed datastore over its REST interface.
    Postgrest(PostgrestClient),
    /// Process-local fallback.
    InMemory(InMemoryStore),
}

impl Database {
    /// Use PostgREST when a URL and key are configured, otherwise memory.
    pub fn from_config(config: &DatastoreConfig) -> anyhow::Result<Self> {
        match (&config.url, &config.anon_key) {
            (Some(url), Some(key)) => {
                let timeout = std::time::Duration::from_secs(config.timeout_secs);
                Ok(Self::Postgrest(PostgrestClient::new(url, key, timeout)?))
            }
            _ => {
                tracing::warn!("No datastore configured; library history is kept in memory only");
                Ok(Self::in_memory())
            }
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::InMemory(InMemoryStore::new())
    }
}

#[async_trait]
impl LibraryRepository for Database {
    async fn insert(&self, record: &NewSearchRecord) -> Result<SearchRecord, StoreError> {
        match self {
            Self::Postgrest(client) => client.insert(record).await,
            Self::InMemory(store) => store.insert(record).await,
        }
    }

    async fn select(
        &self,
        filter: &LibraryFilter,
        order: SortOrder,
    ) -> Result<Vec<SearchRecord>, StoreError> {
        match self {
            Self::Postgrest(client) => client.select(filter, order).await,
            Self::InMemory(store) => store.select(filter, order).await,
        }
    }

    async fn get(&self, id: i64) -> Result<Option<SearchRecord>, StoreError> {
        match self {
            Self::Postgrest(client) => client.get(id).await,
            Self::InMemory(store) => store.get(id).await,
        }
    }

    async fn update(&self, id: i64, patch: &RecordPatch) -> Result<SearchRecord, StoreError> {
        match self {
            Self::Postgrest(client) => client.update(id, patch).await,
            Self::InMemory(store) => store.update(id, patch).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        match self {
            Self::Postgrest(client) => client.delete(id).await,
            Self::InMemory(store) => store.delete(id).await,
        }
    }

    async fn ping(&self) -> Result<serde_json::Value, StoreError> {
        match self {
            Self::Postgrest(client) => client.ping().await,
            Self::InMemory(store) => store.ping().await,
        }
    }

    fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgrest(client) => client.backend_name(),
            Self::InMemory(store) => store.backend_name(),
        }
    }
}

#[async_trait]
impl UserRepository for Database {
    async fn find_user(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        match self {
            Self::Postgrest(client) => client.find_user(email).await,
            Self::InMemory(store) => store.find_user(email).await,
        }
    }

    async fn create_user(&self, user: &NewUser) -> Result<UserRecord, StoreError> {
        match self {
            Self::Postgrest(client) => client.create_user(user).await,
            Self::InMemory(store) => store.create_user(user).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_falls_back_to_memory() {
        let db = Database::from_config(&DatastoreConfig::default()).unwrap();
        assert!(matches!(db, Database::InMemory(_)));
        assert_eq!(db.backend_name(), "memory");

        let half = DatastoreConfig {
            url: Some("https://project.example.co".into()),
            ..DatastoreConfig::default()
        };
        assert!(matches!(Database::from_config(&half).unwrap(), Database::InMemory(_)));
    }

    #[test]
    fn test_from_config_uses_postgrest() {
        let config = DatastoreConfig {
            url: Some("https://project.example.co".into()),
            anon_key: Some("anon".into()),
            ..DatastoreConfig::default()
        };
        let db = Database::from_config(&config).unwrap();
        assert_eq!(db.backend_name(), "postgrest");
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let db = Database::in_memory();
        let user = NewUser {
            name: "Alice".into(),
            email: "alice@example.com".into(),
        };
        let first = db.ensure_user(&user).await.unwrap();
        let second = db.ensure_user(&user).await.unwrap();
        assert_eq!(first.id, second.id);
    }
}
