//! In-memory datastore used when none is configured, and by tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::json;

use super::repository::{LibraryRepository, StoreError, UserRepository};
use crate::domain::{
    LibraryFilter, NewSearchRecord, NewUser, RecordPatch, SearchRecord, SortOrder, UserRecord,
};

#[derive(Debug, Default)]
struct Tables {
    library: Vec<SearchRecord>,
    users: Vec<UserRecord>,
    last_library_id: i64,
    last_user_id: i64,
}

/// Shared, cloneable in-process store. Ids start at 1 and are never reused.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with an explicit creation time.
    pub fn seed(
        &self,
        record: &NewSearchRecord,
        created_at: DateTime<Utc>,
    ) -> Result<SearchRecord, StoreError> {
        record.validate()?;
        let mut tables = self.tables.write();
        tables.last_library_id += 1;
        let stored = SearchRecord {
            id: tables.last_library_id,
            search_input: record.search_input.clone(),
            user_email: record.user_email.clone(),
            kind: record.kind,
            search_id: record.search_id,
            ai_model: record.ai_model.clone(),
            search_results: record.search_results.clone(),
            created_at,
        };
        tables.library.push(stored.clone());
        Ok(stored)
    }

    /// Snapshot of every library row in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<SearchRecord> {
        self.tables.read().library.clone()
    }
}

#[async_trait]
impl LibraryRepository for InMemoryStore {
    async fn insert(&self, record: &NewSearchRecord) -> Result<SearchRecord, StoreError> {
        self.seed(record, Utc::now())
    }

    async fn select(
        &self,
        filter: &LibraryFilter,
        order: SortOrder,
    ) -> Result<Vec<SearchRecord>, StoreError> {
        let mut rows: Vec<SearchRecord> = self
            .tables
            .read()
            .library
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();

        // Ids break timestamp ties so equal-time inserts keep their order.
        rows.sort_by_key(|r| (r.created_at, r.id));
        if order == SortOrder::Newest {
            rows.reverse();
        }
        Ok(rows)
    }

    async fn get(&self, id: i64) -> Result<Option<SearchRecord>, StoreError> {
        Ok(self.tables.read().library.iter().find(|r| r.id == id).cloned())
    }

    async fn update(&self, id: i64, patch: &RecordPatch) -> Result<SearchRecord, StoreError> {
        let mut tables = self.tables.write();
        let record = tables
            .library
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        patch.apply_to(record);
        Ok(record.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let before = tables.library.len();
        tables.library.retain(|r| r.id != id);
        if tables.library.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<serde_json::Value, StoreError> {
        let count = self.tables.read().library.len();
        Ok(json!([{ "count": count }]))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_user(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.tables.read().users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: &NewUser) -> Result<UserRecord, StoreError> {
        let mut tables = self.tables.write();
        tables.last_user_id += 1;
        let record = UserRecord {
            id: tables.last_user_id,
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: Utc::now(),
        };
        tables.users.push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SearchType;
    use chrono::Duration;
    use uuid::Uuid;

    fn new_record(input: &str, email: &str, kind: SearchType) -> NewSearchRecord {
        NewSearchRecord::provisional(input, email, kind, Uuid::new_v4()).unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = InMemoryStore::new();
        let a = store.insert(&new_record("a", "u@x.com", SearchType::Search)).await.unwrap();
        let b = store.insert(&new_record("b", "u@x.com", SearchType::Search)).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_empty_input() {
        let store = InMemoryStore::new();
        let mut record = new_record("a", "u@x.com", SearchType::Search);
        record.search_input = "  ".into();
        let err = store.insert(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_select_filters_and_orders() {
        let store = InMemoryStore::new();
        let t0 = Utc::now();
        store.seed(&new_record("old", "u@x.com", SearchType::Research), t0).unwrap();
        store
            .seed(&new_record("mid", "u@x.com", SearchType::Search), t0 + Duration::seconds(1))
            .unwrap();
        store
            .seed(&new_record("new", "u@x.com", SearchType::Research), t0 + Duration::seconds(2))
            .unwrap();
        store
            .seed(&new_record("other", "v@x.com", SearchType::Research), t0 + Duration::seconds(3))
            .unwrap();

        let filter = LibraryFilter::for_user("u@x.com");
        let newest: Vec<_> = store
            .select(&filter, SortOrder::Newest)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.search_input)
            .collect();
        assert_eq!(newest, vec!["new", "mid", "old"]);

        let research = store
            .select(&filter.with_kind(Some(SearchType::Research)), SortOrder::Oldest)
            .await
            .unwrap();
        assert_eq!(research.len(), 2);
        assert_eq!(research[0].search_input, "old");
        assert!(research.iter().all(|r| r.kind == SearchType::Research));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = InMemoryStore::new();
        let rec = store.insert(&new_record("a", "u@x.com", SearchType::Search)).await.unwrap();

        let patch = RecordPatch {
            search_results: Some(json!({"webResults": []})),
            ai_model: Some("Grok".into()),
        };
        let updated = store.update(rec.id, &patch).await.unwrap();
        assert_eq!(updated.ai_model.as_deref(), Some("Grok"));

        store.delete(rec.id).await.unwrap();
        assert!(store.get(rec.id).await.unwrap().is_none());
        assert_eq!(store.delete(rec.id).await.unwrap_err(), StoreError::NotFound(rec.id));
        assert_eq!(store.update(99, &patch).await.unwrap_err(), StoreError::NotFound(99));
    }

    #[tokio::test]
    async fn test_ping_reports_count() {
        let store = InMemoryStore::new();
        store.insert(&new_record("a", "u@x.com", SearchType::Search)).await.unwrap();
        assert_eq!(store.ping().await.unwrap(), json!([{"count": 1}]));
    }
}
