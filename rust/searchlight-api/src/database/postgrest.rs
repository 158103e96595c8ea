//! Client for the managed datastore's PostgREST interface.
//!
//! Every request carries the project's anon key twice, as `apikey` and as a
//! bearer token. Writes ask for `return=representation` so the stored row
//! (with its id and `created_at`) comes back in the response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::repository::{LibraryRepository, StoreError, UserRepository};
use crate::domain::{
    LibraryFilter, NewSearchRecord, NewUser, RecordPatch, SearchRecord, SortOrder, UserRecord,
};

const LIBRARY_TABLE: &str = "Library";
const USERS_TABLE: &str = "Users";

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct PostgrestClient {
    http: Client,
    base_url: String,
    anon_key: String,
}

impl std::fmt::Debug for PostgrestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestClient")
            .field("base_url", &self.base_url)
            .field("anon_key", &"<redacted>")
            .finish()
    }
}

impl PostgrestClient {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, self.table_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    fn writing(&self, method: reqwest::Method, table: &str) -> RequestBuilder {
        self.request(method, table)
            .header("Prefer", "return=representation")
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<PostgrestErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, StoreError> {
        let response = Self::check(request.send().await?).await?;
        Ok(response.json::<Vec<T>>().await?)
    }

    async fn single<T: DeserializeOwned>(request: RequestBuilder) -> Result<Option<T>, StoreError> {
        Ok(Self::rows::<T>(request).await?.into_iter().next())
    }
}

#[async_trait]
impl LibraryRepository for PostgrestClient {
    async fn insert(&self, record: &NewSearchRecord) -> Result<SearchRecord, StoreError> {
        record.validate()?;
        let request = self
            .writing(reqwest::Method::POST, LIBRARY_TABLE)
            .json(&[record]);
        Self::single(request)
            .await?
            .ok_or_else(|| StoreError::Decode("insert returned no rows".into()))
    }

    async fn select(
        &self,
        filter: &LibraryFilter,
        order: SortOrder,
    ) -> Result<Vec<SearchRecord>, StoreError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("userEmail", format!("eq.{}", filter.user_email)),
        ];
        if let Some(kind) = filter.kind {
            query.push(("type", format!("eq.{kind}")));
        }
        query.push(("order", order.as_postgrest().to_string()));

        Self::rows(self.request(reqwest::Method::GET, LIBRARY_TABLE).query(&query)).await
    }

    async fn get(&self, id: i64) -> Result<Option<SearchRecord>, StoreError> {
        let request = self
            .request(reqwest::Method::GET, LIBRARY_TABLE)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))]);
        Self::single(request).await
    }

    async fn update(&self, id: i64, patch: &RecordPatch) -> Result<SearchRecord, StoreError> {
        let request = self
            .writing(reqwest::Method::PATCH, LIBRARY_TABLE)
            .query(&[("id", format!("eq.{id}"))])
            .json(patch);
        Self::single(request).await?.ok_or(StoreError::NotFound(id))
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let request = self
            .writing(reqwest::Method::DELETE, LIBRARY_TABLE)
            .query(&[("id", format!("eq.{id}"))]);
        let deleted: Vec<SearchRecord> = Self::rows(request).await?;
        if deleted.is_empty() {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<serde_json::Value, StoreError> {
        let request = self
            .request(reqwest::Method::GET, LIBRARY_TABLE)
            .query(&[("select", "count"), ("limit", "1")]);
        let response = Self::check(request.send().await?).await?;
        Ok(response.json::<serde_json::Value>().await?)
    }

    fn backend_name(&self) -> &'static str {
        "postgrest"
    }
}

#[async_trait]
impl UserRepository for PostgrestClient {
    async fn find_user(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let request = self.request(reqwest::Method::GET, USERS_TABLE).query(&[
            ("select", "*".to_string()),
            ("email", format!("eq.{email}")),
            ("limit", "1".to_string()),
        ]);
        Self::single(request).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<UserRecord, StoreError> {
        let request = self.writing(reqwest::Method::POST, USERS_TABLE).json(&[user]);
        Self::single(request)
            .await?
            .ok_or_else(|| StoreError::Decode("insert returned no rows".into()))
    }
}
