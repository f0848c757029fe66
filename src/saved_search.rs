//! Saved searches
//!
//! A saved search is a named query plus scheduling, alerting and dispatch
//! settings. Dispatching one starts a [`Job`]; its history lists the jobs
//! that are still live.

use crate::entity::{fetch_record, Collection, Content, Entity, Metadata, Record, Refresh};
use crate::error::Result;
use crate::job::{Job, SidResponse};
use crate::network::{HttpClient, Params};
use async_trait::async_trait;
use tracing::{debug, info};

const SAVED_SEARCHES_ENDPOINT: &str = "saved/searches";

/// A saved search entity
#[derive(Clone)]
pub struct SavedSearch {
    client: HttpClient,
    record: Record,
}

impl std::fmt::Debug for SavedSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SavedSearch")
            .field("name", &self.record.name)
            .field("path", &self.record.path)
            .finish()
    }
}

impl Entity for SavedSearch {
    fn from_record(client: HttpClient, record: Record) -> Self {
        Self { client, record }
    }
}

#[async_trait]
impl Refresh for SavedSearch {
    async fn refresh(&mut self) -> Result<()> {
        self.record = fetch_record(&self.client, &self.record.path).await?;
        Ok(())
    }
}

impl SavedSearch {
    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Absolute REST path
    pub fn path(&self) -> &str {
        &self.record.path
    }

    pub fn metadata(&self) -> &Metadata {
        &self.record.metadata
    }

    pub fn content(&self) -> &Content {
        &self.record.content
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.record.content.get(key)
    }

    /// Value of a content field, or `Error::MissingField`
    pub fn require(&self, key: &str) -> Result<&str> {
        self.record.require(key)
    }

    /// The search query
    pub fn search(&self) -> Option<&str> {
        self.get("search")
    }

    pub fn is_visible(&self) -> Option<bool> {
        self.record.content.flag("is_visible")
    }

    pub fn is_scheduled(&self) -> Option<bool> {
        self.record.content.flag("is_scheduled")
    }

    pub fn is_disabled(&self) -> Option<bool> {
        self.record.content.flag("disabled")
    }

    pub fn cron_schedule(&self) -> Option<&str> {
        self.get("cron_schedule")
    }

    /// Write fields to the server
    ///
    /// The local copy is untouched; call [`Refresh::refresh`] to observe the change.
    pub async fn update(&self, params: &Params) -> Result<()> {
        self.client.post(&self.record.path, params).await?;
        debug!("Updated saved search {} ({} fields)", self.name(), params.len());
        Ok(())
    }

    /// Run the saved search now; `params` may carry `dispatch.*` overrides
    pub async fn dispatch(&self, params: &Params) -> Result<Job> {
        let response = self
            .client
            .post(&format!("{}/dispatch", self.record.path), params)
            .await?;
        let SidResponse { sid } = response.json()?;
        info!("Dispatched {} as job {}", self.name(), sid);

        Ok(Job::new(self.client.clone(), sid))
    }

    /// Live (dispatched, not cancelled) jobs of this saved search
    pub async fn history(&self) -> Result<Vec<Job>> {
        let path = format!("{}/history", self.record.path);
        let history: Collection<Job> = Collection::new(self.client.clone(), path);
        history.list().await
    }
}

/// The `saved/searches` collection
#[derive(Clone)]
pub struct SavedSearches {
    inner: Collection<SavedSearch>,
}

impl SavedSearches {
    pub fn new(client: HttpClient) -> Self {
        Self {
            inner: Collection::new(client, SAVED_SEARCHES_ENDPOINT),
        }
    }

    /// Create a saved search; `params` may override any default field
    pub async fn create(&self, name: &str, search: &str, params: &Params) -> Result<SavedSearch> {
        let mut fields = Params::new().set("search", search);
        fields.extend(params);
        self.inner.create(name, &fields).await
    }

    pub async fn get(&self, name: &str) -> Result<SavedSearch> {
        self.inner.get(name).await
    }

    pub async fn contains(&self, name: &str) -> Result<bool> {
        self.inner.contains(name).await
    }

    pub async fn list(&self) -> Result<Vec<SavedSearch>> {
        self.inner.list().await
    }

    pub async fn list_with(&self, params: &Params) -> Result<Vec<SavedSearch>> {
        self.inner.list_with(params).await
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        self.inner.delete(name).await
    }

    pub async fn delete_if_exists(&self, name: &str) -> Result<bool> {
        self.inner.delete_if_exists(name).await
    }
}
