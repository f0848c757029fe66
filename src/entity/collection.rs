//! Generic entity collections

use super::record::{parse_feed, Record};
use crate::error::{Error, Result};
use crate::network::{encode_segment, HttpClient, Params};
use async_trait::async_trait;
use std::marker::PhantomData;
use tracing::{debug, info};

/// A REST resource materialised from a feed entry
pub trait Entity: Sized + Send {
    fn from_record(client: HttpClient, record: Record) -> Self;
}

/// Anything whose state can be re-fetched from the service
#[async_trait]
pub trait Refresh: Send {
    async fn refresh(&mut self) -> Result<()>;
}

/// Named entities under one endpoint, e.g. `saved/searches`
pub struct Collection<E> {
    client: HttpClient,
    endpoint: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Collection<E> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Collection<E> {
    pub fn new(client: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            _entity: PhantomData,
        }
    }

    /// Endpoint, relative to the client's namespace unless it starts with `/`
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    fn item_endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.endpoint, encode_segment(name))
    }

    fn parse(&self, text: &str) -> Result<Vec<Record>> {
        let base = if self.endpoint.starts_with('/') {
            self.endpoint.clone()
        } else {
            self.client.namespace().path(&self.endpoint)
        };
        parse_feed(text, |name| format!("{}/{}", base, encode_segment(name)))
    }

    fn wrap(&self, record: Record) -> E {
        E::from_record(self.client.clone(), record)
    }

    /// Every entity in the collection
    pub async fn list(&self) -> Result<Vec<E>> {
        self.list_with(&Params::new()).await
    }

    /// Entities matching the given list arguments (`count`, `offset`, `search`, ...)
    ///
    /// `count` defaults to 0, which asks the service for all entries.
    pub async fn list_with(&self, params: &Params) -> Result<Vec<E>> {
        let mut args = Params::new().set("count", 0);
        args.extend(params);

        let response = self.client.get(&self.endpoint, &args).await?;
        let records = self.parse(&response.text)?;
        debug!("Listed {} entries from {}", records.len(), self.endpoint);

        Ok(records.into_iter().map(|r| self.wrap(r)).collect())
    }

    /// Whether an entity with this name exists
    pub async fn contains(&self, name: &str) -> Result<bool> {
        match self.get(name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fetch a single entity by name
    pub async fn get(&self, name: &str) -> Result<E> {
        let item = self.item_endpoint(name);
        let response = self.client.get(&item, &Params::new()).await?;
        let record = self
            .parse(&response.text)?
            .into_iter()
            .next()
            .ok_or(Error::NotFound { path: item })?;

        Ok(self.wrap(record))
    }

    /// Create an entity; `params` carries its fields
    pub async fn create(&self, name: &str, params: &Params) -> Result<E> {
        let mut args = Params::new().set("name", name);
        args.extend(params);

        let response = self.client.post(&self.endpoint, &args).await?;
        info!("Created {}/{}", self.endpoint, name);

        // Some endpoints answer a create with an empty feed
        match self.parse(&response.text)?.into_iter().next() {
            Some(record) => Ok(self.wrap(record)),
            None => self.get(name).await,
        }
    }

    /// Delete an entity by name
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.client.delete(&self.item_endpoint(name)).await?;
        info!("Deleted {}/{}", self.endpoint, name);
        Ok(())
    }

    /// Delete an entity if present; reports whether anything was removed
    pub async fn delete_if_exists(&self, name: &str) -> Result<bool> {
        match self.delete(name).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Re-fetch a record from its own path
pub(crate) async fn fetch_record(client: &HttpClient, path: &str) -> Result<Record> {
    let response = client.get(path, &Params::new()).await?;
    parse_feed(&response.text, |_| path.to_string())?
        .into_iter()
        .next()
        .ok_or_else(|| Error::NotFound {
            path: path.to_string(),
        })
}
