//! Scoped saved searches with guaranteed teardown
//!
//! Tests that share one remote account must not collide on names, and must
//! not leave entities behind when they fail half way.

use crate::error::Result;
use crate::network::Params;
use crate::saved_search::{SavedSearch, SavedSearches};
use std::ops::{Deref, DerefMut};
use tracing::warn;

/// `prefix` plus a random suffix, unique per call
pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// A saved search deleted when released
///
/// Call [`ScopedSavedSearch::release`] to delete it and observe errors. If the
/// guard is dropped unreleased inside a Tokio runtime, deletion is spawned on
/// that runtime as a fallback.
pub struct ScopedSavedSearch {
    collection: SavedSearches,
    search: SavedSearch,
    released: bool,
}

impl ScopedSavedSearch {
    /// Delete the saved search; a search already gone counts as released
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        self.collection.delete_if_exists(self.search.name()).await?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        self.search.name()
    }
}

impl Deref for ScopedSavedSearch {
    type Target = SavedSearch;

    fn deref(&self) -> &SavedSearch {
        &self.search
    }
}

impl DerefMut for ScopedSavedSearch {
    fn deref_mut(&mut self) -> &mut SavedSearch {
        &mut self.search
    }
}

impl Drop for ScopedSavedSearch {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let name = self.search.name().to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Saved search {} dropped without release, deleting in background", name);
                let collection = self.collection.clone();
                handle.spawn(async move {
                    if let Err(e) = collection.delete_if_exists(&name).await {
                        warn!("Background delete of {} failed: {}", name, e);
                    }
                });
            }
            Err(_) => warn!("Saved search {} leaked: no runtime to delete it on", name),
        }
    }
}

impl SavedSearches {
    /// Replace any saved search called `name` with a fresh one owned by the guard
    pub async fn scoped(
        &self,
        name: &str,
        search: &str,
        params: &Params,
    ) -> Result<ScopedSavedSearch> {
        self.delete_if_exists(name).await?;
        let created = self.create(name, search, params).await?;
        Ok(ScopedSavedSearch {
            collection: self.clone(),
            search: created,
            released: false,
        })
    }
}
