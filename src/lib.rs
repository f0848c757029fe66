//! SavedSearch-RS: a client SDK for saved searches on Splunk-compatible services
//!
//! Create, read, update, delete and dispatch saved searches, inspect their
//! job history, and wait on jobs with an explicit completed/timed-out result.
//! An in-process emulator of the REST API is included for local testing.

pub mod config;
pub mod emulator;
pub mod entity;
pub mod error;
pub mod fixture;
pub mod job;
pub mod network;
pub mod saved_search;
pub mod service;
pub mod wait;

pub use config::Settings;
pub use entity::{Content, Refresh};
pub use error::{Error, Result};
pub use fixture::{unique_name, ScopedSavedSearch};
pub use job::{Job, Jobs, ResultStream};
pub use network::Params;
pub use saved_search::{SavedSearch, SavedSearches};
pub use service::Service;
pub use wait::{wait_until, WaitOutcome, WaitPolicy};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
