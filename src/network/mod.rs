//! HTTP networking module
//!
//! Provides the REST transport used by every entity and collection.

mod client;
mod namespace;
mod params;
mod user_agent;

pub use client::{ApiRequest, ApiResponse, HttpClient, HttpMethod};
pub use namespace::{encode_segment, Namespace};
pub use params::{Params, ToParam};
pub use user_agent::sdk_user_agent;
