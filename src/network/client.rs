//! HTTP client for the management REST API

use super::namespace::Namespace;
use super::params::Params;
use super::user_agent::{accept_json, sdk_user_agent};
use crate::config::{ConnectionSettings, OutgoingSettings};
use crate::error::{Error, Result};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// HTTP method of an API request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

/// A request against the REST API
///
/// `path` is either absolute (`/services/auth/login`) or relative to the
/// client's namespace (`saved/searches`). Params travel in the query string
/// for GET/DELETE and as a form body for POST.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub params: Params,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            params: Params::new(),
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            params: Params::new(),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Delete,
            path: path.into(),
            params: Params::new(),
        }
    }

    pub fn params(mut self, params: &Params) -> Self {
        self.params.extend(params);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl super::params::ToParam) -> Self {
        self.params.insert(key, value);
        self
    }
}

/// Successful API response
#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub text: String,
}

impl ApiResponse {
    /// Parse response as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.text)?)
    }
}

/// Error body returned by the service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    messages: Vec<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    #[serde(default)]
    text: String,
}

/// HTTP client wrapper holding the service address, namespace and session
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    namespace: Namespace,
    session_key: Arc<RwLock<Option<String>>>,
    basic: Option<(String, String)>,
    default_timeout: Duration,
    user_agent: String,
    extra_headers: HashMap<String, String>,
}

impl HttpClient {
    /// Create a new HTTP client for the given connection
    pub fn new(connection: &ConnectionSettings, settings: &OutgoingSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs_f64(settings.request_timeout))
            .cookie_store(true)
            .gzip(true)
            .brotli(true);

        // SSL verification
        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        // Proxy settings
        if let Some(ref proxy_url) = settings.proxies.all {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        } else {
            if let Some(ref http) = settings.proxies.http {
                builder = builder.proxy(reqwest::Proxy::http(http)?);
            }
            if let Some(ref https) = settings.proxies.https {
                builder = builder.proxy(reqwest::Proxy::https(https)?);
            }
        }

        let client = builder.build()?;

        let basic = connection
            .basic
            .then(|| (connection.username.clone(), connection.password.clone()));

        Ok(Self {
            client,
            base_url: connection.base_url()?,
            namespace: Namespace::new(connection.owner.clone(), connection.app.clone()),
            session_key: Arc::new(RwLock::new(connection.token.clone())),
            basic,
            default_timeout: Duration::from_secs_f64(settings.request_timeout),
            user_agent: sdk_user_agent(),
            extra_headers: settings.extra_headers.clone(),
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Current session key, if logged in
    pub fn session_key(&self) -> Option<String> {
        match self.session_key.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the session key used for subsequent requests
    pub fn set_session_key(&self, key: Option<String>) {
        match self.session_key.write() {
            Ok(mut guard) => *guard = key,
            Err(poisoned) => *poisoned.into_inner() = key,
        }
    }

    /// Absolute URL for a request path
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let absolute = if path.starts_with('/') {
            path.to_string()
        } else {
            self.namespace.path(path)
        };
        Ok(self.base_url.join(&absolute)?)
    }

    /// Execute a request and read the whole body
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let path = request.path.clone();
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        debug!("{} -> {} ({} bytes)", path, status, text.len());

        Ok(ApiResponse { status, text })
    }

    /// Execute a request and hand back the unread response body
    pub async fn execute_streaming(&self, request: ApiRequest) -> Result<Response> {
        self.send(request).await
    }

    /// Simple GET request
    pub async fn get(&self, path: &str, params: &Params) -> Result<ApiResponse> {
        self.execute(ApiRequest::get(path).params(params)).await
    }

    /// Form POST request
    pub async fn post(&self, path: &str, params: &Params) -> Result<ApiResponse> {
        self.execute(ApiRequest::post(path).params(params)).await
    }

    /// DELETE request
    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.execute(ApiRequest::delete(path)).await
    }

    async fn send(&self, request: ApiRequest) -> Result<Response> {
        let url = self.url_for(&request.path)?;
        debug!("{:?} {}", request.method, url);

        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Delete => self.client.delete(url),
        };

        req_builder = req_builder
            .timeout(self.default_timeout)
            .header("User-Agent", &self.user_agent)
            .header("Accept", accept_json())
            .query(&[("output_mode", "json")]);

        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }

        if let Some((ref username, ref password)) = self.basic {
            req_builder = req_builder.basic_auth(username, Some(password));
        } else if let Some(key) = self.session_key() {
            req_builder = req_builder.header("Authorization", format!("Splunk {}", key));
        }

        // POSTs always carry a form body, even an empty one
        req_builder = match request.method {
            HttpMethod::Post => req_builder.form(&request.params.as_pairs()),
            HttpMethod::Get | HttpMethod::Delete if !request.params.is_empty() => {
                req_builder.query(&request.params.as_pairs())
            }
            HttpMethod::Get | HttpMethod::Delete => req_builder,
        };

        let response = req_builder.send().await?;
        Self::check_status(&request.path, response).await
    }

    /// Map non-success statuses to SDK errors
    async fn check_status(path: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = error_message(&text).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });
        debug!("{} failed with {}: {}", path, status, message);

        Err(match status {
            StatusCode::UNAUTHORIZED => Error::Unauthorized(message),
            StatusCode::NOT_FOUND => Error::NotFound {
                path: path.to_string(),
            },
            _ => Error::Status {
                status: status.as_u16(),
                message,
            },
        })
    }
}

/// First message text of an error body, if it has one
fn error_message(text: &str) -> Option<String> {
    let body: ErrorBody = serde_json::from_str(text).ok()?;
    body.messages
        .into_iter()
        .map(|m| m.text)
        .find(|t| !t.is_empty())
}
