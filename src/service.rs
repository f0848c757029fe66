//! Entry point to a search service

use crate::config::{ConnectionSettings, OutgoingSettings, Settings};
use crate::entity::{parse_feed, Content};
use crate::error::{Error, Result};
use crate::job::Jobs;
use crate::network::{HttpClient, Params};
use crate::saved_search::SavedSearches;
use crate::wait::WaitPolicy;
use serde::Deserialize;
use tracing::info;

const LOGIN_PATH: &str = "/services/auth/login";
const SERVER_INFO_PATH: &str = "/services/server/info";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "sessionKey")]
    session_key: String,
}

/// An authenticated connection to the management API
#[derive(Clone)]
pub struct Service {
    client: HttpClient,
    wait_policy: WaitPolicy,
}

impl Service {
    /// Connect and log in (unless a token or Basic auth is configured)
    pub async fn connect(
        connection: &ConnectionSettings,
        outgoing: &OutgoingSettings,
    ) -> Result<Self> {
        let client = HttpClient::new(connection, outgoing)?;
        let service = Self {
            client,
            wait_policy: WaitPolicy::default(),
        };

        if connection.token.is_none() && !connection.basic {
            service
                .login(&connection.username, &connection.password)
                .await?;
        }

        info!("Connected to {}", service.client.base_url());
        Ok(service)
    }

    /// Connect using every section of the settings, including the wait policy
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let service = Self::connect(&settings.connection, &settings.outgoing).await?;
        Ok(service.with_wait_policy(WaitPolicy::from(&settings.wait)))
    }

    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    /// Default policy for job waits
    pub fn wait_policy(&self) -> &WaitPolicy {
        &self.wait_policy
    }

    /// Exchange credentials for a session key
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let params = Params::new()
            .set("username", username)
            .set("password", password);
        let response = self.client.post(LOGIN_PATH, &params).await?;
        let login: LoginResponse = response
            .json()
            .map_err(|_| Error::Unauthorized("login response had no session key".to_string()))?;

        self.client.set_session_key(Some(login.session_key));
        info!("Logged in as {}", username);
        Ok(())
    }

    /// Forget the session key
    pub fn logout(&self) {
        self.client.set_session_key(None);
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// `server/info` content (version, serverName, ...)
    pub async fn info(&self) -> Result<Content> {
        let response = self.client.get(SERVER_INFO_PATH, &Params::new()).await?;
        parse_feed(&response.text, |_| SERVER_INFO_PATH.to_string())?
            .into_iter()
            .next()
            .map(|record| record.content)
            .ok_or_else(|| Error::UnexpectedResponse("server/info returned no entry".to_string()))
    }

    pub fn saved_searches(&self) -> SavedSearches {
        SavedSearches::new(self.client.clone())
    }

    pub fn jobs(&self) -> Jobs {
        Jobs::new(self.client.clone())
    }
}
