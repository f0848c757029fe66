//! Settings structures for SavedSearch-RS configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Main settings structure, loaded from settings.yml or a .splunkrc file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub outgoing: OutgoingSettings,
    pub wait: WaitSettings,
    pub emulator: EmulatorSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Load connection settings from a `.splunkrc`-style file
    ///
    /// Each non-empty, non-comment line is `key=value`. Unknown keys are
    /// ignored so the same file can be shared with other SDKs.
    pub fn from_rc_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_rc_str(&content)
    }

    /// Parse the contents of a `.splunkrc`-style file
    pub fn from_rc_str(content: &str) -> Result<Self> {
        let mut settings = Settings::default();

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::Config(format!("line {}: expected key=value", lineno + 1))
            })?;

            settings
                .connection
                .apply(key.trim(), value.trim())
                .map_err(|e| Error::Config(format!("line {}: {}", lineno + 1, e)))?;
        }

        Ok(settings)
    }

    /// Merge with environment variables (SPLUNK_* and SAVEDSEARCH_* prefixes)
    pub fn merge_env(&mut self) {
        for (var, key) in [
            ("SPLUNK_HOST", "host"),
            ("SPLUNK_PORT", "port"),
            ("SPLUNK_SCHEME", "scheme"),
            ("SPLUNK_USERNAME", "username"),
            ("SPLUNK_PASSWORD", "password"),
            ("SPLUNK_APP", "app"),
            ("SPLUNK_OWNER", "owner"),
            ("SPLUNK_TOKEN", "token"),
        ] {
            if let Ok(val) = std::env::var(var) {
                if let Err(e) = self.connection.apply(key, &val) {
                    tracing::warn!("Ignoring {}: {}", var, e);
                }
            }
        }

        if let Ok(val) = std::env::var("SAVEDSEARCH_WAIT_TIMEOUT") {
            if let Ok(secs) = val.parse() {
                self.wait.timeout = secs;
            }
        }
        if let Ok(val) = std::env::var("SAVEDSEARCH_WAIT_INTERVAL") {
            if let Ok(secs) = val.parse() {
                self.wait.interval = secs;
            }
        }
        if let Ok(val) = std::env::var("SAVEDSEARCH_EMULATOR_PORT") {
            if let Ok(port) = val.parse() {
                self.emulator.port = port;
            }
        }
    }
}

/// Where and how to reach the search service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// http or https
    pub scheme: String,
    pub host: String,
    /// Management port
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Pre-issued session token; skips login when set
    pub token: Option<String>,
    /// Namespace owner
    pub owner: Option<String>,
    /// Namespace app
    pub app: Option<String>,
    /// Send HTTP Basic credentials instead of a session key
    pub basic: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            host: "localhost".to_string(),
            port: 8089,
            username: "admin".to_string(),
            password: "changeme".to_string(),
            token: None,
            owner: None,
            app: None,
            basic: false,
        }
    }
}

impl ConnectionSettings {
    /// Base URL of the management API, e.g. `https://localhost:8089`
    pub fn base_url(&self) -> Result<url::Url> {
        let url = url::Url::parse(&format!("{}://{}:{}", self.scheme, self.host, self.port))?;
        Ok(url)
    }

    fn apply(&mut self, key: &str, value: &str) -> std::result::Result<(), String> {
        match key {
            "host" => self.host = value.to_string(),
            "port" => {
                self.port = value
                    .parse()
                    .map_err(|_| format!("invalid port '{}'", value))?
            }
            "scheme" => match value {
                "http" | "https" => self.scheme = value.to_string(),
                other => return Err(format!("unsupported scheme '{}'", other)),
            },
            "username" => self.username = value.to_string(),
            "password" => self.password = value.to_string(),
            "token" => self.token = Some(value.to_string()),
            "owner" => self.owner = Some(value.to_string()),
            "app" => self.app = Some(value.to_string()),
            "basic" => self.basic = matches!(value, "1" | "true" | "True"),
            _ => {}
        }
        Ok(())
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Verify TLS certificates; management ports commonly use self-signed certs
    pub verify_ssl: bool,
    /// Proxy settings
    pub proxies: ProxySettings,
    /// Extra headers to send
    pub extra_headers: HashMap<String, String>,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 30.0,
            verify_ssl: false,
            proxies: ProxySettings::default(),
            extra_headers: HashMap::new(),
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// Polling policy for waiting on asynchronous jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSettings {
    /// Give up after this many seconds
    pub timeout: f64,
    /// Seconds between refreshes
    pub interval: f64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout: 30.0,
            interval: 1.0,
        }
    }
}

impl WaitSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout.max(0.0))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval.max(0.0))
    }
}

/// Local emulator server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorSettings {
    /// Bind address
    pub bind_address: String,
    /// Server port (0 picks a free port)
    pub port: u16,
    /// Accepted login
    pub username: String,
    pub password: String,
    /// Milliseconds a dispatched job stays running before it reports done
    pub job_latency_ms: u64,
    /// Seconds after dispatch before an uncancelled job is discarded
    pub job_ttl_secs: u64,
    /// Seconds a session key stays valid after login
    pub session_ttl_secs: u64,
    /// Value of the `server/info` serverName field
    pub server_name: String,
}

impl Default for EmulatorSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8089,
            username: "admin".to_string(),
            password: "changeme".to_string(),
            job_latency_ms: 1500,
            job_ttl_secs: 600,
            session_ttl_secs: 3600,
            server_name: "savedsearch-emulator".to_string(),
        }
    }
}

impl EmulatorSettings {
    pub fn job_latency(&self) -> Duration {
        Duration::from_millis(self.job_latency_ms)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
