//! In-memory store behind the emulator

use crate::config::EmulatorSettings;
use crate::entity::parse_flag;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Request arguments that are never stored as fields
const RESERVED_ARGS: &[&str] = &["name", "output_mode"];

/// Errors the emulator reports to clients
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmulatorError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A stored saved search
#[derive(Debug, Clone)]
pub struct StoredSearch {
    pub name: String,
    pub owner: String,
    pub app: String,
    pub content: Map<String, Value>,
    pub updated: DateTime<Utc>,
}

/// A dispatched job
#[derive(Debug, Clone)]
pub struct StoredJob {
    pub sid: String,
    pub search: String,
    /// Name of the saved search it was dispatched from
    pub label: Option<String>,
    pub owner: String,
    pub app: String,
    pub options: BTreeMap<String, String>,
    pub dispatched: Instant,
    pub published: DateTime<Utc>,
    pub finalized: bool,
    /// Set while paused; the run clock is stopped from this instant
    pub paused_at: Option<Instant>,
    /// Time spent in earlier, already resumed pauses
    pub paused_for: Duration,
}

impl StoredJob {
    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Time since dispatch, excluding pauses
    pub fn run_time(&self) -> Duration {
        let current_pause = self.paused_at.map(|at| at.elapsed()).unwrap_or_default();
        self.dispatched
            .elapsed()
            .saturating_sub(self.paused_for + current_pause)
    }

    pub fn progress(&self, latency: Duration) -> f64 {
        if self.finalized || latency.is_zero() {
            return 1.0;
        }
        (self.run_time().as_secs_f64() / latency.as_secs_f64()).min(1.0)
    }

    pub fn is_done(&self, latency: Duration) -> bool {
        self.finalized || self.run_time() >= latency
    }

    /// Past its time to live, counted from dispatch
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.dispatched.elapsed() > ttl
    }

    fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    fn unpause(&mut self) {
        if let Some(at) = self.paused_at.take() {
            self.paused_for += at.elapsed();
        }
    }

    /// Requested `dispatch.buckets`, 0 when absent
    pub fn buckets(&self) -> usize {
        self.options
            .get("dispatch.buckets")
            .or_else(|| self.options.get("buckets"))
            .and_then(|b| b.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct Store {
    /// Session key -> time of login
    sessions: HashMap<String, Instant>,
    saved_searches: BTreeMap<String, StoredSearch>,
    jobs: BTreeMap<String, StoredJob>,
    job_counter: u64,
}

/// Shared emulator state
#[derive(Clone)]
pub struct EmulatorState {
    pub settings: Arc<EmulatorSettings>,
    store: Arc<RwLock<Store>>,
}

impl EmulatorState {
    pub fn new(settings: EmulatorSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            store: Arc::new(RwLock::new(Store::default())),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Write access with expired jobs and sessions already dropped
    fn live(&self) -> RwLockWriteGuard<'_, Store> {
        let job_ttl = self.settings.job_ttl();
        let session_ttl = self.settings.session_ttl();

        let mut store = self.write();
        let jobs_before = store.jobs.len();
        store.jobs.retain(|_, job| !job.is_expired(job_ttl));
        store
            .sessions
            .retain(|_, issued| issued.elapsed() <= session_ttl);

        let expired = jobs_before - store.jobs.len();
        if expired > 0 {
            tracing::debug!("Expired {} jobs", expired);
        }
        store
    }

    pub fn job_latency(&self) -> Duration {
        self.settings.job_latency()
    }

    /// Issue a session key for valid credentials
    pub fn login(&self, username: &str, password: &str) -> Result<String, EmulatorError> {
        if username != self.settings.username || password != self.settings.password {
            return Err(EmulatorError::Unauthorized);
        }
        let key = uuid::Uuid::new_v4().simple().to_string();
        self.live().sessions.insert(key.clone(), Instant::now());
        Ok(key)
    }

    /// Check an Authorization header value
    pub fn authorize(&self, header: &str) -> bool {
        if let Some(key) = header.strip_prefix("Splunk ") {
            return self.live().sessions.contains_key(key.trim());
        }
        if let Some(encoded) = header.strip_prefix("Basic ") {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok());
            if let Some((user, pass)) = decoded.as_deref().and_then(|s| s.split_once(':')) {
                return user == self.settings.username && pass == self.settings.password;
            }
        }
        false
    }

    pub fn list_saved_searches(&self) -> Vec<StoredSearch> {
        self.read().saved_searches.values().cloned().collect()
    }

    pub fn get_saved_search(&self, name: &str) -> Result<StoredSearch, EmulatorError> {
        self.read()
            .saved_searches
            .get(name)
            .cloned()
            .ok_or_else(|| not_found("saved search", name))
    }

    pub fn create_saved_search(
        &self,
        owner: &str,
        app: &str,
        args: &HashMap<String, String>,
    ) -> Result<StoredSearch, EmulatorError> {
        let name = args
            .get("name")
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| EmulatorError::BadRequest("Missing argument: name".to_string()))?;
        let search = args
            .get("search")
            .ok_or_else(|| EmulatorError::BadRequest("Missing argument: search".to_string()))?;

        let mut store = self.write();
        if store.saved_searches.contains_key(name) {
            return Err(EmulatorError::Conflict(format!(
                "An object with name={} already exists",
                name
            )));
        }

        let mut content = default_content(search);
        apply_fields(&mut content, args);

        let stored = StoredSearch {
            name: name.clone(),
            owner: owner.to_string(),
            app: app.to_string(),
            content,
            updated: Utc::now(),
        };
        store.saved_searches.insert(name.clone(), stored.clone());
        Ok(stored)
    }

    pub fn update_saved_search(
        &self,
        name: &str,
        args: &HashMap<String, String>,
    ) -> Result<StoredSearch, EmulatorError> {
        let mut store = self.write();
        let stored = store
            .saved_searches
            .get_mut(name)
            .ok_or_else(|| not_found("saved search", name))?;

        apply_fields(&mut stored.content, args);
        stored.updated = Utc::now();
        Ok(stored.clone())
    }

    pub fn delete_saved_search(&self, name: &str) -> Result<(), EmulatorError> {
        self.write()
            .saved_searches
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found("saved search", name))
    }

    /// Start a job for a saved search; returns its sid
    pub fn dispatch(
        &self,
        name: &str,
        owner: &str,
        options: &HashMap<String, String>,
    ) -> Result<String, EmulatorError> {
        let mut store = self.live();
        let saved = store
            .saved_searches
            .get(name)
            .ok_or_else(|| not_found("saved search", name))?;

        let search = saved
            .content
            .get("search")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let app = saved.app.clone();

        store.job_counter += 1;
        let sid = format!(
            "{owner}__{owner}__{app}__RMD5{digest}_at_{epoch}_{counter}",
            digest = &format!("{:x}", md5::compute(name.as_bytes()))[..16],
            epoch = Utc::now().timestamp(),
            counter = store.job_counter,
        );

        let job = new_job(&sid, search, Some(name.to_string()), owner, &app, options);
        store.jobs.insert(sid.clone(), job);
        Ok(sid)
    }

    /// Start an ad-hoc search job; returns its sid
    pub fn create_job(
        &self,
        owner: &str,
        app: &str,
        args: &HashMap<String, String>,
    ) -> Result<String, EmulatorError> {
        let search = args
            .get("search")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| EmulatorError::BadRequest("Missing argument: search".to_string()))?
            .clone();

        let mut store = self.live();
        store.job_counter += 1;
        let sid = format!("{}.{}", Utc::now().timestamp(), store.job_counter);

        let job = new_job(&sid, search, None, owner, app, args);
        store.jobs.insert(sid.clone(), job);
        Ok(sid)
    }

    /// Live jobs dispatched from a saved search
    pub fn history(&self, name: &str) -> Result<Vec<StoredJob>, EmulatorError> {
        let store = self.live();
        if !store.saved_searches.contains_key(name) {
            return Err(not_found("saved search", name));
        }
        Ok(store
            .jobs
            .values()
            .filter(|j| j.label.as_deref() == Some(name))
            .cloned()
            .collect())
    }

    pub fn list_jobs(&self) -> Vec<StoredJob> {
        self.live().jobs.values().cloned().collect()
    }

    pub fn get_job(&self, sid: &str) -> Result<StoredJob, EmulatorError> {
        self.live()
            .jobs
            .get(sid)
            .cloned()
            .ok_or_else(|| not_found("job", sid))
    }

    /// Apply a job control action
    pub fn control(&self, sid: &str, action: &str) -> Result<String, EmulatorError> {
        let mut store = self.live();
        if !store.jobs.contains_key(sid) {
            return Err(not_found("job", sid));
        }

        match action {
            "cancel" => {
                store.jobs.remove(sid);
                Ok("Search job cancelled.".to_string())
            }
            "finalize" | "pause" | "unpause" => {
                if let Some(job) = store.jobs.get_mut(sid) {
                    match action {
                        "finalize" => job.finalized = true,
                        "pause" => job.pause(),
                        _ => job.unpause(),
                    }
                }
                Ok(format!("Search job {}d.", action))
            }
            other => Err(EmulatorError::BadRequest(format!(
                "Unknown action: {}",
                other
            ))),
        }
    }
}

fn not_found(kind: &str, name: &str) -> EmulatorError {
    EmulatorError::NotFound(format!("Could not find {} id={}", kind, name))
}

fn new_job(
    sid: &str,
    search: String,
    label: Option<String>,
    owner: &str,
    app: &str,
    options: &HashMap<String, String>,
) -> StoredJob {
    StoredJob {
        sid: sid.to_string(),
        search,
        label,
        owner: owner.to_string(),
        app: app.to_string(),
        options: options
            .iter()
            .filter(|(k, _)| !RESERVED_ARGS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        dispatched: Instant::now(),
        published: Utc::now(),
        finalized: false,
        paused_at: None,
        paused_for: Duration::ZERO,
    }
}

/// Write request arguments into stored content, keeping each field's type
fn apply_fields(content: &mut Map<String, Value>, args: &HashMap<String, String>) {
    for (key, raw) in args {
        if RESERVED_ARGS.contains(&key.as_str()) {
            continue;
        }
        let value = match content.get(key) {
            Some(Value::Bool(_)) => parse_flag(raw)
                .map(Value::Bool)
                .unwrap_or_else(|| Value::String(raw.clone())),
            Some(Value::Number(_)) => raw
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(raw.clone())),
            _ => Value::String(raw.clone()),
        };
        content.insert(key.clone(), value);
    }
}

/// Content of a freshly created saved search
pub fn default_content(search: &str) -> Map<String, Value> {
    let defaults = json!({
        "search": search,
        "description": "",
        "disabled": false,
        "is_visible": true,
        "is_scheduled": false,
        "cron_schedule": "",
        "max_concurrent": 1,
        "realtime_schedule": true,
        "restart_on_searchpeer_add": true,
        "run_on_startup": false,
        "alert.digest_mode": true,
        "alert.expires": "24h",
        "alert.severity": 3,
        "alert.suppress": false,
        "alert.track": false,
        "alert_type": "always",
        "alert_comparator": "",
        "alert_threshold": "",
        "action.email": false,
        "action.populate_lookup": false,
        "action.rss": false,
        "action.script": false,
        "action.summary_index": false,
        "dispatch.buckets": 0,
        "dispatch.earliest_time": "",
        "dispatch.latest_time": "",
        "dispatch.lookups": true,
        "dispatch.max_count": 500000,
        "dispatch.max_time": 0,
        "dispatch.reduce_freq": 10,
        "dispatch.spawn_process": true,
        "dispatch.time_format": "%FT%T.%Q%:z",
        "dispatch.ttl": "2p",
    });

    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
