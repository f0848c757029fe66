//! Shared harness for the saved-search scenarios
//!
//! By default every test gets its own emulator on an ephemeral port. Set
//! `SAVEDSEARCH_LIVE_RC` to a `.splunkrc` file to run against a real service.

#![allow(dead_code)]

use savedsearch_rs::config::{EmulatorSettings, OutgoingSettings, Settings};
use savedsearch_rs::emulator::{self, EmulatorHandle};
use savedsearch_rs::{Job, SavedSearches, Service, WaitPolicy};
use std::time::Duration;

/// Query used by every scenario
pub const SEARCH: &str = "search index=sdk-tests * earliest=-1m";

/// Emulated job latency; long enough that a wait has to poll at least once
pub const JOB_LATENCY_MS: u64 = 200;

pub struct TestContext {
    pub service: Service,
    emulator: Option<EmulatorHandle>,
}

impl TestContext {
    /// Connect to the live service if configured, else start an emulator
    pub async fn start() -> Self {
        if let Ok(path) = std::env::var("SAVEDSEARCH_LIVE_RC") {
            let mut settings = Settings::from_rc_file(&path).expect("readable .splunkrc");
            settings.merge_env();
            let service = Service::from_settings(&settings)
                .await
                .expect("connect to live service");
            return Self {
                service,
                emulator: None,
            };
        }

        Self::emulated(JOB_LATENCY_MS).await
    }

    /// Always use an emulator, with the given job latency
    pub async fn emulated(job_latency_ms: u64) -> Self {
        let emulator = emulator::spawn(EmulatorSettings {
            port: 0,
            job_latency_ms,
            ..Default::default()
        })
        .await
        .expect("start emulator");

        let policy = WaitPolicy::new(Duration::from_secs(10), Duration::from_millis(50));
        let service =
            Service::connect(&emulator.connection_settings(), &OutgoingSettings::default())
                .await
                .expect("log in to emulator")
                .with_wait_policy(policy);

        Self {
            service,
            emulator: Some(emulator),
        }
    }

    pub fn is_emulated(&self) -> bool {
        self.emulator.is_some()
    }

    pub fn emulator(&self) -> Option<&EmulatorHandle> {
        self.emulator.as_ref()
    }

    pub fn saved_searches(&self) -> SavedSearches {
        self.service.saved_searches()
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        *self.service.wait_policy()
    }
}

/// Whether a job with `sid` is in `history`
pub fn contains(history: &[Job], sid: &str) -> bool {
    history.iter().any(|job| job.sid() == sid)
}
