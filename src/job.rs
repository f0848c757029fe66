//! Search jobs
//!
//! A job is one execution of a search, addressed by its sid. Its status
//! fields only change when the job is refreshed.

use crate::entity::{fetch_record, Collection, Content, Entity, Record, Refresh};
use crate::error::{Error, Result};
use crate::network::{encode_segment, ApiRequest, HttpClient, Params};
use crate::wait::{wait_until, WaitOutcome, WaitPolicy};
use async_trait::async_trait;
use futures::stream::{self, Stream};
use serde::Deserialize;
use tracing::{debug, info};

const JOBS_ENDPOINT: &str = "search/jobs";

/// Response body of a dispatch or job creation
#[derive(Debug, Deserialize)]
pub(crate) struct SidResponse {
    pub sid: String,
}

/// Handle to one search execution
#[derive(Clone)]
pub struct Job {
    client: HttpClient,
    sid: String,
    record: Option<Record>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("sid", &self.sid)
            .field("fetched", &self.record.is_some())
            .finish()
    }
}

impl Entity for Job {
    fn from_record(client: HttpClient, record: Record) -> Self {
        Self {
            client,
            sid: record.name.clone(),
            record: Some(record),
        }
    }
}

#[async_trait]
impl Refresh for Job {
    async fn refresh(&mut self) -> Result<()> {
        let record = fetch_record(&self.client, &self.endpoint()).await?;
        self.record = Some(record);
        Ok(())
    }
}

impl Job {
    /// A job known only by sid; its state is fetched on first refresh
    pub fn new(client: HttpClient, sid: impl Into<String>) -> Self {
        Self {
            client,
            sid: sid.into(),
            record: None,
        }
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", JOBS_ENDPOINT, encode_segment(&self.sid))
    }

    /// Last fetched content; empty until the first refresh
    pub fn content(&self) -> Content {
        self.record
            .as_ref()
            .map(|r| r.content.clone())
            .unwrap_or_default()
    }

    /// Last fetched value of a status field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.record.as_ref().and_then(|r| r.content.get(key))
    }

    /// Last fetched `isDone` flag
    pub fn is_done(&self) -> bool {
        self.record
            .as_ref()
            .and_then(|r| r.content.flag("isDone"))
            .unwrap_or(false)
    }

    /// Last fetched `dispatchState` (QUEUED, RUNNING, DONE, ...)
    pub fn dispatch_state(&self) -> Option<&str> {
        self.get("dispatchState")
    }

    /// Poll until the job reports done or the policy gives up
    pub async fn wait_until_done(&mut self, policy: &WaitPolicy) -> Result<WaitOutcome> {
        wait_until(self, |job| job.is_done(), policy).await
    }

    /// Stream the job's results
    pub async fn results(&self, params: &Params) -> Result<ResultStream> {
        self.open_stream("results", params).await
    }

    /// Stream the job's event-count timeline
    pub async fn timeline(&self, params: &Params) -> Result<ResultStream> {
        self.open_stream("timeline", params).await
    }

    async fn open_stream(&self, view: &str, params: &Params) -> Result<ResultStream> {
        let request = ApiRequest::get(format!("{}/{}", self.endpoint(), view)).params(params);
        let response = self.client.execute_streaming(request).await?;
        debug!("Opened {} stream for job {}", view, self.sid);
        Ok(ResultStream {
            response: Some(response),
        })
    }

    /// Run a control action (cancel, finalize, pause, ...)
    pub async fn control(&self, action: &str) -> Result<()> {
        let params = Params::new().set("action", action);
        self.client
            .post(&format!("{}/control", self.endpoint()), &params)
            .await?;
        Ok(())
    }

    /// Stop the job and discard it on the server
    pub async fn cancel(&self) -> Result<()> {
        self.control("cancel").await?;
        info!("Cancelled job {}", self.sid);
        Ok(())
    }
}

/// Unread body of a results or timeline request
///
/// Dropping the stream closes the underlying connection.
pub struct ResultStream {
    response: Option<reqwest::Response>,
}

impl ResultStream {
    /// Next chunk of the body, `None` once exhausted or closed
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(response) = self.response.as_mut() else {
            return Ok(None);
        };
        match response.chunk().await? {
            Some(chunk) => Ok(Some(chunk.to_vec())),
            None => {
                self.response = None;
                Ok(None)
            }
        }
    }

    /// Read the remaining body as text
    pub async fn read_to_string(mut self) -> Result<String> {
        let mut body = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            body.extend_from_slice(&chunk);
        }
        String::from_utf8(body).map_err(|e| Error::UnexpectedResponse(e.to_string()))
    }

    /// Body chunks as a stream
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<u8>>> {
        stream::unfold(self, |mut rs| async move {
            match rs.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), rs)),
                Ok(None) => None,
                Err(e) => {
                    rs.close_in_place();
                    Some((Err(e), rs))
                }
            }
        })
    }

    pub fn is_closed(&self) -> bool {
        self.response.is_none()
    }

    fn close_in_place(&mut self) {
        self.response = None;
    }

    /// Release the connection without reading the rest of the body
    pub fn close(mut self) {
        self.close_in_place();
    }
}

/// The `search/jobs` collection
#[derive(Clone)]
pub struct Jobs {
    inner: Collection<Job>,
}

impl Jobs {
    pub fn new(client: HttpClient) -> Self {
        Self {
            inner: Collection::new(client, JOBS_ENDPOINT),
        }
    }

    /// Start an ad-hoc search job
    pub async fn create(&self, search: &str, params: &Params) -> Result<Job> {
        let mut args = Params::new().set("search", search);
        args.extend(params);

        let client = self.inner.client();
        let response = client.post(JOBS_ENDPOINT, &args).await?;
        let SidResponse { sid } = response.json()?;
        info!("Created job {}", sid);

        Ok(Job::new(client.clone(), sid))
    }

    pub async fn get(&self, sid: &str) -> Result<Job> {
        self.inner.get(sid).await
    }

    pub async fn contains(&self, sid: &str) -> Result<bool> {
        self.inner.contains(sid).await
    }

    pub async fn list(&self) -> Result<Vec<Job>> {
        self.inner.list().await
    }
}
