//! HTTP request handlers

use super::state::{EmulatorError, EmulatorState, StoredJob, StoredSearch};
use crate::network::encode_segment;
use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Form, Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;

type Args = HashMap<String, String>;

impl IntoResponse for EmulatorError {
    fn into_response(self) -> Response {
        let status = match self {
            EmulatorError::NotFound(_) => StatusCode::NOT_FOUND,
            EmulatorError::Conflict(_) => StatusCode::CONFLICT,
            EmulatorError::BadRequest(_) => StatusCode::BAD_REQUEST,
            EmulatorError::Unauthorized => StatusCode::UNAUTHORIZED,
        };
        if status != StatusCode::NOT_FOUND {
            tracing::warn!("Rejecting request: {}", self);
        }
        let body = json!({"messages": [{"type": "ERROR", "text": self.to_string()}]});
        (status, Json(body)).into_response()
    }
}

/// Owner and app of the request's namespace, wildcards resolved
fn namespace(params: &Args) -> (String, String) {
    let pick = |key: &str, default: &str| {
        params
            .get(key)
            .filter(|v| v.as_str() != "-")
            .cloned()
            .unwrap_or_else(|| default.to_string())
    };
    (pick("owner", "nobody"), pick("app", "search"))
}

/// Path captures; routes under `/services` with no segments have none
fn captures(params: Option<Path<Args>>) -> Args {
    params.map(|Path(p)| p).unwrap_or_default()
}

fn path_param(params: &Args, key: &str) -> Result<String, EmulatorError> {
    params
        .get(key)
        .cloned()
        .ok_or_else(|| EmulatorError::BadRequest(format!("Missing path segment: {}", key)))
}

fn saved_search_path(search: &StoredSearch) -> String {
    format!(
        "/servicesNS/{}/{}/saved/searches/{}",
        encode_segment(&search.owner),
        encode_segment(&search.app),
        encode_segment(&search.name)
    )
}

fn job_path(job: &StoredJob) -> String {
    format!(
        "/servicesNS/{}/{}/search/jobs/{}",
        encode_segment(&job.owner),
        encode_segment(&job.app),
        encode_segment(&job.sid)
    )
}

fn acl(owner: &str, app: &str) -> Value {
    json!({
        "owner": owner,
        "app": app,
        "sharing": "app",
        "can_write": true,
        "can_list": true,
        "modifiable": true,
        "removable": true,
        "perms": {"read": ["*"], "write": ["admin"]},
    })
}

fn saved_search_entry(search: &StoredSearch) -> Value {
    let path = saved_search_path(search);
    let mut content = search.content.clone();
    content.insert(
        "eai:attributes".to_string(),
        json!({
            "requiredFields": ["search"],
            "optionalFields": [
                "cron_schedule",
                "description",
                "disabled",
                "is_scheduled",
                "is_visible",
            ],
            "wildcardFields": ["action\\..*", "alert\\..*", "dispatch\\..*"],
        }),
    );

    json!({
        "name": search.name,
        "id": path,
        "updated": search.updated.to_rfc3339(),
        "links": {
            "alternate": path,
            "list": path,
            "edit": path,
            "remove": path,
            "dispatch": format!("{}/dispatch", path),
            "history": format!("{}/history", path),
        },
        "author": search.owner,
        "acl": acl(&search.owner, &search.app),
        "content": content,
    })
}

fn job_entry(state: &EmulatorState, job: &StoredJob) -> Value {
    let path = job_path(job);
    let latency = state.job_latency();
    let done = job.is_done(latency);
    let dispatch_state = if done {
        "DONE"
    } else if job.is_paused() {
        "PAUSED"
    } else {
        "RUNNING"
    };

    json!({
        "name": job.sid,
        "id": path,
        "updated": Utc::now().to_rfc3339(),
        "links": {
            "alternate": path,
            "events": format!("{}/events", path),
            "results": format!("{}/results", path),
            "timeline": format!("{}/timeline", path),
            "control": format!("{}/control", path),
        },
        "published": job.published.to_rfc3339(),
        "author": job.owner,
        "acl": acl(&job.owner, &job.app),
        "content": {
            "sid": job.sid,
            "label": job.label,
            "search": job.search,
            "dispatchState": dispatch_state,
            "isDone": done,
            "isFinalized": job.finalized,
            "isPaused": job.is_paused(),
            "isSaved": false,
            "isSavedSearch": job.label.is_some(),
            "doneProgress": job.progress(latency),
            "eventCount": 0,
            "resultCount": 0,
            "scanCount": 0,
            "runDuration": job.run_time().as_secs_f64(),
            "ttl": state.settings.job_ttl_secs,
            "request": job.options,
        },
    })
}

/// Wrap entries in a feed, applying `count` (default 30, 0 = all) and `offset`
fn feed(entries: Vec<Value>, query: &Args) -> Value {
    let total = entries.len();
    let offset = query
        .get("offset")
        .and_then(|o| o.parse::<usize>().ok())
        .unwrap_or(0);
    let count = query
        .get("count")
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(30);

    let page: Vec<Value> = entries
        .into_iter()
        .skip(offset)
        .take(if count == 0 { usize::MAX } else { count })
        .collect();

    json!({
        "generator": {"version": crate::VERSION},
        "updated": Utc::now().to_rfc3339(),
        "entry": page,
        "paging": {"total": total, "perPage": count, "offset": offset},
        "messages": [],
    })
}

fn info_message(text: &str) -> Value {
    json!({"messages": [{"type": "INFO", "text": text}]})
}

/// Reject requests without a valid session key or Basic credentials
pub async fn require_auth(
    State(state): State<EmulatorState>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| state.authorize(v))
        .unwrap_or(false);

    if authorized {
        next.run(request).await
    } else {
        EmulatorError::Unauthorized.into_response()
    }
}

/// Login handler
pub async fn login(State(state): State<EmulatorState>, Form(args): Form<Args>) -> Response {
    let username = args.get("username").map(String::as_str).unwrap_or_default();
    let password = args.get("password").map(String::as_str).unwrap_or_default();

    match state.login(username, password) {
        Ok(key) => Json(json!({"sessionKey": key})).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Server info handler
pub async fn server_info(State(state): State<EmulatorState>) -> impl IntoResponse {
    let entry = json!({
        "name": "server-info",
        "id": "/services/server/info/server-info",
        "updated": Utc::now().to_rfc3339(),
        "links": {"alternate": "/services/server/info/server-info"},
        "content": {
            "serverName": state.settings.server_name,
            "version": crate::VERSION,
            "product_type": "emulator",
            "os_name": std::env::consts::OS,
            "isFree": false,
        },
    });
    Json(feed(vec![entry], &Args::new()))
}

pub async fn list_saved_searches(
    State(state): State<EmulatorState>,
    Query(query): Query<Args>,
) -> impl IntoResponse {
    let filter = query.get("search").cloned().unwrap_or_default();
    let entries = state
        .list_saved_searches()
        .iter()
        .filter(|s| filter.is_empty() || s.name.contains(&filter))
        .map(saved_search_entry)
        .collect();
    Json(feed(entries, &query))
}

pub async fn create_saved_search(
    State(state): State<EmulatorState>,
    params: Option<Path<Args>>,
    Form(args): Form<Args>,
) -> Result<impl IntoResponse, EmulatorError> {
    let (owner, app) = namespace(&captures(params));
    let created = state.create_saved_search(&owner, &app, &args)?;
    tracing::info!("Created saved search {}", created.name);
    Ok((
        StatusCode::CREATED,
        Json(feed(vec![saved_search_entry(&created)], &Args::new())),
    ))
}

pub async fn get_saved_search(
    State(state): State<EmulatorState>,
    Path(params): Path<Args>,
) -> Result<impl IntoResponse, EmulatorError> {
    let name = path_param(&params, "name")?;
    let search = state.get_saved_search(&name)?;
    Ok(Json(feed(vec![saved_search_entry(&search)], &Args::new())))
}

pub async fn update_saved_search(
    State(state): State<EmulatorState>,
    Path(params): Path<Args>,
    Form(args): Form<Args>,
) -> Result<impl IntoResponse, EmulatorError> {
    let name = path_param(&params, "name")?;
    let updated = state.update_saved_search(&name, &args)?;
    Ok(Json(feed(vec![saved_search_entry(&updated)], &Args::new())))
}

pub async fn delete_saved_search(
    State(state): State<EmulatorState>,
    Path(params): Path<Args>,
) -> Result<impl IntoResponse, EmulatorError> {
    let name = path_param(&params, "name")?;
    state.delete_saved_search(&name)?;
    tracing::info!("Deleted saved search {}", name);

    let remaining = state
        .list_saved_searches()
        .iter()
        .map(saved_search_entry)
        .collect();
    Ok(Json(feed(remaining, &Args::new())))
}

pub async fn dispatch(
    State(state): State<EmulatorState>,
    Path(params): Path<Args>,
    Form(args): Form<Args>,
) -> Result<impl IntoResponse, EmulatorError> {
    let name = path_param(&params, "name")?;
    let owner = params
        .get("owner")
        .filter(|o| o.as_str() != "-")
        .cloned()
        .unwrap_or_else(|| state.settings.username.clone());
    let sid = state.dispatch(&name, &owner, &args)?;
    tracing::info!("Dispatched {} as {}", name, sid);
    Ok((StatusCode::CREATED, Json(json!({"sid": sid}))))
}

pub async fn history(
    State(state): State<EmulatorState>,
    Path(params): Path<Args>,
    Query(query): Query<Args>,
) -> Result<impl IntoResponse, EmulatorError> {
    let name = path_param(&params, "name")?;
    let entries = state
        .history(&name)?
        .iter()
        .map(|job| job_entry(&state, job))
        .collect();
    Ok(Json(feed(entries, &query)))
}

pub async fn list_jobs(
    State(state): State<EmulatorState>,
    Query(query): Query<Args>,
) -> impl IntoResponse {
    let entries = state
        .list_jobs()
        .iter()
        .map(|job| job_entry(&state, job))
        .collect();
    Json(feed(entries, &query))
}

pub async fn create_job(
    State(state): State<EmulatorState>,
    params: Option<Path<Args>>,
    Form(args): Form<Args>,
) -> Result<impl IntoResponse, EmulatorError> {
    let (owner, app) = namespace(&captures(params));
    let sid = state.create_job(&owner, &app, &args)?;
    Ok((StatusCode::CREATED, Json(json!({"sid": sid}))))
}

pub async fn get_job(
    State(state): State<EmulatorState>,
    Path(params): Path<Args>,
) -> Result<impl IntoResponse, EmulatorError> {
    let sid = path_param(&params, "sid")?;
    let job = state.get_job(&sid)?;
    Ok(Json(feed(vec![job_entry(&state, &job)], &Args::new())))
}

pub async fn delete_job(
    State(state): State<EmulatorState>,
    Path(params): Path<Args>,
) -> Result<impl IntoResponse, EmulatorError> {
    let sid = path_param(&params, "sid")?;
    let message = state.control(&sid, "cancel")?;
    Ok(Json(info_message(&message)))
}

pub async fn job_control(
    State(state): State<EmulatorState>,
    Path(params): Path<Args>,
    Form(args): Form<Args>,
) -> Result<impl IntoResponse, EmulatorError> {
    let sid = path_param(&params, "sid")?;
    let action = args
        .get("action")
        .ok_or_else(|| EmulatorError::BadRequest("Missing argument: action".to_string()))?;
    let message = state.control(&sid, action)?;
    Ok(Json(info_message(&message)))
}

pub async fn results(
    State(state): State<EmulatorState>,
    Path(params): Path<Args>,
) -> Result<impl IntoResponse, EmulatorError> {
    let sid = path_param(&params, "sid")?;
    let job = state.get_job(&sid)?;
    Ok(Json(json!({
        "preview": !job.is_done(state.job_latency()),
        "init_offset": 0,
        "messages": [],
        "fields": [{"name": "_raw"}, {"name": "_time"}],
        "results": [],
    })))
}

/// Event-count buckets over the last minute, `dispatch.buckets` of them
pub async fn timeline(
    State(state): State<EmulatorState>,
    Path(params): Path<Args>,
) -> Result<impl IntoResponse, EmulatorError> {
    let sid = path_param(&params, "sid")?;
    let job = state.get_job(&sid)?;
    let done = job.is_done(state.job_latency());

    let count = job.buckets().min(1000);
    let start = job.published.timestamp() as f64 - 60.0;
    let width = if count == 0 { 0.0 } else { 60.0 / count as f64 };
    let buckets: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "earliest_time": start + width * i as f64,
                "duration": width,
                "available_count": 0,
                "total_count": 0,
                "is_finalized": done,
            })
        })
        .collect();

    Ok(Json(json!({
        "event_count": 0,
        "cursor_time": start,
        "is_finalized": done,
        "buckets": buckets,
    })))
}
