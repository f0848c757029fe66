//! Saved-search scenarios: CRUD, dispatch, history, and reading every field

mod common;

use common::{contains, TestContext, SEARCH};
use savedsearch_rs::config::{ConnectionSettings, OutgoingSettings};
use savedsearch_rs::{unique_name, Error, Params, Refresh, Result, Service, WaitPolicy};
use std::time::Duration;

/// Content keys every saved search exposes
const SAVED_SEARCH_FIELDS: &[&str] = &[
    "alert.expires",
    "alert.severity",
    "alert.track",
    "alert_type",
    "dispatch.buckets",
    "dispatch.lookups",
    "dispatch.max_count",
    "dispatch.max_time",
    "dispatch.reduce_freq",
    "dispatch.spawn_process",
    "dispatch.time_format",
    "dispatch.ttl",
    "max_concurrent",
    "realtime_schedule",
    "restart_on_searchpeer_add",
    "run_on_startup",
    "search",
    "action.email",
    "action.populate_lookup",
    "action.rss",
    "action.script",
    "action.summary_index",
    "is_scheduled",
    "is_visible",
];

#[tokio::test]
async fn test_crud() -> Result<()> {
    let ctx = TestContext::start().await;
    let saved_searches = ctx.saved_searches();
    let name = unique_name("sdk-test");

    saved_searches.delete_if_exists(&name).await?;
    assert!(!saved_searches.contains(&name).await?);

    let created = saved_searches.create(&name, SEARCH, &Params::new()).await?;
    assert_eq!(created.name(), name);
    assert!(saved_searches.contains(&name).await?);

    let mut saved_search = saved_searches.get(&name).await?;
    assert_eq!(saved_search.get("is_visible"), Some("1"));
    assert_eq!(saved_search.search(), Some(SEARCH));

    saved_search
        .update(&Params::new().set("is_visible", false))
        .await?;
    // update does not touch the local copy
    assert_eq!(saved_search.get("is_visible"), Some("1"));
    saved_search.refresh().await?;
    assert_eq!(saved_search.get("is_visible"), Some("0"));
    assert_eq!(saved_search.is_visible(), Some(false));

    saved_searches.delete(&name).await?;
    assert!(!saved_searches.contains(&name).await?);

    let created = saved_searches
        .create(&name, SEARCH, &Params::new().set("is_visible", false))
        .await?;
    assert_eq!(created.name(), name);
    assert!(saved_searches.contains(&name).await?);
    assert_eq!(created.get("is_visible"), Some("0"));

    saved_searches.delete(&name).await?;
    assert!(!saved_searches.contains(&name).await?);
    Ok(())
}

#[tokio::test]
async fn test_delete_missing_is_not_found() -> Result<()> {
    let ctx = TestContext::start().await;
    let saved_searches = ctx.saved_searches();
    let name = unique_name("sdk-missing");

    let err = saved_searches.delete(&name).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!saved_searches.delete_if_exists(&name).await?);
    assert!(saved_searches.get(&name).await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_dispatch() -> Result<()> {
    let ctx = TestContext::start().await;
    let policy = ctx.wait_policy();
    let saved_search = ctx
        .saved_searches()
        .scoped(&unique_name("sdk-test"), SEARCH, &Params::new())
        .await?;

    let mut job = saved_search.dispatch(&Params::new()).await?;
    job.wait_until_done(&policy).await?.into_result()?;
    assert!(job.is_done());
    job.results(&Params::new()).await?.close();
    job.cancel().await?;

    // Dispatch with some additional options
    let options = Params::new().set("dispatch.buckets", 100);
    let mut job = saved_search.dispatch(&options).await?;
    job.wait_until_done(&policy).await?.into_result()?;
    job.timeline(&Params::new()).await?.close();
    job.cancel().await?;

    saved_search.release().await
}

#[tokio::test]
async fn test_history() -> Result<()> {
    let ctx = TestContext::start().await;
    let saved_search = ctx
        .saved_searches()
        .scoped(&unique_name("sdk-test"), SEARCH, &Params::new())
        .await?;

    // Clear anything left over from a previous run
    for job in saved_search.history().await? {
        job.cancel().await?;
    }
    assert!(saved_search.history().await?.is_empty());

    let job1 = saved_search.dispatch(&Params::new()).await?;
    let history = saved_search.history().await?;
    assert_eq!(history.len(), 1);
    assert!(contains(&history, job1.sid()));

    let job2 = saved_search.dispatch(&Params::new()).await?;
    let history = saved_search.history().await?;
    assert_eq!(history.len(), 2);
    assert!(contains(&history, job1.sid()));
    assert!(contains(&history, job2.sid()));

    job1.cancel().await?;
    let history = saved_search.history().await?;
    assert_eq!(history.len(), 1);
    assert!(!contains(&history, job1.sid()));
    assert!(contains(&history, job2.sid()));

    job2.cancel().await?;
    let history = saved_search.history().await?;
    assert!(history.is_empty());
    assert!(!contains(&history, job1.sid()));
    assert!(!contains(&history, job2.sid()));

    saved_search.release().await
}

#[tokio::test]
async fn test_history_keeps_jobs_of_deleted_namesake() -> Result<()> {
    let ctx = TestContext::start().await;
    let saved_searches = ctx.saved_searches();
    let name = unique_name("sdk-namesake");

    let first = saved_searches.scoped(&name, SEARCH, &Params::new()).await?;
    let leftover = first.dispatch(&Params::new()).await?;
    first.release().await?;
    assert!(!saved_searches.contains(&name).await?);

    let saved_search = saved_searches.scoped(&name, SEARCH, &Params::new()).await?;
    let history = saved_search.history().await?;
    assert!(contains(&history, leftover.sid()));

    for job in history {
        job.cancel().await?;
    }
    assert!(saved_search.history().await?.is_empty());

    saved_search.release().await
}

#[tokio::test]
async fn test_read_all_fields() -> Result<()> {
    let ctx = TestContext::start().await;
    // Make sure there is at least one saved search to read
    let scoped = ctx
        .saved_searches()
        .scoped(&unique_name("sdk-test"), SEARCH, &Params::new())
        .await?;

    let all = ctx.saved_searches().list().await?;
    assert!(all.iter().any(|s| s.name() == scoped.name()));

    for saved_search in &all {
        assert!(!saved_search.name().is_empty());
        assert!(saved_search.path().contains("saved/searches"));
        let _ = saved_search.metadata();
        assert!(!saved_search.content().is_empty());
        for field in SAVED_SEARCH_FIELDS {
            saved_search.require(field)?;
        }
        assert!(saved_search.is_scheduled().is_some());
        assert!(saved_search.is_visible().is_some());
    }

    scoped.release().await
}

#[tokio::test]
async fn test_scoped_release_and_drop() -> Result<()> {
    let ctx = TestContext::start().await;
    let saved_searches = ctx.saved_searches();

    let name = unique_name("sdk-scoped");
    let scoped = saved_searches.scoped(&name, SEARCH, &Params::new()).await?;
    assert!(saved_searches.contains(&name).await?);
    scoped.release().await?;
    assert!(!saved_searches.contains(&name).await?);

    // Scoping an existing name replaces the old entity
    saved_searches
        .create(&name, "search stale", &Params::new())
        .await?;
    let scoped = saved_searches.scoped(&name, SEARCH, &Params::new()).await?;
    assert_eq!(scoped.search(), Some(SEARCH));

    // Dropped without release: deleted in the background
    drop(scoped);
    let mut gone = false;
    for _ in 0..40 {
        if !saved_searches.contains(&name).await? {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(gone, "dropped guard should delete {}", name);
    Ok(())
}

#[tokio::test]
async fn test_list_paging() -> Result<()> {
    let ctx = TestContext::start().await;
    let saved_searches = ctx.saved_searches();

    let mut guards = Vec::new();
    for _ in 0..3 {
        guards.push(
            saved_searches
                .scoped(&unique_name("sdk-page"), SEARCH, &Params::new())
                .await?,
        );
    }

    let page = saved_searches
        .list_with(&Params::new().set("count", 2))
        .await?;
    assert_eq!(page.len(), 2);
    assert!(saved_searches.list().await?.len() >= 3);

    for guard in guards {
        guard.release().await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_adhoc_job() -> Result<()> {
    let ctx = TestContext::start().await;
    let jobs = ctx.service.jobs();

    let mut job = jobs.create(SEARCH, &Params::new()).await?;
    assert!(jobs.contains(job.sid()).await?);

    job.wait_until_done(&ctx.wait_policy()).await?.into_result()?;
    assert_eq!(job.dispatch_state(), Some("DONE"));

    let fetched = jobs.get(job.sid()).await?;
    assert_eq!(fetched.sid(), job.sid());
    assert!(jobs.list().await?.iter().any(|j| j.sid() == job.sid()));

    job.cancel().await?;
    assert!(!jobs.contains(job.sid()).await?);
    Ok(())
}

#[tokio::test]
async fn test_wait_times_out_on_slow_job() -> Result<()> {
    let ctx = TestContext::emulated(60_000).await;
    let saved_search = ctx
        .saved_searches()
        .scoped(&unique_name("sdk-slow"), SEARCH, &Params::new())
        .await?;

    let mut job = saved_search.dispatch(&Params::new()).await?;
    let policy = WaitPolicy::new(Duration::from_millis(200), Duration::from_millis(50));
    let outcome = job.wait_until_done(&policy).await?;

    assert!(!outcome.is_completed());
    assert_eq!(outcome.attempts(), 4);
    assert!(!job.is_done());
    assert_eq!(job.dispatch_state(), Some("RUNNING"));
    assert!(matches!(
        outcome.into_result(),
        Err(Error::WaitTimeout { attempts: 4, .. })
    ));

    // finalize forces completion
    job.control("finalize").await?;
    let outcome = job.wait_until_done(&policy).await?;
    assert!(outcome.is_completed());
    assert_eq!(outcome.attempts(), 1);

    job.cancel().await?;
    saved_search.release().await
}

#[tokio::test]
async fn test_timeline_honours_dispatch_buckets() -> Result<()> {
    let ctx = TestContext::emulated(0).await;
    let saved_search = ctx
        .saved_searches()
        .scoped(&unique_name("sdk-timeline"), SEARCH, &Params::new())
        .await?;

    let mut job = saved_search
        .dispatch(&Params::new().set("dispatch.buckets", 100))
        .await?;
    job.refresh().await?;
    assert!(job.is_done());

    let body = job.timeline(&Params::new()).await?.read_to_string().await?;
    let timeline: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(timeline["buckets"].as_array().map(|b| b.len()), Some(100));

    let mut stream = job.results(&Params::new()).await?;
    let mut bytes = 0;
    while let Some(chunk) = stream.next_chunk().await? {
        bytes += chunk.len();
    }
    assert!(bytes > 0);
    assert!(stream.is_closed());

    job.cancel().await?;
    saved_search.release().await
}

#[tokio::test]
async fn test_results_as_stream() -> Result<()> {
    use futures::StreamExt;

    let ctx = TestContext::emulated(0).await;
    let jobs = ctx.service.jobs();
    let job = jobs.create(SEARCH, &Params::new()).await?;

    let chunks: Vec<Result<Vec<u8>>> = job
        .results(&Params::new())
        .await?
        .into_stream()
        .collect()
        .await;
    let body: Vec<u8> = chunks.into_iter().collect::<Result<Vec<_>>>()?.concat();
    let results: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(results["results"], serde_json::json!([]));

    job.cancel().await
}

#[tokio::test]
async fn test_service_info_and_login() -> Result<()> {
    let ctx = TestContext::emulated(0).await;
    let info = ctx.service.info().await?;
    assert_eq!(info.get("serverName"), Some("savedsearch-emulator"));

    let emulator = ctx.emulator().expect("emulated context");
    let bad = ConnectionSettings {
        password: "wrong".to_string(),
        ..emulator.connection_settings()
    };
    let err = Service::connect(&bad, &OutgoingSettings::default())
        .await
        .err()
        .expect("login must fail");
    assert!(matches!(err, Error::Unauthorized(_)));

    // Basic credentials skip the login round trip
    let basic = ConnectionSettings {
        basic: true,
        ..emulator.connection_settings()
    };
    let service = Service::connect(&basic, &OutgoingSettings::default()).await?;
    assert!(service.client().session_key().is_none());
    assert!(service.info().await.is_ok());

    // A forgotten session is rejected
    ctx.service.logout();
    assert!(matches!(ctx.service.info().await, Err(Error::Unauthorized(_))));
    Ok(())
}

#[tokio::test]
async fn test_namespaced_service() -> Result<()> {
    let ctx = TestContext::emulated(0).await;
    let emulator = ctx.emulator().expect("emulated context");
    let connection = ConnectionSettings {
        owner: Some("admin".to_string()),
        app: Some("search".to_string()),
        ..emulator.connection_settings()
    };
    let service = Service::connect(&connection, &OutgoingSettings::default()).await?;

    let saved_search = service
        .saved_searches()
        .scoped(&unique_name("sdk ns test"), SEARCH, &Params::new())
        .await?;
    assert!(saved_search
        .path()
        .starts_with("/servicesNS/admin/search/saved/searches/"));
    assert_eq!(saved_search.metadata().access.get("owner"), Some("admin"));

    // Visible through the global namespace as well
    assert!(ctx.saved_searches().contains(saved_search.name()).await?);

    let job = saved_search.dispatch(&Params::new()).await?;
    assert!(job.sid().starts_with("admin__admin__search__"));
    job.cancel().await?;

    saved_search.release().await
}
