//! Route definitions

use super::handlers;
use super::state::EmulatorState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Endpoints that require authentication, relative to a namespace prefix
fn protected_routes(state: EmulatorState) -> Router<EmulatorState> {
    Router::new()
        .route("/server/info", get(handlers::server_info))
        // Saved searches
        .route(
            "/saved/searches",
            get(handlers::list_saved_searches).post(handlers::create_saved_search),
        )
        .route(
            "/saved/searches/:name",
            get(handlers::get_saved_search)
                .post(handlers::update_saved_search)
                .delete(handlers::delete_saved_search),
        )
        .route("/saved/searches/:name/dispatch", post(handlers::dispatch))
        .route("/saved/searches/:name/history", get(handlers::history))
        // Search jobs
        .route(
            "/search/jobs",
            get(handlers::list_jobs).post(handlers::create_job),
        )
        .route(
            "/search/jobs/:sid",
            get(handlers::get_job).delete(handlers::delete_job),
        )
        .route("/search/jobs/:sid/control", post(handlers::job_control))
        .route("/search/jobs/:sid/results", get(handlers::results))
        .route("/search/jobs/:sid/timeline", get(handlers::timeline))
        .route_layer(middleware::from_fn_with_state(state, handlers::require_auth))
}

/// Create the emulator router, serving both `/services` and `/servicesNS/{owner}/{app}`
pub fn create_router(state: EmulatorState) -> Router {
    let api = Router::new()
        .route("/auth/login", post(handlers::login))
        .merge(protected_routes(state.clone()));

    Router::new()
        .nest("/services", api.clone())
        .nest("/servicesNS/:owner/:app", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
