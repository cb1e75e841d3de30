use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use super::{audit, comics, handlers, middleware::metrics_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let storage = state.config().storage.clone();

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Audit
        .route("/audit", get(audit::query_audit))
        // Comics
        .route(
            "/comics",
            get(comics::list_comics).post(comics::submit_comic),
        )
        .route("/comics/{id}", get(comics::get_comic))
        .route("/comics/{id}/status", get(comics::get_status))
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(Arc::clone(&state));

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics).with_state(state));

    // Artifacts are served by us only when their URLs are local paths.
    let base = storage.public_base_url.trim_end_matches('/');
    if base.starts_with('/') && base.len() > 1 {
        router = router.nest_service(base, ServeDir::new(&storage.root));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
