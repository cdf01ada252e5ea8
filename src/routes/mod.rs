use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;
use crate::middleware::log_errors;

pub mod sessions;

/// 诊断接口路由，挂载在 `base_uri` 下
pub fn create_router(state: AppState, base_uri: &str) -> Router {
    let diagnostics = Router::new()
        .route("/health", get(sessions::health))
        .route("/sessions/count", get(sessions::session_count))
        .route("/sessions/sweep", post(sessions::sweep_sessions));

    // axum 不允许在根路径 nest
    let router = match base_uri.trim_end_matches('/') {
        "" => Router::new().merge(diagnostics),
        base => Router::new().nest(base, diagnostics),
    };

    router
        .fallback(sessions::not_found)
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}
