use axum::{extract::State, http::StatusCode, response::IntoResponse};

use super::model::{HealthResponse, SessionCountResponse, SweepResponse};
use crate::AppState;
use crate::error::AppError;
use crate::utils::{error_codes, error_to_api_response, now_secs, success_to_api_response};

/// 健康检查接口
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        success_to_api_response(HealthResponse {
            status: "ok".to_string(),
            timestamp: now_secs(),
        }),
    )
}

/// 会话总数
pub async fn session_count(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let count = state
        .store
        .length()
        .await
        .ok_or(AppError::SessionStoreUnavailable)?;

    Ok((
        StatusCode::OK,
        success_to_api_response(SessionCountResponse { count }),
    ))
}

/// 立即执行一次过期会话清理
pub async fn sweep_sessions(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    match state.store.sweep_expired().await {
        Ok(removed) => {
            tracing::info!(removed, "Manual sweep finished");
            Ok((StatusCode::OK, success_to_api_response(SweepResponse { removed })))
        }
        Err(e) if e.is_initialization() => Err(AppError::from(e)),
        Err(e) => {
            tracing::error!("Manual sweep failed: {}", e);
            Err(AppError::SweepFailed)
        }
    }
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        error_to_api_response::<()>(error_codes::NOT_FOUND, "route not found".to_string()),
    )
}
