use std::sync::Arc;

use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 会话存储错误
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// 表结构同步失败，在下一次成功初始化之前所有操作都会快速失败
    #[error("session store initialization failed: {0}")]
    Initialization(Arc<sqlx::Error>),

    /// 读写会话表失败，不会自动重试
    #[error("session query failed: {0}")]
    Query(Arc<sqlx::Error>),

    /// 存储的 payload 不是合法的 JSON 对象
    #[error("stored session payload is malformed: {0}")]
    Deserialization(Arc<serde_json::Error>),

    #[error("session payload could not be serialized: {0}")]
    Serialization(Arc<serde_json::Error>),
}

impl StoreError {
    pub fn query(error: sqlx::Error) -> Self {
        Self::Query(Arc::new(error))
    }

    pub fn is_initialization(&self) -> bool {
        matches!(self, Self::Initialization(_))
    }
}

/// 诊断接口的错误响应
#[derive(Debug)]
pub enum AppError {
    SessionStoreUnavailable = 1,
    SweepFailed,
    InternalServerError,
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Initialization(_) => AppError::SessionStoreUnavailable,
            _ => AppError::InternalServerError,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::SessionStoreUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "session store unavailable".to_string(),
            ),
            AppError::SweepFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "expired session sweep failed".to_string(),
            ),
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16() as i32,
            error_message,
        });

        (status, body).into_response()
    }
}
