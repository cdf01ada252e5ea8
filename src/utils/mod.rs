use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::result::ApiResult;

/// 当前 Unix 时间（秒）
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResult<T>> {
    Json(ApiResult::success(data))
}

pub fn error_to_api_response<T: Serialize>(code: i32, msg: String) -> Json<ApiResult<T>> {
    Json(ApiResult::error(code, msg))
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const NOT_FOUND: i32 = 1004;
}
