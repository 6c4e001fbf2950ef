//! Web 层错误类型
//!
//! 将领域错误映射为 HTTP 状态码和 `{ "error": ... }` 响应体

use crate::error::MonitorError;
use axum::{
    extract::rejection::{FormRejection, JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

/// API 错误
#[derive(Error, Debug)]
pub enum ApiError {
    /// 请求参数不合法
    #[error("{0}")]
    BadRequest(String),

    /// 监控项不存在
    #[error("Monitor not found")]
    NotFound,

    /// 未通过共享密码校验
    #[error("Unauthorized")]
    Unauthorized,

    /// 与正在进行的操作冲突
    #[error("{0}")]
    Conflict(String),

    /// 服务端内部错误，携带详细信息
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::Internal(detail) => {
                error!("请求处理失败: {}", detail);
                serde_json::json!({ "error": "Internal server error", "message": detail })
            }
            other => serde_json::json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::NotFound(_) => ApiError::NotFound,
            MonitorError::Validation(msg) => ApiError::BadRequest(msg),
            MonitorError::CheckInProgress(_) => {
                ApiError::Conflict("Check already in progress".to_string())
            }
            MonitorError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
