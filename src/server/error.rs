use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;

use super::types::ErrorResponse;
use crate::error::Error;

/// API错误类型
pub struct AppError(pub Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 服务端错误的细节只写入日志
        let message = if self.0.is_client_error() {
            self.0.to_string()
        } else {
            error!("处理请求失败: {:?}", anyhow::Error::from(self.0));
            "服务器内部错误".to_string()
        };
        (status, Json(ErrorResponse { success: false, error: message })).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
