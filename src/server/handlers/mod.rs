// API处理器模块

pub mod share;
pub mod transfer;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::share::{ShareError, ShareErrorCode};

pub use share::{create_directory, delete_item, ensure_thumbnails, list_directory, rename_item};
pub use transfer::{download_file, upload_file};

/// 统一API响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// 状态码 (0: 成功, 其他: 错误码)
    pub code: i32,
    /// 消息
    pub message: String,
    /// 数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
        }
    }
}

/// 错误响应
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl IntoResponse for ShareError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code {
            ShareErrorCode::PathEscape => StatusCode::BAD_REQUEST,
            ShareErrorCode::NotFound => StatusCode::NOT_FOUND,
            ShareErrorCode::NotADirectory => StatusCode::BAD_REQUEST,
            ShareErrorCode::NotAFile => StatusCode::BAD_REQUEST,
            ShareErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ShareErrorCode::InvalidName => StatusCode::BAD_REQUEST,
            ShareErrorCode::UnsupportedImage => StatusCode::BAD_REQUEST,
            ShareErrorCode::DecodeFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ShareErrorCode::IoFailed => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            code: self.code.code(),
            message: self.message,
            path: self.path,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ShareErrorCode::PathEscape, StatusCode::BAD_REQUEST),
            (ShareErrorCode::NotFound, StatusCode::NOT_FOUND),
            (ShareErrorCode::NotADirectory, StatusCode::BAD_REQUEST),
            (ShareErrorCode::NotAFile, StatusCode::BAD_REQUEST),
            (ShareErrorCode::AlreadyExists, StatusCode::CONFLICT),
            (ShareErrorCode::InvalidName, StatusCode::BAD_REQUEST),
            (ShareErrorCode::UnsupportedImage, StatusCode::BAD_REQUEST),
            (ShareErrorCode::DecodeFailed, StatusCode::UNPROCESSABLE_ENTITY),
            (ShareErrorCode::IoFailed, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (code, status) in cases {
            let response = ShareError::new(code).into_response();
            assert_eq!(response.status(), status, "错误码 {:?} 的状态码不匹配", code);
        }
    }

    #[test]
    fn test_api_response_serialization() {
        let ok = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(ok["code"], 0);
        assert_eq!(ok["message"], "Success");
        assert_eq!(ok["data"], 42);

        let err =
            serde_json::to_value(ApiResponse::<()>::error(401, "Unauthorized".to_string())).unwrap();
        assert_eq!(err["code"], 401);
        assert!(err.get("data").is_none());
    }
}
