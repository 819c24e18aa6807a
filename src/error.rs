use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    Upstream(reqwest::Error),
    PayloadTooLarge(String),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Upstream(_) => "upstream_unavailable",
            AppError::PayloadTooLarge(_) => "payload_too_large",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Upstream(e) => {
                tracing::error!("upstream error: {e}");
                "upstream page renderer unavailable".to_string()
            }
            AppError::PayloadTooLarge(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.message()
            }
        });

        (status, Json(body)).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Upstream(e)
    }
}
