//! Uniform JSON envelope and the error → HTTP status mapping.
use crate::error::{FieldErrors, SiteError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

/// `{ success, data?, message?, error?, errors? }`
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    ok_with_message(data, None)
}

pub fn ok_with_message<T: Serialize>(data: T, message: Option<&str>) -> Response {
    let body = Envelope {
        success: true,
        data: Some(data),
        message: message.map(str::to_owned),
        error: None,
        errors: None,
    };
    (StatusCode::OK, Json(body)).into_response()
}

fn failure(status: StatusCode, error: String, errors: Option<FieldErrors>) -> Response {
    let body: Envelope<()> = Envelope {
        success: false,
        data: None,
        message: None,
        error: Some(error),
        errors,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for SiteError {
    fn into_response(self) -> Response {
        match self {
            SiteError::NotFound { .. } => failure(StatusCode::NOT_FOUND, self.to_string(), None),
            SiteError::ValidationFailed(fields) => failure(
                StatusCode::UNPROCESSABLE_ENTITY,
                "البيانات المدخلة غير صالحة".to_string(),
                Some(fields),
            ),
            SiteError::SlugGenerationExhausted { .. } | SiteError::Unexpected(_) => {
                error!(err = ?self, "request failed");
                failure(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "حدث خطأ غير متوقع، يرجى المحاولة لاحقاً".to_string(),
                    None,
                )
            }
        }
    }
}
