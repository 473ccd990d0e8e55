use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use lotstock_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        ServiceError::InvalidBatch(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_batch", msg),
        ServiceError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", what),
        err @ ServiceError::InsufficientStock { .. } => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_stock",
            err.to_string(),
        ),
        err @ ServiceError::InsufficientBatchStock { .. } => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_batch_stock",
            err.to_string(),
        ),
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Storage(msg) => {
            tracing::error!(error = %msg, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id() -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id")
}
