use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use groupbuy_core::DomainError;

/// Map a domain failure onto an HTTP response.
///
/// Business-rule violations surface the specific guard that failed;
/// `Conflict`/`Unavailable` additionally flag themselves as retryable.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let (status, code) = match &err {
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        DomainError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        DomainError::InvalidTransition { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition")
        }
        DomainError::MoqNotMet { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "moq_not_met"),
        DomainError::PackageNotReady { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "package_not_ready")
        }
        DomainError::PackagesNotDelivered { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "packages_not_delivered")
        }
        DomainError::SupplierMismatch { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "supplier_mismatch")
        }
        DomainError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    };

    (
        status,
        axum::Json(json!({
            "error": code,
            "message": err.to_string(),
            "retryable": err.is_retryable(),
        })),
    )
        .into_response()
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
