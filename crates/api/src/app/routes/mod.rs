pub mod carts;
pub mod events;
pub mod fulfillment;
pub mod lots;
pub mod products;
pub mod system;
pub mod tracking;

use axum::http::StatusCode;

use groupbuy_core::AggregateId;

use super::errors;

/// Parse a path segment into an aggregate id or answer 400.
pub(crate) fn parse_id(
    raw: &str,
    what: &'static str,
) -> Result<AggregateId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}
