use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use groupbuy_carts::CartItemId;

use crate::app::routes::parse_id;
use crate::app::{errors, AppServices};

pub fn router() -> Router {
    Router::new().route("/tracking/items/:item_id/stage", get(item_stage))
}

/// Buyer-facing stage for one cart item.
async fn item_stage(
    Extension(services): Extension<Arc<AppServices>>,
    Path(item_id): Path<String>,
) -> axum::response::Response {
    let item_id = match parse_id(&item_id, "cart item") {
        Ok(v) => CartItemId::new(v),
        Err(resp) => return resp,
    };

    match services.tracking.item_stage(item_id) {
        Ok(stage) => Json(serde_json::json!({"stage": stage})).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
