use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};

use groupbuy_carts::{CartId, CartItemId};
use groupbuy_catalog::ProductId;
use groupbuy_core::BuyerId;

use crate::app::routes::parse_id;
use crate::app::{dto, errors, AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/carts", post(open_cart).get(list_carts))
        .route("/carts/:id", get(get_cart).delete(delete_cart))
        .route("/carts/:id/items", post(add_item))
        .route("/carts/:id/items/:item_id", delete(remove_item))
        .route("/carts/:id/checkout", post(begin_checkout))
        .route("/carts/:id/payment", post(record_payment))
}

async fn open_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::OpenCartRequest>,
) -> axum::response::Response {
    let buyer_id = match body.buyer_id {
        Some(raw) => match parse_id(&raw, "buyer") {
            Ok(v) => BuyerId::from_uuid(*v.as_uuid()),
            Err(resp) => return resp,
        },
        None => BuyerId::new(),
    };

    match services.carts.open_cart(buyer_id) {
        Ok(cart_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({"id": cart_id.to_string()})),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn list_carts(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.carts.carts() {
        Ok(carts) => Json(
            carts
                .iter()
                .map(dto::CartResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cart_id = match parse_id(&id, "cart") {
        Ok(v) => CartId::new(v),
        Err(resp) => return resp,
    };

    match services.carts.cart(cart_id) {
        Ok(cart) => Json(dto::CartResponse::from(&cart)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn delete_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cart_id = match parse_id(&id, "cart") {
        Ok(v) => CartId::new(v),
        Err(resp) => return resp,
    };

    match services.carts.delete_draft(cart_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddItemRequest>,
) -> axum::response::Response {
    let cart_id = match parse_id(&id, "cart") {
        Ok(v) => CartId::new(v),
        Err(resp) => return resp,
    };
    let product_id = match parse_id(&body.product_id, "product") {
        Ok(v) => ProductId::new(v),
        Err(resp) => return resp,
    };

    match services.carts.add_item(cart_id, product_id, body.quantity) {
        Ok(item_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({"item_id": item_id.to_string()})),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, item_id)): Path<(String, String)>,
) -> axum::response::Response {
    let cart_id = match parse_id(&id, "cart") {
        Ok(v) => CartId::new(v),
        Err(resp) => return resp,
    };
    let item_id = match parse_id(&item_id, "cart item") {
        Ok(v) => CartItemId::new(v),
        Err(resp) => return resp,
    };

    match services.carts.remove_item(cart_id, item_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn begin_checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cart_id = match parse_id(&id, "cart") {
        Ok(v) => CartId::new(v),
        Err(resp) => return resp,
    };

    match services.carts.begin_checkout(cart_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let cart_id = match parse_id(&id, "cart") {
        Ok(v) => CartId::new(v),
        Err(resp) => return resp,
    };

    match services.carts.record_payment(cart_id, body.success) {
        Ok(status) => Json(serde_json::json!({"status": status})).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
