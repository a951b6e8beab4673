use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use groupbuy_catalog::{ProductId, ProductRecord, SupplierId};
use groupbuy_core::AggregateId;

use crate::app::routes::parse_id;
use crate::app::{dto, errors, AppServices};

pub fn router() -> Router {
    Router::new().route("/products", post(create_product).get(list_products))
}

async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let supplier = match parse_id(&body.supplier_id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let record = ProductRecord {
        product_id: ProductId::new(AggregateId::new()),
        supplier_id: SupplierId::new(supplier),
        name: body.name,
        customer_unit: body.customer_unit,
        customer_moq: body.customer_moq,
        supplier_unit: body.supplier_unit,
        supplier_moq: body.supplier_moq,
        min_fraction_per_user: body.min_fraction_per_user,
        price: body.price,
        public_price: body.public_price,
    };
    let product_id = record.product_id;

    if let Err(e) = services.catalog.upsert(record) {
        return errors::domain_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": product_id.to_string()})),
    )
        .into_response()
}

async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    Json(services.catalog.list()).into_response()
}
