use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use groupbuy_lots::LotId;

use crate::app::routes::parse_id;
use crate::app::{dto, errors, AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/lots", get(list_lots))
        .route("/lots/recalculate", post(recalculate))
        .route("/lots/:id", get(get_lot))
        .route("/lots/:id/moq-status", get(moq_status))
        .route("/lots/:id/mark-ready", post(mark_ready))
        .route("/lots/:id/send-order", post(send_order))
        .route("/lots/:id/confirm", post(confirm))
}

fn lot_id_from(raw: &str) -> Result<LotId, axum::response::Response> {
    parse_id(raw, "lot").map(LotId::new)
}

async fn list_lots(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.lots.lots() {
        Ok(lots) => {
            Json(lots.iter().map(dto::LotResponse::from).collect::<Vec<_>>()).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Operator-triggered consolidation pass (idempotent).
async fn recalculate(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.consolidation.recalculate_lots() {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn get_lot(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let lot_id = match lot_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lots.lot(lot_id) {
        Ok(lot) => Json(dto::LotResponse::from(&lot)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn moq_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let lot_id = match lot_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lots.moq_status(lot_id) {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn mark_ready(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let lot_id = match lot_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lots.mark_ready(lot_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn send_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let lot_id = match lot_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lots.send_order(lot_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn confirm(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let lot_id = match lot_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lots.confirm(lot_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
