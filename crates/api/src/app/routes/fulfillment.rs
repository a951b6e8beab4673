use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use groupbuy_fulfillment::{CarrierId, DestinationId, PackageId, ShipmentId};
use groupbuy_lots::LotId;

use crate::app::routes::parse_id;
use crate::app::{dto, errors, AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/lots/:id/packages", post(create_packages))
        .route("/packages", get(list_packages))
        .route("/packages/:id", get(get_package))
        .route("/packages/:id/ready", post(package_ready))
        .route("/packages/:id/in-transit", post(package_in_transit))
        .route("/packages/:id/delivered", post(package_delivered))
        .route("/shipments", post(assemble_shipment).get(list_shipments))
        .route("/shipments/:id", get(get_shipment))
        .route("/shipments/:id/packages", post(add_package))
        .route("/shipments/:id/depart", post(depart))
        .route("/shipments/:id/arrive", post(arrive))
        .route("/shipments/:id/close", post(close))
}

fn package_id_from(raw: &str) -> Result<PackageId, axum::response::Response> {
    parse_id(raw, "package").map(PackageId::new)
}

fn shipment_id_from(raw: &str) -> Result<ShipmentId, axum::response::Response> {
    parse_id(raw, "shipment").map(ShipmentId::new)
}

/// One combined operation: cut packages and advance the lot to packaged.
async fn create_packages(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreatePackagesRequest>,
) -> axum::response::Response {
    let lot_id = match parse_id(&id, "lot") {
        Ok(v) => LotId::new(v),
        Err(resp) => return resp,
    };

    match services.fulfillment.create_packages(lot_id, &body.packages) {
        Ok(package_ids) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "package_ids": package_ids.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn list_packages(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.fulfillment.packages() {
        Ok(packages) => Json(
            packages
                .iter()
                .map(dto::PackageResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn get_package(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let package_id = match package_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.fulfillment.package(package_id) {
        Ok(package) => Json(dto::PackageResponse::from(&package)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn package_ready(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let package_id = match package_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.fulfillment.mark_package_ready(package_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn package_in_transit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let package_id = match package_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.fulfillment.mark_package_in_transit(package_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn package_delivered(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let package_id = match package_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.fulfillment.mark_package_delivered(package_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn assemble_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::AssembleShipmentRequest>,
) -> axum::response::Response {
    let carrier = match parse_id(&body.carrier_id, "carrier") {
        Ok(v) => CarrierId::new(v),
        Err(resp) => return resp,
    };
    let destination = match parse_id(&body.destination_id, "destination") {
        Ok(v) => DestinationId::new(v),
        Err(resp) => return resp,
    };

    let mut package_ids = Vec::with_capacity(body.package_ids.len());
    for raw in &body.package_ids {
        match package_id_from(raw) {
            Ok(v) => package_ids.push(v),
            Err(resp) => return resp,
        }
    }

    match services
        .fulfillment
        .assemble_shipment(carrier, destination, package_ids, body.eta)
    {
        Ok(shipment_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({"id": shipment_id.to_string()})),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn list_shipments(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.fulfillment.shipments() {
        Ok(shipments) => Json(
            shipments
                .iter()
                .map(dto::ShipmentResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn get_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let shipment_id = match shipment_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.fulfillment.shipment(shipment_id) {
        Ok(shipment) => Json(dto::ShipmentResponse::from(&shipment)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn add_package(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddShipmentPackageRequest>,
) -> axum::response::Response {
    let shipment_id = match shipment_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let package_id = match package_id_from(&body.package_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.fulfillment.add_package(shipment_id, package_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn depart(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let shipment_id = match shipment_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.fulfillment.depart(shipment_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn arrive(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let shipment_id = match shipment_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.fulfillment.mark_arrived(shipment_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

async fn close(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let shipment_id = match shipment_id_from(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.fulfillment.close(shipment_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
