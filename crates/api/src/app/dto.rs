use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use groupbuy_carts::{Cart, CartStatus};
use groupbuy_fulfillment::{Package, PackageStatus, Shipment, ShipmentStatus};
use groupbuy_infra::services::PackageSpec;
use groupbuy_lots::{Lot, LotStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub supplier_id: String,
    pub name: String,
    pub customer_unit: String,
    pub customer_moq: u64,
    pub supplier_unit: String,
    pub supplier_moq: u64,
    pub min_fraction_per_user: u64,
    pub price: u64,
    pub public_price: u64,
}

#[derive(Debug, Deserialize)]
pub struct OpenCartRequest {
    pub buyer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u64,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreatePackagesRequest {
    pub packages: Vec<PackageSpec>,
}

#[derive(Debug, Deserialize)]
pub struct AssembleShipmentRequest {
    pub carrier_id: String,
    pub destination_id: String,
    pub package_ids: Vec<String>,
    pub eta: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AddShipmentPackageRequest {
    pub package_id: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CartItemResponse {
    pub item_id: String,
    pub product_id: String,
    pub quantity: u64,
    pub unit: String,
    pub price: u64,
    pub public_price: u64,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub id: String,
    pub buyer_id: Option<String>,
    pub status: CartStatus,
    pub items: Vec<CartItemResponse>,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        Self {
            id: cart.id_typed().to_string(),
            buyer_id: cart.buyer_id().map(|b| b.to_string()),
            status: cart.status(),
            items: cart
                .items()
                .iter()
                .map(|item| CartItemResponse {
                    item_id: item.item_id.to_string(),
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                    unit: item.snapshot.unit.clone(),
                    price: item.snapshot.price,
                    public_price: item.snapshot.public_price,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LotMemberResponse {
    pub cart_item_id: String,
    pub cart_id: String,
    pub product_id: String,
    pub quantity: u64,
    pub supplier_moq: u64,
}

#[derive(Debug, Serialize)]
pub struct LotResponse {
    pub id: String,
    pub tracking_number: Option<String>,
    pub supplier_id: Option<String>,
    pub status: LotStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub consolidated_at: Option<DateTime<Utc>>,
    pub order_sent_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub members: Vec<LotMemberResponse>,
}

impl From<&Lot> for LotResponse {
    fn from(lot: &Lot) -> Self {
        Self {
            id: lot.id_typed().to_string(),
            tracking_number: lot.tracking_number().map(|t| t.to_string()),
            supplier_id: lot.supplier_id().map(|s| s.to_string()),
            status: lot.status(),
            scheduled_at: lot.scheduled_at(),
            consolidated_at: lot.consolidated_at(),
            order_sent_at: lot.order_sent_at(),
            confirmed_at: lot.confirmed_at(),
            members: lot
                .members()
                .iter()
                .map(|m| LotMemberResponse {
                    cart_item_id: m.cart_item_id.to_string(),
                    cart_id: m.cart_id.to_string(),
                    product_id: m.product_id.to_string(),
                    quantity: m.quantity,
                    supplier_moq: m.supplier_moq,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PackageResponse {
    pub id: String,
    pub tracking_number: Option<String>,
    pub lot_id: Option<String>,
    pub status: PackageStatus,
    pub weight_grams: u64,
    pub volume_cm3: u64,
}

impl From<&Package> for PackageResponse {
    fn from(package: &Package) -> Self {
        Self {
            id: package.id_typed().to_string(),
            tracking_number: package.tracking_number().map(|t| t.to_string()),
            lot_id: package.lot_id().map(|l| l.to_string()),
            status: package.status(),
            weight_grams: package.weight_grams(),
            volume_cm3: package.volume_cm3(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShipmentResponse {
    pub id: String,
    pub tracking_number: Option<String>,
    pub carrier_id: Option<String>,
    pub destination_id: Option<String>,
    pub status: ShipmentStatus,
    pub package_ids: Vec<String>,
    pub eta: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
}

impl From<&Shipment> for ShipmentResponse {
    fn from(shipment: &Shipment) -> Self {
        Self {
            id: shipment.id_typed().to_string(),
            tracking_number: shipment.tracking_number().map(|t| t.to_string()),
            carrier_id: shipment.carrier_id().map(|c| c.0.to_string()),
            destination_id: shipment.destination().map(|d| d.0.to_string()),
            status: shipment.status(),
            package_ids: shipment
                .package_ids()
                .iter()
                .map(|p| p.to_string())
                .collect(),
            eta: shipment.eta(),
            started_at: shipment.started_at(),
            arrived_at: shipment.arrived_at(),
        }
    }
}
