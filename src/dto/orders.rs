use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem, OrderStatus};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemInput>,
    pub shipping_address: ShippingAddressInput,
    pub payment_method: Option<String>,
}

/// A cart line as submitted by the storefront. Price is trusted as-is; see
/// the order service for the transaction that persists it.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    pub product_id: Option<Uuid>,
    pub name: String,
    pub image: Option<String>,
    pub price: i64,
    pub qty: i32,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressInput {
    pub name: Option<String>,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderWithItems>,
}

/// Admin listing row with the owning user denormalized for display.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOrderSummary {
    pub order: Order,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOrderList {
    pub count: i64,
    pub items: Vec<AdminOrderSummary>,
}
