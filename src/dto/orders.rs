use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Order;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    pub payment_method: String,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkStatusRequest {
    pub order_ids: Vec<Uuid>,
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkCancelRequest {
    pub order_ids: Vec<Uuid>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkFailure {
    pub order_id: Uuid,
    pub error: String,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct BulkStatusResult {
    pub updated: Vec<Uuid>,
    pub failed: Vec<BulkFailure>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct BulkCancelResult {
    pub cancelled: Vec<Uuid>,
    pub skipped: Vec<Uuid>,
    pub skipped_count: usize,
    pub failed: Vec<BulkFailure>,
}
