use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Whether a product can currently be put in a cart and ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Available,
    Unavailable,
    Discontinued,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Available => "available",
            ProductStatus::Unavailable => "unavailable",
            ProductStatus::Discontinued => "discontinued",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ProductStatus::Available)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "10.00")]
    pub price: Decimal,
    pub stock: i32,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart line joined with the live catalog row it points at.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLineDetail {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    #[schema(value_type = String, example = "10.00")]
    pub price: Decimal,
    pub stock: i32,
    pub status: ProductStatus,
    pub quantity: i32,
    #[schema(value_type = String, example = "20.00")]
    pub item_total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl CartLineDetail {
    pub fn line_total(price: Decimal, quantity: i32) -> Decimal {
        price * Decimal::from(quantity)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartSummary {
    pub item_count: i64,
    pub line_count: usize,
    #[schema(value_type = String, example = "25.50")]
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartLineDetail>,
    pub summary: CartSummary,
}

impl CartView {
    pub fn from_lines(items: Vec<CartLineDetail>) -> Self {
        let item_count = items.iter().map(|line| i64::from(line.quantity)).sum();
        let subtotal = items.iter().map(|line| line.item_total).sum();
        let line_count = items.len();
        Self {
            items,
            summary: CartSummary {
                item_count,
                line_count,
                subtotal,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartValidation {
    pub valid: bool,
    pub violations: Vec<String>,
    /// Snapshot of the lines the verdict was computed from.
    pub lines: Vec<CartLineDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// No further transition is allowed through `cancel` from these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl FromStr for ProductStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ProductStatus::Available),
            "unavailable" => Ok(ProductStatus::Unavailable),
            "discontinued" => Ok(ProductStatus::Discontinued),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub invoice_number: String,
    #[schema(value_type = String, example = "25.50")]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_address: String,
    pub payment_method: String,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    #[schema(value_type = String, example = "10.00")]
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct OrderStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub delivered_orders: i64,
    pub cancelled_orders: i64,
    pub paid_orders: i64,
    #[schema(value_type = String, example = "120.50")]
    pub total_revenue: Decimal,
    #[schema(value_type = String, example = "40.17")]
    pub average_order_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlyRevenue {
    /// Calendar month as `YYYY-MM`.
    pub month: String,
    pub order_count: i64,
    #[schema(value_type = String, example = "980.00")]
    pub revenue: Decimal,
}

/// Written when an order exists but the owner's cart has not been cleared yet.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PendingCartClear {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub product_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl PendingCartClear {
    pub fn for_order(detail: &OrderDetail) -> Self {
        Self {
            order_id: detail.order.id,
            user_id: detail.order.user_id,
            product_ids: detail.items.iter().map(|line| line.product_id).collect(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_round_trips_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("paid".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn only_delivered_and_cancelled_are_terminal() {
        let terminal: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(OrderStatus::is_terminal)
            .collect();
        assert_eq!(terminal, vec![OrderStatus::Delivered, OrderStatus::Cancelled]);
    }

    #[test]
    fn cart_view_sums_quantities_and_totals() {
        let line = |price: Decimal, quantity: i32| CartLineDetail {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            name: "x".into(),
            price,
            stock: 10,
            status: ProductStatus::Available,
            quantity,
            item_total: CartLineDetail::line_total(price, quantity),
            created_at: Utc::now(),
        };
        let view = CartView::from_lines(vec![
            line(Decimal::new(1000, 2), 2),
            line(Decimal::new(550, 2), 1),
        ]);
        assert_eq!(view.summary.subtotal, Decimal::new(2550, 2));
        assert_eq!(view.summary.item_count, 3);
        assert_eq!(view.summary.line_count, 2);
    }
}
