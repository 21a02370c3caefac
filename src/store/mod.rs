//! Persistence seams for the storefront.
//!
//! Services receive an `Arc<dyn Store>` and never reach for a connection
//! directly. `PgStore` backs the server; `MemoryStore` backs local runs and
//! the test suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        AuditEntry, CartLine, CartLineDetail, Category, MonthlyRevenue, Order, OrderDetail,
        OrderLine, OrderStats, OrderStatus, PaymentStatus, PendingCartClear, Product,
        ProductStatus, User,
    },
    routes::params::{ProductSortBy, SortOrder},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("ORM error")]
    Orm(#[from] sea_orm::DbErr),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("stock conflict for product {product_id}: {available} available")]
    StockConflict { product_id: Uuid, available: i32 },

    #[error("invalid stored value: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub status: ProductStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub category_id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub status: Option<ProductStatus>,
    pub sort_by: ProductSortBy,
    pub sort_order: SortOrder,
    pub page: PageRequest,
}

/// Outcome of a guarded stock change; the guard keeps stock within `0..=i32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    Applied { stock: i32 },
    Insufficient { available: i32 },
    Missing,
}

/// Whether order creation takes units out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockPolicy {
    #[default]
    Decrement,
    ValidateOnly,
}

#[derive(Debug, Clone)]
pub struct OrderLineDraft {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// A fully priced order ready to be written.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub id: Uuid,
    pub user_id: Uuid,
    pub invoice_number: String,
    pub lines: Vec<OrderLineDraft>,
    pub total_amount: Decimal,
    pub shipping_address: String,
    pub payment_method: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub range: DateRange,
    pub sort_order: Option<SortOrder>,
    pub page: PageRequest,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Page<Product>>;
    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product>;
    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> StoreResult<Option<Product>>;
    async fn delete_product(&self, id: Uuid) -> StoreResult<bool>;
    /// Adds `delta` to stock unless the result would go below zero or overflow.
    async fn adjust_stock(&self, id: Uuid, delta: i32) -> StoreResult<StockChange>;
    async fn low_stock(&self, threshold: i32, page: PageRequest) -> StoreResult<Page<Product>>;
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;
    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category>;
    async fn delete_category(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_cart_line(&self, user_id: Uuid, product_id: Uuid)
    -> StoreResult<Option<CartLine>>;
    /// Sets the absolute quantity of a line, creating it when absent.
    async fn upsert_cart_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> StoreResult<CartLine>;
    async fn delete_cart_line(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<bool>;
    /// Every line of the user's cart joined with its product, newest first.
    async fn cart_lines(&self, user_id: Uuid) -> StoreResult<Vec<CartLineDetail>>;
    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<u64>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes the order row and all of its lines as one unit.
    async fn insert_order(&self, draft: &OrderDraft) -> StoreResult<OrderDetail>;
    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn order_lines(&self, order_id: Uuid) -> StoreResult<Vec<OrderLine>>;
    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Page<Order>>;
    async fn update_order(&self, id: Uuid, patch: OrderPatch) -> StoreResult<Option<Order>>;
    async fn order_stats(&self, range: &DateRange) -> StoreResult<OrderStats>;
    async fn monthly_revenue(&self, range: &DateRange) -> StoreResult<Vec<MonthlyRevenue>>;
}

#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Applies the stock policy, writes the order and clears the owner's cart
    /// in a single transaction. Nothing is persisted on error.
    async fn commit_checkout(
        &self,
        draft: &OrderDraft,
        policy: StockPolicy,
    ) -> StoreResult<OrderDetail>;
    /// Writes the order together with its pending cart clear marker. Either
    /// both rows exist afterwards or neither does.
    async fn insert_order_with_pending_clear(
        &self,
        draft: &OrderDraft,
    ) -> StoreResult<OrderDetail>;
    async fn pending_clears(&self, limit: i64) -> StoreResult<Vec<PendingCartClear>>;
    async fn resolve_pending_clear(&self, order_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record_audit(&self, entry: AuditEntry) -> StoreResult<()>;
}

pub trait Store:
    UserStore + CatalogStore + CartStore + OrderStore + CheckoutStore + AuditStore
{
}

impl<T> Store for T where
    T: UserStore + CatalogStore + CartStore + OrderStore + CheckoutStore + AuditStore
{
}

pub(crate) fn order_total(lines: &[OrderLineDraft]) -> Decimal {
    lines
        .iter()
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum()
}
