use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AuditStore, CartStore, CatalogStore, CheckoutStore, DateRange, NewCategory, NewProduct,
    NewUser, OrderDraft, OrderFilter, OrderPatch, OrderStore, Page, PageRequest, ProductFilter,
    ProductPatch, StockChange, StockPolicy, StoreError, StoreResult, UserStore,
};
use crate::{
    models::{
        AuditEntry, CartLine, CartLineDetail, Category, MonthlyRevenue, Order, OrderDetail,
        OrderLine, OrderStats, OrderStatus, PaymentStatus, PendingCartClear, Product, User,
    },
    routes::params::{ProductSortBy, SortOrder},
};

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    categories: Vec<Category>,
    products: Vec<Product>,
    cart: Vec<CartLine>,
    orders: Vec<Order>,
    order_lines: Vec<OrderLine>,
    pending: Vec<PendingCartClear>,
    audit: Vec<AuditEntry>,
}

/// Process-local store. Every trait call holds one lock for its whole
/// duration, so each call is atomic on its own.
///
/// The fault switches make cart clears, order inserts or pending clear
/// marker writes fail with `StoreError::Unavailable` until switched off again.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_cart_clear: AtomicBool,
    fail_order_insert: AtomicBool,
    fail_pending_clear: AtomicBool,
    fail_pending_resolve: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_cart_clear(&self, on: bool) {
        self.fail_cart_clear.store(on, Ordering::SeqCst);
    }

    pub fn fail_order_insert(&self, on: bool) {
        self.fail_order_insert.store(on, Ordering::SeqCst);
    }

    pub fn fail_pending_clear(&self, on: bool) {
        self.fail_pending_clear.store(on, Ordering::SeqCst);
    }

    pub fn fail_pending_resolve(&self, on: bool) {
        self.fail_pending_resolve.store(on, Ordering::SeqCst);
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().await.audit.clone()
    }

    fn check_cart_clear(&self) -> StoreResult<()> {
        if self.fail_cart_clear.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("cart clear".into()));
        }
        Ok(())
    }

    fn check_pending_clear(&self) -> StoreResult<()> {
        if self.fail_pending_clear.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("pending cart clear".into()));
        }
        Ok(())
    }

    fn check_pending_resolve(&self) -> StoreResult<()> {
        if self.fail_pending_resolve.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("pending cart clear resolve".into()));
        }
        Ok(())
    }

    fn check_order_insert(&self) -> StoreResult<()> {
        if self.fail_order_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("order insert".into()));
        }
        Ok(())
    }
}

impl MemoryState {
    fn product_mut(&mut self, id: Uuid) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| p.id == id)
    }

    fn change_stock(&mut self, id: Uuid, delta: i32) -> StockChange {
        let Some(product) = self.product_mut(id) else {
            return StockChange::Missing;
        };
        match product.stock.checked_add(delta) {
            Some(stock) if stock >= 0 => {
                product.stock = stock;
                product.updated_at = Utc::now();
                StockChange::Applied { stock }
            }
            _ => StockChange::Insufficient {
                available: product.stock,
            },
        }
    }

    fn write_order(&mut self, draft: &OrderDraft) -> OrderDetail {
        let now = Utc::now();
        let order = Order {
            id: draft.id,
            user_id: draft.user_id,
            invoice_number: draft.invoice_number.clone(),
            total_amount: draft.total_amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            shipping_address: draft.shipping_address.clone(),
            payment_method: draft.payment_method.clone(),
            notes: draft.notes.clone(),
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        let items: Vec<OrderLine> = draft
            .lines
            .iter()
            .map(|line| OrderLine {
                id: Uuid::new_v4(),
                order_id: draft.id,
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                created_at: now,
            })
            .collect();

        self.orders.push(order.clone());
        self.order_lines.extend(items.iter().cloned());
        OrderDetail { order, items }
    }
}

fn paginate<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    items
        .iter()
        .skip(page.offset.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("email".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
            role: user.role,
        };
        state.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let state = self.state.lock().await;
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Page<Product>> {
        let state = self.state.lock().await;
        let needle = filter
            .search
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase());

        let mut matched: Vec<Product> = state
            .products
            .iter()
            .filter(|p| {
                needle.as_ref().is_none_or(|n| {
                    p.name.to_lowercase().contains(n)
                        || p.description
                            .as_ref()
                            .is_some_and(|d| d.to_lowercase().contains(n))
                })
            })
            .filter(|p| filter.category_id.is_none_or(|c| p.category_id == Some(c)))
            .filter(|p| filter.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| filter.max_price.is_none_or(|max| p.price <= max))
            .filter(|p| filter.status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();

        matched.sort_by(|a, b| match filter.sort_by {
            ProductSortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            ProductSortBy::Price => a.price.cmp(&b.price),
            ProductSortBy::Name => a.name.cmp(&b.name),
        });
        if matches!(filter.sort_order, SortOrder::Desc) {
            matched.reverse();
        }

        Ok(Page {
            total: matched.len() as i64,
            items: paginate(&matched, filter.page),
        })
    }

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let mut state = self.state.lock().await;
        if state.products.iter().any(|p| p.name == product.name) {
            return Err(StoreError::Conflict("product name".into()));
        }
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            category_id: product.category_id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            status: product.status,
            created_at: now,
            updated_at: now,
        };
        state.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> StoreResult<Option<Product>> {
        let mut state = self.state.lock().await;
        let Some(product) = state.product_mut(id) else {
            return Ok(None);
        };
        if let Some(category_id) = patch.category_id {
            product.category_id = Some(category_id);
        }
        if let Some(name) = patch.name {
            product.name = name;
        }
        if let Some(description) = patch.description {
            product.description = Some(description);
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(stock) = patch.stock {
            product.stock = stock;
        }
        if let Some(status) = patch.status {
            product.status = status;
        }
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.products.len();
        state.products.retain(|p| p.id != id);
        state.cart.retain(|line| line.product_id != id);
        Ok(state.products.len() < before)
    }

    async fn adjust_stock(&self, id: Uuid, delta: i32) -> StoreResult<StockChange> {
        let mut state = self.state.lock().await;
        Ok(state.change_stock(id, delta))
    }

    async fn low_stock(&self, threshold: i32, page: PageRequest) -> StoreResult<Page<Product>> {
        let state = self.state.lock().await;
        let mut matched: Vec<Product> = state
            .products
            .iter()
            .filter(|p| p.stock <= threshold)
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            a.stock
                .cmp(&b.stock)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(Page {
            total: matched.len() as i64,
            items: paginate(&matched, page),
        })
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let state = self.state.lock().await;
        let mut categories = state.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category> {
        let mut state = self.state.lock().await;
        if state.categories.iter().any(|c| c.name == category.name) {
            return Err(StoreError::Conflict("category name".into()));
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: category.name,
            description: category.description,
            created_at: Utc::now(),
        };
        state.categories.push(category.clone());
        Ok(category)
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        for product in state.products.iter_mut() {
            if product.category_id == Some(id) {
                product.category_id = None;
            }
        }
        Ok(state.categories.len() < before)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn find_cart_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> StoreResult<Option<CartLine>> {
        let state = self.state.lock().await;
        Ok(state
            .cart
            .iter()
            .find(|l| l.user_id == user_id && l.product_id == product_id)
            .cloned())
    }

    async fn upsert_cart_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> StoreResult<CartLine> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if let Some(line) = state
            .cart
            .iter_mut()
            .find(|l| l.user_id == user_id && l.product_id == product_id)
        {
            line.quantity = quantity;
            line.updated_at = now;
            return Ok(line.clone());
        }
        let line = CartLine {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            quantity,
            created_at: now,
            updated_at: now,
        };
        state.cart.push(line.clone());
        Ok(line)
    }

    async fn delete_cart_line(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.cart.len();
        state
            .cart
            .retain(|l| !(l.user_id == user_id && l.product_id == product_id));
        Ok(state.cart.len() < before)
    }

    async fn cart_lines(&self, user_id: Uuid) -> StoreResult<Vec<CartLineDetail>> {
        let state = self.state.lock().await;
        // Newest first, matching the SQL ordering.
        let lines = state
            .cart
            .iter()
            .rev()
            .filter(|l| l.user_id == user_id)
            .filter_map(|line| {
                let product = state.products.iter().find(|p| p.id == line.product_id)?;
                Some(CartLineDetail {
                    id: line.id,
                    product_id: product.id,
                    name: product.name.clone(),
                    price: product.price,
                    stock: product.stock,
                    status: product.status,
                    quantity: line.quantity,
                    item_total: CartLineDetail::line_total(product.price, line.quantity),
                    created_at: line.created_at,
                })
            })
            .collect();
        Ok(lines)
    }

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<u64> {
        self.check_cart_clear()?;
        let mut state = self.state.lock().await;
        let before = state.cart.len();
        state.cart.retain(|l| l.user_id != user_id);
        Ok((before - state.cart.len()) as u64)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, draft: &OrderDraft) -> StoreResult<OrderDetail> {
        self.check_order_insert()?;
        let mut state = self.state.lock().await;
        Ok(state.write_order(draft))
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn order_lines(&self, order_id: Uuid) -> StoreResult<Vec<OrderLine>> {
        let state = self.state.lock().await;
        Ok(state
            .order_lines
            .iter()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Page<Order>> {
        let state = self.state.lock().await;
        let mut matched: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| filter.user_id.is_none_or(|u| o.user_id == u))
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .filter(|o| filter.payment_status.is_none_or(|s| o.payment_status == s))
            .filter(|o| filter.range.contains(o.created_at))
            .cloned()
            .collect();
        if !matches!(filter.sort_order, Some(SortOrder::Asc)) {
            matched.reverse();
        }
        Ok(Page {
            total: matched.len() as i64,
            items: paginate(&matched, filter.page),
        })
    }

    async fn update_order(&self, id: Uuid, patch: OrderPatch) -> StoreResult<Option<Order>> {
        let mut state = self.state.lock().await;
        let Some(order) = state.orders.iter_mut().find(|o| o.id == id) else {
            return Ok(None);
        };
        if let Some(status) = patch.status {
            order.status = status;
        }
        if let Some(payment_status) = patch.payment_status {
            order.payment_status = payment_status;
        }
        if let Some(notes) = patch.notes {
            order.notes = Some(notes);
        }
        if let Some(paid_at) = patch.paid_at {
            order.paid_at = Some(paid_at);
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn order_stats(&self, range: &DateRange) -> StoreResult<OrderStats> {
        let state = self.state.lock().await;
        let mut stats = OrderStats::default();
        for order in state.orders.iter().filter(|o| range.contains(o.created_at)) {
            stats.total_orders += 1;
            match order.status {
                OrderStatus::Pending => stats.pending_orders += 1,
                OrderStatus::Delivered => stats.delivered_orders += 1,
                OrderStatus::Cancelled => stats.cancelled_orders += 1,
                _ => {}
            }
            if order.payment_status == PaymentStatus::Paid {
                stats.paid_orders += 1;
                stats.total_revenue += order.total_amount;
            }
        }
        if stats.paid_orders > 0 {
            stats.average_order_value =
                (stats.total_revenue / Decimal::from(stats.paid_orders)).round_dp(2);
        }
        Ok(stats)
    }

    async fn monthly_revenue(&self, range: &DateRange) -> StoreResult<Vec<MonthlyRevenue>> {
        let state = self.state.lock().await;
        let mut months: HashMap<String, MonthlyRevenue> = HashMap::new();
        for order in state
            .orders
            .iter()
            .filter(|o| o.payment_status == PaymentStatus::Paid)
            .filter(|o| range.contains(o.created_at))
        {
            let month = format!("{:04}-{:02}", order.created_at.year(), order.created_at.month());
            let entry = months.entry(month.clone()).or_insert(MonthlyRevenue {
                month,
                order_count: 0,
                revenue: Decimal::ZERO,
            });
            entry.order_count += 1;
            entry.revenue += order.total_amount;
        }
        let mut revenue: Vec<MonthlyRevenue> = months.into_values().collect();
        revenue.sort_by(|a, b| a.month.cmp(&b.month));
        Ok(revenue)
    }
}

#[async_trait]
impl CheckoutStore for MemoryStore {
    async fn commit_checkout(
        &self,
        draft: &OrderDraft,
        policy: StockPolicy,
    ) -> StoreResult<OrderDetail> {
        // Faults are checked before anything is touched so a failure leaves
        // no partial state, mirroring a rolled back transaction.
        self.check_order_insert()?;
        self.check_cart_clear()?;
        let mut state = self.state.lock().await;

        if policy == StockPolicy::Decrement {
            for line in &draft.lines {
                let available = state
                    .products
                    .iter()
                    .find(|p| p.id == line.product_id)
                    .map_or(0, |p| p.stock);
                if available < line.quantity {
                    return Err(StoreError::StockConflict {
                        product_id: line.product_id,
                        available,
                    });
                }
            }
            for line in &draft.lines {
                state.change_stock(line.product_id, -line.quantity);
            }
        }

        let detail = state.write_order(draft);
        state.cart.retain(|l| l.user_id != draft.user_id);
        Ok(detail)
    }

    async fn insert_order_with_pending_clear(
        &self,
        draft: &OrderDraft,
    ) -> StoreResult<OrderDetail> {
        self.check_order_insert()?;
        self.check_pending_clear()?;
        let mut state = self.state.lock().await;
        let detail = state.write_order(draft);
        state.pending.push(PendingCartClear::for_order(&detail));
        Ok(detail)
    }

    async fn pending_clears(&self, limit: i64) -> StoreResult<Vec<PendingCartClear>> {
        let state = self.state.lock().await;
        Ok(state
            .pending
            .iter()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn resolve_pending_clear(&self, order_id: Uuid) -> StoreResult<bool> {
        self.check_pending_resolve()?;
        let mut state = self.state.lock().await;
        let before = state.pending.len();
        state.pending.retain(|p| p.order_id != order_id);
        Ok(state.pending.len() < before)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn record_audit(&self, entry: AuditEntry) -> StoreResult<()> {
        self.state.lock().await.audit.push(entry);
        Ok(())
    }
}
