mod common;

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use common::{Harness, JWT_SECRET, checkout_request, dec};
use storefront_api::{
    config::{CheckoutMode, CheckoutSettings},
    error::AppError,
    middleware::auth::ROLE_USER,
    models::{
        AuditEntry, CartLine, CartLineDetail, Category, MonthlyRevenue, Order, OrderDetail,
        OrderLine, OrderStats, PendingCartClear, Product, ProductStatus, User,
    },
    state::AppState,
    store::{
        AuditStore, CartStore, CatalogStore, CheckoutStore, DateRange, MemoryStore, NewCategory,
        NewProduct, NewUser, OrderDraft, OrderFilter, OrderPatch, OrderStore, Page, PageRequest,
        ProductFilter, ProductPatch, StockChange, StockPolicy, StoreResult, UserStore,
    },
};
use uuid::Uuid;

#[tokio::test]
async fn checkout_freezes_prices_and_clears_the_cart() {
    let h = Harness::new();
    let user = h.user().await;
    let mug = h.product("Mug", "10.00", 10).await;
    let sticker = h.product("Sticker", "5.50", 10).await;
    h.state.cart.add_item(user.user_id, mug.id, 2).await.unwrap();
    h.state
        .cart
        .add_item(user.user_id, sticker.id, 1)
        .await
        .unwrap();

    let detail = h
        .state
        .checkout
        .checkout(user.user_id, checkout_request())
        .await
        .unwrap();

    assert_eq!(detail.order.total_amount, dec("25.50"));
    assert_eq!(detail.items.len(), 2);
    assert!(
        h.state
            .cart
            .get_by_user(user.user_id)
            .await
            .unwrap()
            .items
            .is_empty()
    );

    h.store
        .update_product(
            mug.id,
            ProductPatch {
                price: Some(dec("99.00")),
                ..ProductPatch::default()
            },
        )
        .await
        .unwrap();
    let stored = h
        .state
        .orders
        .find_by_id(&user, detail.order.id)
        .await
        .unwrap();
    let mug_line = stored
        .items
        .iter()
        .find(|line| line.product_id == mug.id)
        .unwrap();
    assert_eq!(mug_line.unit_price, dec("10.00"));
    assert_eq!(mug_line.product_name, "Mug");
    assert_eq!(stored.order.total_amount, dec("25.50"));
}

#[tokio::test]
async fn empty_cart_cannot_check_out() {
    let h = Harness::new();
    let user = h.user().await;

    let err = h
        .state
        .checkout
        .checkout(user.user_id, checkout_request())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::EmptyCart));
}

#[tokio::test]
async fn invalid_cart_is_rejected_with_every_violation() {
    let h = Harness::new();
    let user = h.user().await;
    let mug = h.product("Mug", "10.00", 10).await;
    h.state.cart.add_item(user.user_id, mug.id, 5).await.unwrap();
    h.store.adjust_stock(mug.id, -7).await.unwrap();

    let err = h
        .state
        .checkout
        .checkout(user.user_id, checkout_request())
        .await
        .unwrap_err();

    match err {
        AppError::CartInvalid(violations) => assert_eq!(
            violations,
            vec!["Insufficient stock for Mug: requested 5, available 3".to_string()]
        ),
        other => panic!("unexpected error: {other:?}"),
    }
    let orders = h.store.list_orders(&OrderFilter::default()).await.unwrap();
    assert_eq!(orders.total, 0);
}

#[tokio::test]
async fn decrement_policy_takes_stock_and_stops_the_second_buyer() {
    let h = Harness::with(CheckoutMode::Transactional, StockPolicy::Decrement);
    let alice = h.user().await;
    let bob = h.user().await;
    let lamp = h.product("Lamp", "30.00", 1).await;
    h.state.cart.add_item(alice.user_id, lamp.id, 1).await.unwrap();
    h.state.cart.add_item(bob.user_id, lamp.id, 1).await.unwrap();

    h.state
        .checkout
        .checkout(alice.user_id, checkout_request())
        .await
        .unwrap();
    let second = h
        .state
        .checkout
        .checkout(bob.user_id, checkout_request())
        .await;

    assert!(matches!(second, Err(AppError::CartInvalid(_))));
    assert_eq!(h.store.find_product(lamp.id).await.unwrap().unwrap().stock, 0);
    assert_eq!(
        h.store
            .list_orders(&OrderFilter::default())
            .await
            .unwrap()
            .total,
        1
    );
}

#[tokio::test]
async fn validate_only_policy_leaves_stock_and_can_oversell() {
    let h = Harness::with(CheckoutMode::Transactional, StockPolicy::ValidateOnly);
    let alice = h.user().await;
    let bob = h.user().await;
    let lamp = h.product("Lamp", "30.00", 1).await;
    h.state.cart.add_item(alice.user_id, lamp.id, 1).await.unwrap();
    h.state.cart.add_item(bob.user_id, lamp.id, 1).await.unwrap();

    h.state
        .checkout
        .checkout(alice.user_id, checkout_request())
        .await
        .unwrap();
    h.state
        .checkout
        .checkout(bob.user_id, checkout_request())
        .await
        .unwrap();

    assert_eq!(h.store.find_product(lamp.id).await.unwrap().unwrap().stock, 1);
    assert_eq!(
        h.store
            .list_orders(&OrderFilter::default())
            .await
            .unwrap()
            .total,
        2
    );
}

#[tokio::test]
async fn sequential_decrement_takes_stock_too() {
    let h = Harness::with(CheckoutMode::Sequential, StockPolicy::Decrement);
    let user = h.user().await;
    let mug = h.product("Mug", "10.00", 10).await;
    h.state.cart.add_item(user.user_id, mug.id, 3).await.unwrap();

    h.state
        .checkout
        .checkout(user.user_id, checkout_request())
        .await
        .unwrap();

    assert_eq!(h.store.find_product(mug.id).await.unwrap().unwrap().stock, 7);
    assert!(h.store.pending_clears(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn transactional_checkout_rolls_back_when_the_cart_clear_fails() {
    let h = Harness::with(CheckoutMode::Transactional, StockPolicy::Decrement);
    let user = h.user().await;
    let mug = h.product("Mug", "10.00", 10).await;
    h.state.cart.add_item(user.user_id, mug.id, 2).await.unwrap();
    h.store.fail_cart_clear(true);

    let err = h
        .state
        .checkout
        .checkout(user.user_id, checkout_request())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Storage(_)));
    assert_eq!(
        h.store
            .list_orders(&OrderFilter::default())
            .await
            .unwrap()
            .total,
        0
    );
    assert_eq!(h.store.find_product(mug.id).await.unwrap().unwrap().stock, 10);
    let view = h.state.cart.get_by_user(user.user_id).await.unwrap();
    assert_eq!(view.summary.item_count, 2);
}

#[tokio::test]
async fn sequential_checkout_leaves_a_marker_that_the_sweep_resolves() {
    let h = Harness::with(CheckoutMode::Sequential, StockPolicy::ValidateOnly);
    let user = h.user().await;
    let mug = h.product("Mug", "10.00", 10).await;
    h.state.cart.add_item(user.user_id, mug.id, 2).await.unwrap();
    h.store.fail_cart_clear(true);

    let detail = h
        .state
        .checkout
        .checkout(user.user_id, checkout_request())
        .await
        .unwrap();

    let pending = h.store.pending_clears(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].order_id, detail.order.id);
    assert_eq!(pending[0].product_ids, vec![mug.id]);
    assert_eq!(
        h.state.cart.get_by_user(user.user_id).await.unwrap().items.len(),
        1
    );

    h.store.fail_cart_clear(false);
    let report = h.state.checkout.sweep_pending_clears().await.unwrap();

    assert_eq!(report.resolved, 1);
    assert_eq!(report.failed, 0);
    assert!(h.store.pending_clears(10).await.unwrap().is_empty());
    assert!(
        h.state
            .cart
            .get_by_user(user.user_id)
            .await
            .unwrap()
            .items
            .is_empty()
    );
}

#[tokio::test]
async fn sweep_keeps_lines_for_products_outside_the_order() {
    let h = Harness::with(CheckoutMode::Sequential, StockPolicy::ValidateOnly);
    let user = h.user().await;
    let mug = h.product("Mug", "10.00", 10).await;
    let sticker = h.product("Sticker", "5.50", 10).await;
    h.state.cart.add_item(user.user_id, mug.id, 1).await.unwrap();
    h.store.fail_cart_clear(true);
    h.state
        .checkout
        .checkout(user.user_id, checkout_request())
        .await
        .unwrap();
    h.store.fail_cart_clear(false);

    h.state
        .cart
        .add_item(user.user_id, sticker.id, 1)
        .await
        .unwrap();
    h.state.checkout.sweep_pending_clears().await.unwrap();

    let view = h.state.cart.get_by_user(user.user_id).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].product_id, sticker.id);
}

#[tokio::test]
async fn sequential_reservation_is_released_when_the_order_insert_fails() {
    let h = Harness::with(CheckoutMode::Sequential, StockPolicy::Decrement);
    let user = h.user().await;
    let mug = h.product("Mug", "10.00", 10).await;
    h.state.cart.add_item(user.user_id, mug.id, 4).await.unwrap();
    h.store.fail_order_insert(true);

    let err = h
        .state
        .checkout
        .checkout(user.user_id, checkout_request())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Storage(_)));
    assert_eq!(h.store.find_product(mug.id).await.unwrap().unwrap().stock, 10);
    assert!(h.store.pending_clears(10).await.unwrap().is_empty());
    assert_eq!(
        h.state.cart.get_by_user(user.user_id).await.unwrap().items.len(),
        1
    );
}

#[tokio::test]
async fn checkout_requires_shipping_details() {
    let h = Harness::new();
    let user = h.user().await;
    let mug = h.product("Mug", "10.00", 10).await;
    h.state.cart.add_item(user.user_id, mug.id, 1).await.unwrap();

    let mut request = checkout_request();
    request.shipping_address = "   ".into();
    let err = h
        .state
        .checkout
        .checkout(user.user_id, request)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn sequential_order_is_not_written_without_its_marker() {
    let h = Harness::with(CheckoutMode::Sequential, StockPolicy::Decrement);
    let user = h.user().await;
    let mug = h.product("Mug", "10.00", 10).await;
    h.state.cart.add_item(user.user_id, mug.id, 2).await.unwrap();
    h.store.fail_pending_clear(true);

    let err = h
        .state
        .checkout
        .checkout(user.user_id, checkout_request())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Storage(_)));
    assert_eq!(
        h.store
            .list_orders(&OrderFilter::default())
            .await
            .unwrap()
            .total,
        0
    );
    assert_eq!(h.store.find_product(mug.id).await.unwrap().unwrap().stock, 10);
    assert_eq!(
        h.state.cart.get_by_user(user.user_id).await.unwrap().items.len(),
        1
    );
}

#[tokio::test]
async fn sweep_counts_a_failed_resolve_and_keeps_going() {
    let h = Harness::with(CheckoutMode::Sequential, StockPolicy::ValidateOnly);
    let alice = h.user().await;
    let bob = h.user().await;
    let mug = h.product("Mug", "10.00", 10).await;
    h.state.cart.add_item(alice.user_id, mug.id, 1).await.unwrap();
    h.state.cart.add_item(bob.user_id, mug.id, 1).await.unwrap();
    h.store.fail_cart_clear(true);
    for user in [&alice, &bob] {
        h.state
            .checkout
            .checkout(user.user_id, checkout_request())
            .await
            .unwrap();
    }
    h.store.fail_cart_clear(false);
    h.store.fail_pending_resolve(true);

    let report = h.state.checkout.sweep_pending_clears().await.unwrap();

    assert_eq!(report.resolved, 0);
    assert_eq!(report.failed, 2);
    // Both carts were still cleared even though the markers stayed.
    for user in [&alice, &bob] {
        assert!(
            h.state
                .cart
                .get_by_user(user.user_id)
                .await
                .unwrap()
                .items
                .is_empty()
        );
    }
    assert_eq!(h.store.pending_clears(10).await.unwrap().len(), 2);

    h.store.fail_pending_resolve(false);
    let report = h.state.checkout.sweep_pending_clears().await.unwrap();
    assert_eq!(report.resolved, 2);
    assert!(h.store.pending_clears(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn cart_changing_mid_checkout_aborts_without_an_order() {
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(RepricingStore {
        inner: inner.clone(),
        reads: AtomicUsize::new(0),
    });
    let state = AppState::new(store, JWT_SECRET, CheckoutSettings::default());
    let user = inner
        .insert_user(NewUser {
            email: "shopper@example.com".into(),
            password_hash: "not-a-real-hash".into(),
            role: ROLE_USER.into(),
        })
        .await
        .unwrap();
    let mug = inner
        .insert_product(NewProduct {
            category_id: None,
            name: "Mug".into(),
            description: None,
            price: dec("10.00"),
            stock: 10,
            status: ProductStatus::Available,
        })
        .await
        .unwrap();
    inner.upsert_cart_line(user.id, mug.id, 2).await.unwrap();

    let err = state
        .checkout
        .checkout(user.id, checkout_request())
        .await
        .unwrap_err();

    match err {
        AppError::CartInvalid(violations) => {
            assert_eq!(violations.len(), 1);
            assert!(violations[0].contains("cart changed during checkout"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        inner.list_orders(&OrderFilter::default()).await.unwrap().total,
        0
    );
    assert_eq!(inner.find_product(mug.id).await.unwrap().unwrap().stock, 10);
}

/// Delegates to `MemoryStore` but reports a higher price from the second
/// cart read onwards, as if the product was repriced mid checkout.
struct RepricingStore {
    inner: Arc<MemoryStore>,
    reads: AtomicUsize,
}

#[async_trait]
impl UserStore for RepricingStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        self.inner.insert_user(user).await
    }
}

#[async_trait]
impl CatalogStore for RepricingStore {
    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        self.inner.find_product(id).await
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Page<Product>> {
        self.inner.list_products(filter).await
    }

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        self.inner.insert_product(product).await
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> StoreResult<Option<Product>> {
        self.inner.update_product(id, patch).await
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_product(id).await
    }

    async fn adjust_stock(&self, id: Uuid, delta: i32) -> StoreResult<StockChange> {
        self.inner.adjust_stock(id, delta).await
    }

    async fn low_stock(&self, threshold: i32, page: PageRequest) -> StoreResult<Page<Product>> {
        self.inner.low_stock(threshold, page).await
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        self.inner.list_categories().await
    }

    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category> {
        self.inner.insert_category(category).await
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_category(id).await
    }
}

#[async_trait]
impl CartStore for RepricingStore {
    async fn find_cart_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> StoreResult<Option<CartLine>> {
        self.inner.find_cart_line(user_id, product_id).await
    }

    async fn upsert_cart_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> StoreResult<CartLine> {
        self.inner
            .upsert_cart_line(user_id, product_id, quantity)
            .await
    }

    async fn delete_cart_line(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
        self.inner.delete_cart_line(user_id, product_id).await
    }

    async fn cart_lines(&self, user_id: Uuid) -> StoreResult<Vec<CartLineDetail>> {
        let mut lines = self.inner.cart_lines(user_id).await?;
        if self.reads.fetch_add(1, Ordering::SeqCst) > 0 {
            for line in &mut lines {
                line.price += dec("1.00");
                line.item_total = CartLineDetail::line_total(line.price, line.quantity);
            }
        }
        Ok(lines)
    }

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<u64> {
        self.inner.clear_cart(user_id).await
    }
}

#[async_trait]
impl OrderStore for RepricingStore {
    async fn insert_order(&self, draft: &OrderDraft) -> StoreResult<OrderDetail> {
        self.inner.insert_order(draft).await
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        self.inner.find_order(id).await
    }

    async fn order_lines(&self, order_id: Uuid) -> StoreResult<Vec<OrderLine>> {
        self.inner.order_lines(order_id).await
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Page<Order>> {
        self.inner.list_orders(filter).await
    }

    async fn update_order(&self, id: Uuid, patch: OrderPatch) -> StoreResult<Option<Order>> {
        self.inner.update_order(id, patch).await
    }

    async fn order_stats(&self, range: &DateRange) -> StoreResult<OrderStats> {
        self.inner.order_stats(range).await
    }

    async fn monthly_revenue(&self, range: &DateRange) -> StoreResult<Vec<MonthlyRevenue>> {
        self.inner.monthly_revenue(range).await
    }
}

#[async_trait]
impl CheckoutStore for RepricingStore {
    async fn commit_checkout(
        &self,
        draft: &OrderDraft,
        policy: StockPolicy,
    ) -> StoreResult<OrderDetail> {
        self.inner.commit_checkout(draft, policy).await
    }

    async fn insert_order_with_pending_clear(
        &self,
        draft: &OrderDraft,
    ) -> StoreResult<OrderDetail> {
        self.inner.insert_order_with_pending_clear(draft).await
    }

    async fn pending_clears(&self, limit: i64) -> StoreResult<Vec<PendingCartClear>> {
        self.inner.pending_clears(limit).await
    }

    async fn resolve_pending_clear(&self, order_id: Uuid) -> StoreResult<bool> {
        self.inner.resolve_pending_clear(order_id).await
    }
}

#[async_trait]
impl AuditStore for RepricingStore {
    async fn record_audit(&self, entry: AuditEntry) -> StoreResult<()> {
        self.inner.record_audit(entry).await
    }
}
