use std::sync::Arc;

use rust_decimal::Decimal;
use storefront_api::{
    config::{CheckoutMode, CheckoutSettings},
    db::{create_pool, run_migrations},
    dto::{orders::CheckoutRequest, products::LowStockQuery},
    middleware::auth::{AuthUser, ROLE_ADMIN, ROLE_USER},
    models::{OrderStatus, PaymentStatus, ProductStatus},
    state::AppState,
    store::{
        CatalogStore, CheckoutStore, NewProduct, NewUser, PgStore, StockPolicy, Store, UserStore,
    },
};
use uuid::Uuid;

// Integration flow against Postgres: cart -> checkout -> pay; admin ships and sees low stock.
#[tokio::test]
async fn checkout_pay_and_admin_low_stock_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let Some(store) = setup_store().await? else {
        return Ok(());
    };
    let state = AppState::new(store.clone(), "flow-secret", CheckoutSettings::default());

    let user = create_user(&store, ROLE_USER).await?;
    let admin = create_user(&store, ROLE_ADMIN).await?;
    let product = create_product(&store, "Test Widget", Decimal::new(1000, 2), 10).await?;

    state.cart.add_item(user.user_id, product, 2).await?;

    let detail = state
        .checkout
        .checkout(user.user_id, checkout_request())
        .await?;
    assert_eq!(detail.order.total_amount, Decimal::new(2000, 2));
    assert!(state.cart.get_by_user(user.user_id).await?.items.is_empty());

    let paid = state
        .orders
        .update_payment_status(&admin, detail.order.id, "paid")
        .await?;
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert!(paid.paid_at.is_some());

    let shipped = state
        .orders
        .update_status(&admin, detail.order.id, "shipped", None)
        .await?;
    assert_eq!(shipped.status, OrderStatus::Shipped);

    // Stock went from 10 to 8 under the default decrement policy.
    let (low, _) = state
        .admin
        .low_stock(
            &admin,
            LowStockQuery {
                threshold: Some(8),
                page: Some(1),
                per_page: Some(20),
            },
        )
        .await?;
    assert!(
        low.items.iter().any(|p| p.id == product && p.stock == 8),
        "expected product to appear in low-stock list"
    );

    let stats = state
        .orders
        .get_stats(&admin, Default::default())
        .await?;
    assert_eq!(stats.paid_orders, 1);
    assert_eq!(stats.total_revenue, Decimal::new(2000, 2));

    Ok(())
}

#[tokio::test]
async fn guarded_decrement_rejects_the_second_buyer() -> anyhow::Result<()> {
    let Some(store) = setup_store().await? else {
        return Ok(());
    };
    let state = AppState::new(
        store.clone(),
        "flow-secret",
        CheckoutSettings {
            mode: CheckoutMode::Transactional,
            stock_policy: StockPolicy::Decrement,
        },
    );

    let alice = create_user(&store, ROLE_USER).await?;
    let bob = create_user(&store, ROLE_USER).await?;
    let lamp = create_product(&store, "Last Lamp", Decimal::new(3000, 2), 1).await?;
    state.cart.add_item(alice.user_id, lamp, 1).await?;
    state.cart.add_item(bob.user_id, lamp, 1).await?;

    state
        .checkout
        .checkout(alice.user_id, checkout_request())
        .await?;
    let second = state.checkout.checkout(bob.user_id, checkout_request()).await;

    assert!(second.is_err());
    let stock = store.find_product(lamp).await?.map(|p| p.stock);
    assert_eq!(stock, Some(0));
    Ok(())
}

#[tokio::test]
async fn sequential_checkout_leaves_no_marker_on_success() -> anyhow::Result<()> {
    let Some(store) = setup_store().await? else {
        return Ok(());
    };
    let state = AppState::new(
        store.clone(),
        "flow-secret",
        CheckoutSettings {
            mode: CheckoutMode::Sequential,
            stock_policy: StockPolicy::Decrement,
        },
    );

    let user = create_user(&store, ROLE_USER).await?;
    let mug = create_product(&store, "Sequential Mug", Decimal::new(1250, 2), 4).await?;
    state.cart.add_item(user.user_id, mug, 3).await?;

    let detail = state
        .checkout
        .checkout(user.user_id, checkout_request())
        .await?;

    assert_eq!(detail.order.total_amount, Decimal::new(3750, 2));
    assert!(store.pending_clears(10).await?.is_empty());
    assert_eq!(store.find_product(mug).await?.map(|p| p.stock), Some(1));
    Ok(())
}

async fn setup_store() -> anyhow::Result<Option<Arc<dyn Store>>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    Ok(Some(store))
}

async fn create_user(store: &Arc<dyn Store>, role: &str) -> anyhow::Result<AuthUser> {
    let user = store
        .insert_user(NewUser {
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: "dummy".into(),
            role: role.into(),
        })
        .await?;
    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

async fn create_product(
    store: &Arc<dyn Store>,
    name: &str,
    price: Decimal,
    stock: i32,
) -> anyhow::Result<Uuid> {
    // Names are unique; suffix keeps reruns against the same database apart.
    let product = store
        .insert_product(NewProduct {
            category_id: None,
            name: format!("{name} {}", Uuid::new_v4().simple()),
            description: Some("A product for testing".into()),
            price,
            stock,
            status: ProductStatus::Available,
        })
        .await?;
    Ok(product.id)
}

fn checkout_request() -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: "Somewhere".into(),
        payment_method: "cash".into(),
        notes: None,
    }
}
