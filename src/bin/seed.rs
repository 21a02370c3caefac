use anyhow::Context;
use rust_decimal::Decimal;
use storefront_api::{
    db::{create_pool, run_migrations},
    middleware::auth::{ROLE_ADMIN, ROLE_USER},
    models::ProductStatus,
    routes::params::{ProductSortBy, SortOrder},
    services::auth_service::hash_password,
    store::{
        CatalogStore, NewCategory, NewProduct, NewUser, PageRequest, PgStore, ProductFilter,
        UserStore,
    },
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;
    let store = PgStore::new(pool);

    let admin_id = ensure_user(&store, "admin@example.com", "admin12345", ROLE_ADMIN).await?;
    let user_id = ensure_user(&store, "user@example.com", "user12345", ROLE_USER).await?;
    seed_catalog(&store).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    store: &PgStore,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = store.find_user_by_email(email).await? {
        println!("User {email} already exists");
        return Ok(existing.id);
    }

    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let user = store
        .insert_user(NewUser {
            email: email.to_string(),
            password_hash,
            role: role.to_string(),
        })
        .await?;

    println!("Created user {email} (role={role})");
    Ok(user.id)
}

async fn seed_catalog(store: &PgStore) -> anyhow::Result<()> {
    let existing = store
        .list_products(&ProductFilter {
            search: None,
            category_id: None,
            min_price: None,
            max_price: None,
            status: None,
            sort_by: ProductSortBy::CreatedAt,
            sort_order: SortOrder::Desc,
            page: PageRequest::default(),
        })
        .await?;
    if existing.total > 0 {
        println!("Catalog already seeded ({} products)", existing.total);
        return Ok(());
    }

    let merch = store
        .insert_category(NewCategory {
            name: "Merchandise".to_string(),
            description: Some("Things to wear and use".to_string()),
        })
        .await?;
    let books = store
        .insert_category(NewCategory {
            name: "Books".to_string(),
            description: None,
        })
        .await?;

    let products = [
        (merch.id, "Axum Hoodie", "Warm hoodie for Rustaceans", Decimal::new(5500, 2), 50),
        (merch.id, "Ferris Mug", "Coffee tastes better with Ferris", Decimal::new(1200, 2), 100),
        (merch.id, "Rust Sticker Pack", "Decorate your laptop", Decimal::new(500, 2), 200),
        (books.id, "E-book: Async Rust", "Learn async Rust patterns", Decimal::new(2500, 2), 75),
    ];

    for (category_id, name, description, price, stock) in products {
        store
            .insert_product(NewProduct {
                category_id: Some(category_id),
                name: name.to_string(),
                description: Some(description.to_string()),
                price,
                stock,
                status: ProductStatus::Available,
            })
            .await?;
    }

    println!("Seeded products");
    Ok(())
}
