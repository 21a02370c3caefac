#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use storefront_api::{
    config::{CheckoutMode, CheckoutSettings},
    middleware::auth::{AuthUser, ROLE_ADMIN, ROLE_USER},
    models::{Product, ProductStatus, User},
    state::AppState,
    store::{CatalogStore, MemoryStore, NewProduct, NewUser, StockPolicy, Store, UserStore},
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(CheckoutSettings::default())
    }

    pub fn with(mode: CheckoutMode, stock_policy: StockPolicy) -> Self {
        Self::with_settings(CheckoutSettings { mode, stock_policy })
    }

    pub fn with_settings(settings: CheckoutSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn Store> = store.clone();
        let state = AppState::new(dyn_store, JWT_SECRET, settings);
        Self { store, state }
    }

    pub async fn user(&self) -> AuthUser {
        let user = self.insert_user(ROLE_USER).await;
        AuthUser {
            user_id: user.id,
            role: user.role,
        }
    }

    pub async fn admin(&self) -> AuthUser {
        let user = self.insert_user(ROLE_ADMIN).await;
        AuthUser {
            user_id: user.id,
            role: user.role,
        }
    }

    pub async fn insert_user(&self, role: &str) -> User {
        self.store
            .insert_user(NewUser {
                email: format!("{}@example.com", Uuid::new_v4()),
                password_hash: "not-a-real-hash".into(),
                role: role.into(),
            })
            .await
            .expect("insert user")
    }

    pub async fn product(&self, name: &str, price: &str, stock: i32) -> Product {
        self.store
            .insert_product(NewProduct {
                category_id: None,
                name: name.into(),
                description: None,
                price: price.parse::<Decimal>().expect("price"),
                stock,
                status: ProductStatus::Available,
            })
            .await
            .expect("insert product")
    }
}

pub fn dec(raw: &str) -> Decimal {
    raw.parse().expect("decimal literal")
}

pub fn checkout_request() -> storefront_api::dto::orders::CheckoutRequest {
    storefront_api::dto::orders::CheckoutRequest {
        shipping_address: "1 Ferris Way".into(),
        payment_method: "card".into(),
        notes: None,
    }
}
