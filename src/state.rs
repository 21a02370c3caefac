use std::sync::Arc;

use crate::{
    config::CheckoutSettings,
    services::{
        AdminService, AuthService, CartService, CheckoutService, OrderService, ProductService,
    },
    store::Store,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth: AuthService,
    pub products: ProductService,
    pub cart: CartService,
    pub orders: OrderService,
    pub checkout: CheckoutService,
    pub admin: AdminService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        jwt_secret: impl Into<Arc<str>>,
        checkout: CheckoutSettings,
    ) -> Self {
        let cart = CartService::new(store.clone());
        let orders = OrderService::new(store.clone());
        Self {
            auth: AuthService::new(store.clone(), jwt_secret),
            products: ProductService::new(store.clone()),
            checkout: CheckoutService::new(store.clone(), cart.clone(), checkout),
            admin: AdminService::new(store.clone()),
            cart,
            orders,
            store,
        }
    }
}
