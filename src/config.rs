use std::{env, time::Duration};

use anyhow::{Context, bail};

use crate::store::StockPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// How checkout persists the order and clears the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutMode {
    /// Stock, order and cart change in one store transaction.
    #[default]
    Transactional,
    /// Order insert and cart clear are separate calls; a failed clear is
    /// recorded and retried by the sweeper.
    Sequential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckoutSettings {
    pub mode: CheckoutMode,
    pub stock_policy: StockPolicy,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub storage: StorageBackend,
    pub checkout: CheckoutSettings,
    pub cart_sweep_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let storage = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("memory") => StorageBackend::Memory,
            Ok("postgres") | Err(_) => StorageBackend::Postgres,
            Ok(other) => bail!("unknown STORAGE_BACKEND '{other}'"),
        };
        let database_url = env::var("DATABASE_URL").ok();
        if storage == StorageBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set for the postgres backend");
        }
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;

        let mode = match env::var("CHECKOUT_MODE").as_deref() {
            Ok("sequential") => CheckoutMode::Sequential,
            Ok("transactional") | Err(_) => CheckoutMode::Transactional,
            Ok(other) => bail!("unknown CHECKOUT_MODE '{other}'"),
        };
        let stock_policy = match env::var("CHECKOUT_STOCK_POLICY").as_deref() {
            Ok("validate_only") => StockPolicy::ValidateOnly,
            Ok("decrement") | Err(_) => StockPolicy::Decrement,
            Ok(other) => bail!("unknown CHECKOUT_STOCK_POLICY '{other}'"),
        };
        let sweep_secs = env::var("CART_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            storage,
            checkout: CheckoutSettings { mode, stock_policy },
            cart_sweep_interval: Duration::from_secs(sweep_secs.max(1)),
        })
    }
}
