use std::sync::Arc;

use uuid::Uuid;

use crate::{
    audit,
    dto::products::{InventoryAdjustRequest, LowStockQuery, ProductList},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::Meta,
    routes::params::Pagination,
    store::{CatalogStore, StockChange, Store},
};

const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

/// Inventory operations reserved for admins.
#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn Store>,
}

impl AdminService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn low_stock(
        &self,
        actor: &AuthUser,
        query: LowStockQuery,
    ) -> AppResult<(ProductList, Meta)> {
        ensure_admin(actor)?;
        let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
        let pagination = Pagination {
            page: query.page,
            per_page: query.per_page,
        };
        let (page, per_page, _) = pagination.normalize();

        let products = self
            .store
            .low_stock(threshold, pagination.page_request())
            .await?;
        let meta = Meta::new(page, per_page, products.total);
        Ok((
            ProductList {
                items: products.items,
            },
            meta,
        ))
    }

    /// Applies a stock delta; the result never goes below zero or past `i32::MAX`.
    pub async fn adjust_inventory(
        &self,
        actor: &AuthUser,
        id: Uuid,
        payload: InventoryAdjustRequest,
    ) -> AppResult<Product> {
        ensure_admin(actor)?;
        if payload.delta == 0 {
            return Err(AppError::BadRequest("delta must not be 0".into()));
        }

        let current = self
            .store
            .find_product(id)
            .await?
            .ok_or(AppError::NotFound("Product"))?;
        if current.stock.checked_add(payload.delta).is_none() {
            return Err(AppError::BadRequest(format!(
                "delta out of range (current stock {})",
                current.stock
            )));
        }

        match self.store.adjust_stock(id, payload.delta).await? {
            StockChange::Applied { stock } => {
                tracing::info!(product_id = %id, delta = payload.delta, stock, "inventory adjusted");
            }
            StockChange::Insufficient { available } if payload.delta < 0 => {
                return Err(AppError::BadRequest(format!(
                    "stock cannot be negative (current stock {available})"
                )));
            }
            StockChange::Insufficient { available } => {
                return Err(AppError::BadRequest(format!(
                    "delta out of range (current stock {available})"
                )));
            }
            StockChange::Missing => return Err(AppError::NotFound("Product")),
        }

        let product = self
            .store
            .find_product(id)
            .await?
            .ok_or(AppError::NotFound("Product"))?;

        audit::record(
            self.store.as_ref(),
            Some(actor.user_id),
            "inventory_adjust",
            "products",
            serde_json::json!({
                "product_id": id,
                "delta": payload.delta,
                "stock": product.stock,
            }),
        )
        .await;

        Ok(product)
    }
}
