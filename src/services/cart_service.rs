use std::sync::Arc;

use uuid::Uuid;

use crate::{
    audit,
    error::{AppError, AppResult},
    models::{CartLine, CartLineDetail, CartValidation, CartView, Product},
    store::{CartStore, CatalogStore, Store},
};

/// Per-user cart lines bounded by live product stock.
///
/// Adding to a cart never reserves stock; the bound is re-checked by
/// [`CartService::validate`] at checkout.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<CartLine> {
        if quantity <= 0 {
            return Err(AppError::BadRequest(
                "quantity must be greater than 0".to_string(),
            ));
        }

        let product = self.available_product(product_id).await?;
        let existing = self
            .store
            .find_cart_line(user_id, product_id)
            .await?
            .map_or(0, |line| line.quantity);
        let requested = existing
            .checked_add(quantity)
            .ok_or_else(|| AppError::BadRequest("quantity is too large".to_string()))?;
        ensure_in_stock(&product, requested)?;

        let line = self
            .store
            .upsert_cart_line(user_id, product_id, requested)
            .await?;

        tracing::debug!(%user_id, %product_id, quantity = requested, "cart line saved");
        audit::record(
            self.store.as_ref(),
            Some(user_id),
            "cart_add",
            "cart_items",
            serde_json::json!({ "product_id": product_id, "quantity": requested }),
        )
        .await;

        Ok(line)
    }

    /// Sets a line to `quantity`. Zero or less removes the line and yields `None`.
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<Option<CartLine>> {
        if quantity <= 0 {
            self.remove_item(user_id, product_id).await?;
            return Ok(None);
        }

        if self
            .store
            .find_cart_line(user_id, product_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound("Cart item"));
        }
        let product = self.available_product(product_id).await?;
        ensure_in_stock(&product, quantity)?;

        let line = self
            .store
            .upsert_cart_line(user_id, product_id, quantity)
            .await?;

        audit::record(
            self.store.as_ref(),
            Some(user_id),
            "cart_update",
            "cart_items",
            serde_json::json!({ "product_id": product_id, "quantity": quantity }),
        )
        .await;

        Ok(Some(line))
    }

    pub async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> AppResult<bool> {
        let removed = self.store.delete_cart_line(user_id, product_id).await?;
        if removed {
            audit::record(
                self.store.as_ref(),
                Some(user_id),
                "cart_remove",
                "cart_items",
                serde_json::json!({ "product_id": product_id }),
            )
            .await;
        }
        Ok(removed)
    }

    /// The purchasable part of the cart with totals computed from live prices.
    pub async fn get_by_user(&self, user_id: Uuid) -> AppResult<CartView> {
        let lines = self.store.cart_lines(user_id).await?;
        let visible = lines
            .into_iter()
            .filter(|line| line.status.is_available())
            .collect();
        Ok(CartView::from_lines(visible))
    }

    pub async fn validate(&self, user_id: Uuid) -> AppResult<CartValidation> {
        let lines = self.store.cart_lines(user_id).await?;
        Ok(validate_lines(lines))
    }

    pub async fn clear(&self, user_id: Uuid) -> AppResult<u64> {
        let removed = self.store.clear_cart(user_id).await?;
        tracing::debug!(%user_id, removed, "cart cleared");
        Ok(removed)
    }

    async fn available_product(&self, product_id: Uuid) -> AppResult<Product> {
        let product = self
            .store
            .find_product(product_id)
            .await?
            .ok_or(AppError::NotFound("Product"))?;
        if !product.status.is_available() {
            return Err(AppError::Unavailable(format!(
                "{} is not available for purchase",
                product.name
            )));
        }
        Ok(product)
    }
}

fn ensure_in_stock(product: &Product, requested: i32) -> AppResult<()> {
    if requested > product.stock {
        return Err(AppError::InsufficientStock {
            requested,
            available: product.stock,
        });
    }
    Ok(())
}

fn validate_lines(lines: Vec<CartLineDetail>) -> CartValidation {
    let mut violations = Vec::new();
    if lines.is_empty() {
        violations.push("Cart is empty".to_string());
    }
    for line in &lines {
        if !line.status.is_available() {
            violations.push(format!("{} is no longer available", line.name));
        } else if line.quantity > line.stock {
            violations.push(format!(
                "Insufficient stock for {}: requested {}, available {}",
                line.name, line.quantity, line.stock
            ));
        }
    }
    CartValidation {
        valid: violations.is_empty(),
        violations,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::ProductStatus;

    fn line(name: &str, quantity: i32, stock: i32, status: ProductStatus) -> CartLineDetail {
        let price = Decimal::new(500, 2);
        CartLineDetail {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            name: name.to_string(),
            price,
            stock,
            status,
            quantity,
            item_total: CartLineDetail::line_total(price, quantity),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_cart_is_a_violation() {
        let verdict = validate_lines(Vec::new());
        assert!(!verdict.valid);
        assert_eq!(verdict.violations, vec!["Cart is empty".to_string()]);
    }

    #[test]
    fn reports_every_offending_line() {
        let verdict = validate_lines(vec![
            line("Mug", 3, 2, ProductStatus::Available),
            line("Hoodie", 1, 5, ProductStatus::Discontinued),
            line("Sticker", 1, 1, ProductStatus::Available),
        ]);
        assert!(!verdict.valid);
        assert_eq!(verdict.violations.len(), 2);
        assert!(verdict.violations[0].contains("requested 3, available 2"));
        assert!(verdict.violations[1].contains("Hoodie"));
        assert_eq!(verdict.lines.len(), 3);
    }
}
