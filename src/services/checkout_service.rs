use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    audit,
    config::{CheckoutMode, CheckoutSettings},
    dto::orders::CheckoutRequest,
    error::{AppError, AppResult},
    models::{CartLineDetail, OrderDetail, PendingCartClear},
    services::{cart_service::CartService, order_service::OrderService},
    store::{
        CartStore, CatalogStore, CheckoutStore, OrderDraft, OrderLineDraft, StockChange,
        StockPolicy, Store, StoreError, order_total,
    },
};

const SWEEP_BATCH: i64 = 100;

/// Outcome of one pass over the pending cart clears.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub resolved: usize,
    pub failed: usize,
}

/// Turns a validated cart into an order.
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn Store>,
    cart: CartService,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn Store>, cart: CartService, settings: CheckoutSettings) -> Self {
        Self {
            store,
            cart,
            settings,
        }
    }

    pub async fn checkout(&self, user_id: Uuid, req: CheckoutRequest) -> AppResult<OrderDetail> {
        let shipping_address = req.shipping_address.trim().to_string();
        if shipping_address.is_empty() {
            return Err(AppError::BadRequest(
                "shipping_address is required".to_string(),
            ));
        }
        let payment_method = req.payment_method.trim().to_string();
        if payment_method.is_empty() {
            return Err(AppError::BadRequest("payment_method is required".to_string()));
        }

        let view = self.cart.get_by_user(user_id).await?;
        if view.items.is_empty() {
            return Err(AppError::EmptyCart);
        }

        let verdict = self.cart.validate(user_id).await?;
        if !verdict.valid {
            return Err(AppError::CartInvalid(verdict.violations));
        }

        let lines = freeze_lines(&verdict.lines);
        if lines.len() != view.summary.line_count || order_total(&lines) != view.summary.subtotal
        {
            tracing::warn!(%user_id, "cart changed between view and validation");
            return Err(AppError::CartInvalid(vec![
                "cart changed during checkout, please review it and try again".to_string(),
            ]));
        }

        let draft = OrderService::draft(
            user_id,
            lines,
            shipping_address,
            payment_method,
            req.notes.filter(|n| !n.trim().is_empty()),
        );

        let detail = match self.settings.mode {
            CheckoutMode::Transactional => self.commit_transactional(&draft).await?,
            CheckoutMode::Sequential => self.commit_sequential(&draft).await?,
        };

        tracing::info!(
            order_id = %detail.order.id,
            %user_id,
            total = %detail.order.total_amount,
            mode = ?self.settings.mode,
            "checkout completed"
        );
        audit::record(
            self.store.as_ref(),
            Some(user_id),
            "checkout",
            "orders",
            serde_json::json!({
                "order_id": detail.order.id,
                "invoice_number": detail.order.invoice_number,
                "total_amount": detail.order.total_amount,
            }),
        )
        .await;

        Ok(detail)
    }

    /// Retries cart clears left behind by sequential checkouts.
    ///
    /// Only the lines for products of the recorded order are removed, so
    /// anything the user added afterwards for other products survives.
    pub async fn sweep_pending_clears(&self) -> AppResult<SweepReport> {
        let pending = self.store.pending_clears(SWEEP_BATCH).await?;
        let mut report = SweepReport::default();

        for marker in pending {
            let outcome = match self.clear_for(&marker).await {
                Ok(()) => self
                    .store
                    .resolve_pending_clear(marker.order_id)
                    .await
                    .map(|_| ()),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => report.resolved += 1,
                Err(err) => {
                    tracing::warn!(
                        order_id = %marker.order_id,
                        error = %err,
                        "pending cart clear still failing"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.resolved > 0 || report.failed > 0 {
            tracing::info!(
                resolved = report.resolved,
                failed = report.failed,
                "pending cart clear sweep finished"
            );
        }
        Ok(report)
    }

    async fn commit_transactional(&self, draft: &OrderDraft) -> AppResult<OrderDetail> {
        self.store
            .commit_checkout(draft, self.settings.stock_policy)
            .await
            .map_err(|err| match err {
                StoreError::StockConflict {
                    product_id,
                    available,
                } => AppError::CartInvalid(vec![stock_conflict_message(
                    draft, product_id, available,
                )]),
                other => other.into(),
            })
    }

    async fn commit_sequential(&self, draft: &OrderDraft) -> AppResult<OrderDetail> {
        let reserved = match self.settings.stock_policy {
            StockPolicy::Decrement => self.reserve_stock(draft).await?,
            StockPolicy::ValidateOnly => Vec::new(),
        };

        // The marker lands with the order, so a cart clear that fails below
        // is always picked up by the sweeper.
        let detail = match self.store.insert_order_with_pending_clear(draft).await {
            Ok(detail) => detail,
            Err(err) => {
                self.release_stock(&reserved).await;
                return Err(err.into());
            }
        };
        tracing::info!(
            order_id = %detail.order.id,
            user_id = %detail.order.user_id,
            total = %detail.order.total_amount,
            lines = detail.items.len(),
            "order created"
        );

        match self.store.clear_cart(draft.user_id).await {
            Ok(_) => {
                if let Err(err) = self.store.resolve_pending_clear(detail.order.id).await {
                    tracing::warn!(
                        order_id = %detail.order.id,
                        error = %err,
                        "failed to resolve pending cart clear; left for the sweeper"
                    );
                }
            }
            Err(err) => {
                tracing::warn!(
                    order_id = %detail.order.id,
                    error = %err,
                    "cart clear failed after order insert; left for the sweeper"
                );
            }
        }

        Ok(detail)
    }

    /// Takes every line out of stock or none of them.
    async fn reserve_stock(&self, draft: &OrderDraft) -> AppResult<Vec<(Uuid, i32)>> {
        let mut lines: Vec<&OrderLineDraft> = draft.lines.iter().collect();
        lines.sort_by_key(|line| line.product_id);

        let mut reserved = Vec::with_capacity(lines.len());
        for line in lines {
            let outcome = match self.store.adjust_stock(line.product_id, -line.quantity).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.release_stock(&reserved).await;
                    return Err(err.into());
                }
            };
            match outcome {
                StockChange::Applied { .. } => reserved.push((line.product_id, line.quantity)),
                StockChange::Insufficient { available } => {
                    self.release_stock(&reserved).await;
                    return Err(AppError::CartInvalid(vec![stock_conflict_message(
                        draft,
                        line.product_id,
                        available,
                    )]));
                }
                StockChange::Missing => {
                    self.release_stock(&reserved).await;
                    return Err(AppError::CartInvalid(vec![format!(
                        "{} is no longer available",
                        line.product_name
                    )]));
                }
            }
        }
        Ok(reserved)
    }

    async fn release_stock(&self, reserved: &[(Uuid, i32)]) {
        for &(product_id, quantity) in reserved {
            if let Err(err) = self.store.adjust_stock(product_id, quantity).await {
                tracing::error!(%product_id, quantity, error = %err, "failed to release reserved stock");
            }
        }
    }

    async fn clear_for(&self, marker: &PendingCartClear) -> Result<(), StoreError> {
        for &product_id in &marker.product_ids {
            self.store
                .delete_cart_line(marker.user_id, product_id)
                .await?;
        }
        Ok(())
    }
}

fn freeze_lines(lines: &[CartLineDetail]) -> Vec<OrderLineDraft> {
    lines
        .iter()
        .map(|line| OrderLineDraft {
            product_id: line.product_id,
            product_name: line.name.clone(),
            quantity: line.quantity,
            unit_price: line.price,
        })
        .collect()
}

fn stock_conflict_message(draft: &OrderDraft, product_id: Uuid, available: i32) -> String {
    let line = draft.lines.iter().find(|l| l.product_id == product_id);
    match line {
        Some(line) => format!(
            "Insufficient stock for {}: requested {}, available {}",
            line.product_name, line.quantity, available
        ),
        None => format!("Insufficient stock for product {product_id}"),
    }
}
