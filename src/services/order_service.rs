use std::{str::FromStr, sync::Arc};

use chrono::Utc;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{BulkCancelResult, BulkFailure, BulkStatusResult, OrderList},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{MonthlyRevenue, Order, OrderDetail, OrderStats, OrderStatus, PaymentStatus},
    response::Meta,
    routes::params::OrderListQuery,
    store::{
        DateRange, OrderDraft, OrderFilter, OrderLineDraft, OrderPatch, OrderStore, Store,
        order_total,
    },
};

/// Records purchases and drives their lifecycle afterwards.
///
/// Status changes are deliberately permissive: any status can be set by an
/// admin. The only guard is that delivered or cancelled orders cannot be
/// cancelled again.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Prices an order from already frozen lines.
    pub fn draft(
        user_id: Uuid,
        lines: Vec<OrderLineDraft>,
        shipping_address: String,
        payment_method: String,
        notes: Option<String>,
    ) -> OrderDraft {
        let id = Uuid::new_v4();
        OrderDraft {
            id,
            user_id,
            invoice_number: build_invoice_number(id),
            total_amount: order_total(&lines),
            lines,
            shipping_address,
            payment_method,
            notes,
        }
    }

    /// Writes an order and its lines. Input is trusted to be validated.
    pub async fn create(
        &self,
        user_id: Uuid,
        lines: Vec<OrderLineDraft>,
        shipping_address: String,
        payment_method: String,
        notes: Option<String>,
    ) -> AppResult<OrderDetail> {
        let draft = Self::draft(user_id, lines, shipping_address, payment_method, notes);
        self.insert(&draft).await
    }

    pub async fn insert(&self, draft: &OrderDraft) -> AppResult<OrderDetail> {
        let detail = self.store.insert_order(draft).await?;
        tracing::info!(
            order_id = %detail.order.id,
            user_id = %detail.order.user_id,
            total = %detail.order.total_amount,
            lines = detail.items.len(),
            "order created"
        );
        Ok(detail)
    }

    pub async fn find_by_id(&self, actor: &AuthUser, id: Uuid) -> AppResult<OrderDetail> {
        let order = self.load(id).await?;
        if !actor.can_access(order.user_id) {
            return Err(AppError::Forbidden);
        }
        let items = self.store.order_lines(order.id).await?;
        Ok(OrderDetail { order, items })
    }

    pub async fn find_by_user(
        &self,
        user_id: Uuid,
        query: OrderListQuery,
    ) -> AppResult<(OrderList, Meta)> {
        let mut filter = order_filter(&query)?;
        filter.user_id = Some(user_id);
        self.list(filter, &query).await
    }

    pub async fn find_all(
        &self,
        actor: &AuthUser,
        query: OrderListQuery,
    ) -> AppResult<(OrderList, Meta)> {
        ensure_admin(actor)?;
        let filter = order_filter(&query)?;
        self.list(filter, &query).await
    }

    pub async fn update_status(
        &self,
        actor: &AuthUser,
        id: Uuid,
        status: &str,
        notes: Option<String>,
    ) -> AppResult<Order> {
        ensure_admin(actor)?;
        let status = parse_status::<OrderStatus>(status)?;
        let order = self.apply_status(id, status, notes).await?;

        audit::record(
            self.store.as_ref(),
            Some(actor.user_id),
            "order_status_update",
            "orders",
            serde_json::json!({ "order_id": order.id, "status": order.status }),
        )
        .await;

        Ok(order)
    }

    /// Cancels an order on behalf of its owner or an admin.
    pub async fn cancel(
        &self,
        actor: &AuthUser,
        id: Uuid,
        reason: Option<String>,
    ) -> AppResult<Order> {
        let order = self.load(id).await?;
        if !actor.can_access(order.user_id) {
            return Err(AppError::Forbidden);
        }
        let order = self.cancel_loaded(order, reason.as_deref()).await?;

        audit::record(
            self.store.as_ref(),
            Some(actor.user_id),
            "order_cancel",
            "orders",
            serde_json::json!({ "order_id": order.id, "reason": reason }),
        )
        .await;

        Ok(order)
    }

    pub async fn update_payment_status(
        &self,
        actor: &AuthUser,
        id: Uuid,
        status: &str,
    ) -> AppResult<Order> {
        ensure_admin(actor)?;
        let payment_status = parse_status::<PaymentStatus>(status)?;
        let existing = self.load(id).await?;

        let paid_at = (payment_status == PaymentStatus::Paid && existing.paid_at.is_none())
            .then(Utc::now);
        let order = self
            .store
            .update_order(
                id,
                OrderPatch {
                    payment_status: Some(payment_status),
                    paid_at,
                    ..OrderPatch::default()
                },
            )
            .await?
            .ok_or(AppError::NotFound("Order"))?;

        audit::record(
            self.store.as_ref(),
            Some(actor.user_id),
            "order_payment_update",
            "orders",
            serde_json::json!({ "order_id": order.id, "payment_status": order.payment_status }),
        )
        .await;

        Ok(order)
    }

    pub async fn get_stats(&self, actor: &AuthUser, range: DateRange) -> AppResult<OrderStats> {
        ensure_admin(actor)?;
        Ok(self.store.order_stats(&range).await?)
    }

    pub async fn get_monthly_revenue(
        &self,
        actor: &AuthUser,
        range: DateRange,
    ) -> AppResult<Vec<MonthlyRevenue>> {
        ensure_admin(actor)?;
        Ok(self.store.monthly_revenue(&range).await?)
    }

    pub async fn bulk_update_status(
        &self,
        actor: &AuthUser,
        ids: &[Uuid],
        status: &str,
    ) -> AppResult<BulkStatusResult> {
        ensure_admin(actor)?;
        let status = parse_status::<OrderStatus>(status)?;

        let mut result = BulkStatusResult::default();
        for &id in ids {
            match self.apply_status(id, status, None).await {
                Ok(order) => result.updated.push(order.id),
                Err(err) => result.failed.push(bulk_failure(id, &err)),
            }
        }

        tracing::info!(
            status = %status,
            updated = result.updated.len(),
            failed = result.failed.len(),
            "bulk status update"
        );
        audit::record(
            self.store.as_ref(),
            Some(actor.user_id),
            "order_bulk_status",
            "orders",
            serde_json::json!({ "status": status, "updated": result.updated }),
        )
        .await;

        Ok(result)
    }

    /// Cancels every id it can; delivered or cancelled orders are skipped.
    pub async fn bulk_cancel(
        &self,
        actor: &AuthUser,
        ids: &[Uuid],
        reason: Option<String>,
    ) -> AppResult<BulkCancelResult> {
        ensure_admin(actor)?;

        let mut result = BulkCancelResult::default();
        for &id in ids {
            let order = match self.load(id).await {
                Ok(order) => order,
                Err(err) => {
                    result.failed.push(bulk_failure(id, &err));
                    continue;
                }
            };
            if order.status.is_terminal() {
                result.skipped.push(id);
                continue;
            }
            match self.cancel_loaded(order, reason.as_deref()).await {
                Ok(order) => result.cancelled.push(order.id),
                Err(err) => result.failed.push(bulk_failure(id, &err)),
            }
        }
        result.skipped_count = result.skipped.len();

        audit::record(
            self.store.as_ref(),
            Some(actor.user_id),
            "order_bulk_cancel",
            "orders",
            serde_json::json!({
                "cancelled": result.cancelled,
                "skipped": result.skipped_count,
            }),
        )
        .await;

        Ok(result)
    }

    async fn load(&self, id: Uuid) -> AppResult<Order> {
        self.store
            .find_order(id)
            .await?
            .ok_or(AppError::NotFound("Order"))
    }

    async fn apply_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        notes: Option<String>,
    ) -> AppResult<Order> {
        self.store
            .update_order(
                id,
                OrderPatch {
                    status: Some(status),
                    notes,
                    ..OrderPatch::default()
                },
            )
            .await?
            .ok_or(AppError::NotFound("Order"))
    }

    async fn cancel_loaded(&self, order: Order, reason: Option<&str>) -> AppResult<Order> {
        if order.status.is_terminal() {
            return Err(AppError::InvalidTransition(format!(
                "Order cannot be cancelled from status '{}'",
                order.status
            )));
        }

        let notes = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|reason| match order.notes.as_deref() {
                Some(existing) if !existing.is_empty() => {
                    format!("{existing}\nCancellation reason: {reason}")
                }
                _ => format!("Cancellation reason: {reason}"),
            });

        let cancelled = self
            .store
            .update_order(
                order.id,
                OrderPatch {
                    status: Some(OrderStatus::Cancelled),
                    notes,
                    ..OrderPatch::default()
                },
            )
            .await?
            .ok_or(AppError::NotFound("Order"))?;

        tracing::info!(order_id = %cancelled.id, "order cancelled");
        Ok(cancelled)
    }

    async fn list(
        &self,
        filter: OrderFilter,
        query: &OrderListQuery,
    ) -> AppResult<(OrderList, Meta)> {
        let (page, per_page, _) = query.pagination().normalize();
        let orders = self.store.list_orders(&filter).await?;
        let meta = Meta::new(page, per_page, orders.total);
        Ok((
            OrderList {
                items: orders.items,
            },
            meta,
        ))
    }
}

fn parse_status<T: FromStr>(raw: &str) -> AppResult<T> {
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(|_| AppError::InvalidStatus(raw.to_string()))
}

fn order_filter(query: &OrderListQuery) -> AppResult<OrderFilter> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(parse_status::<OrderStatus>)
        .transpose()?;
    let payment_status = query
        .payment_status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(parse_status::<PaymentStatus>)
        .transpose()?;

    Ok(OrderFilter {
        user_id: query.user_id,
        status,
        payment_status,
        range: DateRange {
            from: query.from,
            to: query.to,
        },
        sort_order: query.sort_order.clone(),
        page: query.pagination().page_request(),
    })
}

fn bulk_failure(order_id: Uuid, err: &AppError) -> BulkFailure {
    BulkFailure {
        order_id,
        error: err.to_string(),
    }
}

fn build_invoice_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.simple().to_string();
    format!("INV-{}-{}", date, &suffix[..8]).to_uppercase()
}
