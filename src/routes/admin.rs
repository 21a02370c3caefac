use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        orders::{
            BulkCancelRequest, BulkCancelResult, BulkStatusRequest, BulkStatusResult, OrderList,
        },
        products::{InventoryAdjustRequest, LowStockQuery, ProductList},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{MonthlyRevenue, OrderStats, Product},
    response::ApiResponse,
    routes::params::{DateRangeQuery, OrderListQuery},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/bulk-status", post(bulk_update_status))
        .route("/orders/bulk-cancel", post(bulk_cancel))
        .route("/orders/stats", get(order_stats))
        .route("/orders/revenue", get(monthly_revenue))
        .route("/inventory/low-stock", get(list_low_stock))
        .route("/inventory/{id}", patch(adjust_inventory))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("payment_status" = Option<String>, Query, description = "Filter by payment status"),
        ("user_id" = Option<Uuid>, Query, description = "Filter by owner"),
        ("from" = Option<String>, Query, description = "Created at or after (RFC 3339)"),
        ("to" = Option<String>, Query, description = "Created at or before (RFC 3339)"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Get all orders (admin only)", body = ApiResponse<OrderList>),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal Server Error"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let (data, meta) = state.orders.find_all(&user, query).await?;
    Ok(Json(ApiResponse::success("Orders", data, Some(meta))))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders/bulk-status",
    request_body = BulkStatusRequest,
    responses(
        (status = 200, description = "Per-order outcome of the update", body = ApiResponse<BulkStatusResult>),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn bulk_update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BulkStatusRequest>,
) -> AppResult<Json<ApiResponse<BulkStatusResult>>> {
    let result = state
        .orders
        .bulk_update_status(&user, &payload.order_ids, &payload.status)
        .await?;
    Ok(Json(ApiResponse::success("Bulk status update", result, None)))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders/bulk-cancel",
    request_body = BulkCancelRequest,
    responses(
        (status = 200, description = "Cancelled, skipped and failed ids", body = ApiResponse<BulkCancelResult>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn bulk_cancel(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BulkCancelRequest>,
) -> AppResult<Json<ApiResponse<BulkCancelResult>>> {
    let result = state
        .orders
        .bulk_cancel(&user, &payload.order_ids, payload.reason)
        .await?;
    Ok(Json(ApiResponse::success("Bulk cancel", result, None)))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/stats",
    params(
        ("from" = Option<String>, Query, description = "Created at or after (RFC 3339)"),
        ("to" = Option<String>, Query, description = "Created at or before (RFC 3339)"),
    ),
    responses(
        (status = 200, description = "Order counts and paid revenue", body = ApiResponse<OrderStats>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn order_stats(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<ApiResponse<OrderStats>>> {
    let stats = state.orders.get_stats(&user, query.range()).await?;
    Ok(Json(ApiResponse::success("Order stats", stats, None)))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/revenue",
    params(
        ("from" = Option<String>, Query, description = "Created at or after (RFC 3339)"),
        ("to" = Option<String>, Query, description = "Created at or before (RFC 3339)"),
    ),
    responses(
        (status = 200, description = "Paid revenue per calendar month", body = ApiResponse<Vec<MonthlyRevenue>>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn monthly_revenue(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<ApiResponse<Vec<MonthlyRevenue>>>> {
    let revenue = state
        .orders
        .get_monthly_revenue(&user, query.range())
        .await?;
    Ok(Json(ApiResponse::success("Monthly revenue", revenue, None)))
}

#[utoipa::path(
    get,
    path = "/api/admin/inventory/low-stock",
    params(
        ("threshold" = Option<i32>, Query, description = "Stock at or below, default 5"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
    ),
    responses(
        (status = 200, description = "Products running low", body = ApiResponse<ProductList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let (data, meta) = state.admin.low_stock(&user, query).await?;
    Ok(Json(ApiResponse::success("Low stock", data, Some(meta))))
}

#[utoipa::path(
    patch,
    path = "/api/admin/inventory/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = InventoryAdjustRequest,
    responses(
        (status = 200, description = "Stock adjusted", body = ApiResponse<Product>),
        (status = 400, description = "Zero delta or stock would go negative"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<InventoryAdjustRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let product = state.admin.adjust_inventory(&user, id, payload).await?;
    Ok(Json(ApiResponse::success("Inventory adjusted", product, None)))
}
