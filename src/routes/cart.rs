use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartCleared, CartItemRemoved, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartLine, CartValidation, CartView},
    response::ApiResponse,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_to_cart))
        .route(
            "/items/{product_id}",
            put(update_cart_item).delete(remove_from_cart),
        )
        .route("/validate", get(validate_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart of the current user with totals", body = ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let view = state.cart.get_by_user(user.user_id).await?;
    Ok(Json(ApiResponse::success("OK", view, None)))
}

#[utoipa::path(
    post,
    path = "/api/cart/items",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add to or increase a cart line", body = ApiResponse<CartLine>),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Unavailable or insufficient stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartLine>>> {
    let line = state
        .cart
        .add_item(user.user_id, payload.product_id, payload.quantity)
        .await?;
    Ok(Json(ApiResponse::success("Added to cart", line, None)))
}

#[utoipa::path(
    put,
    path = "/api/cart/items/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Line updated, or removed when quantity <= 0", body = ApiResponse<CartLine>),
        (status = 404, description = "Cart item not found"),
        (status = 409, description = "Unavailable or insufficient stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<Option<CartLine>>>> {
    let line = state
        .cart
        .update_quantity(user.user_id, product_id, payload.quantity)
        .await?;
    let message = if line.is_some() {
        "Cart item updated"
    } else {
        "Cart item removed"
    };
    Ok(Json(ApiResponse::success(message, line, None)))
}

#[utoipa::path(
    delete,
    path = "/api/cart/items/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Removed", body = ApiResponse<CartItemRemoved>),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartItemRemoved>>> {
    if !state.cart.remove_item(user.user_id, product_id).await? {
        return Err(AppError::NotFound("Cart item"));
    }
    Ok(Json(ApiResponse::success(
        "Removed from cart",
        CartItemRemoved {
            product_id,
            removed: true,
        },
        None,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart cleared", body = ApiResponse<CartCleared>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartCleared>>> {
    let removed = state.cart.clear(user.user_id).await?;
    Ok(Json(ApiResponse::success(
        "Cart cleared",
        CartCleared { removed },
        None,
    )))
}

#[utoipa::path(
    get,
    path = "/api/cart/validate",
    responses(
        (status = 200, description = "Checkout readiness of the cart", body = ApiResponse<CartValidation>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn validate_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartValidation>>> {
    let verdict = state.cart.validate(user.user_id).await?;
    let message = if verdict.valid {
        "Cart is ready for checkout"
    } else {
        "Cart has problems"
    };
    Ok(Json(ApiResponse::success(message, verdict, None)))
}
