use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartCleared, CartItemRemoved, UpdateCartItemRequest},
        orders::{
            BulkCancelRequest, BulkCancelResult, BulkFailure, BulkStatusRequest,
            BulkStatusResult, CancelOrderRequest, CheckoutRequest, OrderList,
            UpdateOrderStatusRequest, UpdatePaymentStatusRequest,
        },
        products::{
            CategoryList, CreateCategoryRequest, CreateProductRequest, InventoryAdjustRequest,
            ProductList, UpdateProductRequest,
        },
    },
    models::{
        CartLine, CartLineDetail, CartSummary, CartValidation, CartView, Category,
        MonthlyRevenue, Order, OrderDetail, OrderLine, OrderStats, OrderStatus, PaymentStatus,
        Product, ProductStatus, User,
    },
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, health, orders, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        products::list_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::delete_product,
        products::list_categories,
        products::create_category,
        products::delete_category,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        cart::validate_cart,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::cancel_order,
        orders::update_order_status,
        orders::update_payment_status,
        admin::list_all_orders,
        admin::bulk_update_status,
        admin::bulk_cancel,
        admin::order_stats,
        admin::monthly_revenue,
        admin::list_low_stock,
        admin::adjust_inventory
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            ProductStatus,
            CartLine,
            CartLineDetail,
            CartSummary,
            CartView,
            CartValidation,
            Order,
            OrderLine,
            OrderDetail,
            OrderStatus,
            PaymentStatus,
            OrderStats,
            MonthlyRevenue,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartItemRemoved,
            CartCleared,
            CheckoutRequest,
            CancelOrderRequest,
            UpdateOrderStatusRequest,
            UpdatePaymentStatusRequest,
            BulkStatusRequest,
            BulkCancelRequest,
            BulkStatusResult,
            BulkCancelResult,
            BulkFailure,
            OrderList,
            ProductList,
            CategoryList,
            CreateProductRequest,
            UpdateProductRequest,
            CreateCategoryRequest,
            InventoryAdjustRequest,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<OrderDetail>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout and order endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
