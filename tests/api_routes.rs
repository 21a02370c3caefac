mod common;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use common::Harness;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use storefront_api::{
    middleware::auth::{ROLE_ADMIN, ROLE_USER},
    routes::create_app,
};
use tower::ServiceExt;

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn token_for(h: &Harness, role: &str) -> String {
    let user = h.insert_user(role).await;
    h.state.auth.issue_token(&user).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let h = Harness::new();
    let app = create_app(h.state.clone());

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn cart_requires_a_bearer_token() {
    let h = Harness::new();
    let app = create_app(h.state.clone());

    let (status, body) = send(&app, Method::GET, "/api/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, Method::GET, "/api/cart", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn catalog_mutation_is_admin_only() {
    let h = Harness::new();
    let app = create_app(h.state.clone());
    let user = token_for(&h, ROLE_USER).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/products",
        Some(&user),
        Some(json!({ "name": "Mug", "price": "10.00", "stock": 5 })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn shopper_goes_from_catalog_to_order() {
    let h = Harness::new();
    let app = create_app(h.state.clone());
    let admin = token_for(&h, ROLE_ADMIN).await;
    let user = token_for(&h, ROLE_USER).await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/products",
        Some(&admin),
        Some(json!({ "name": "Mug", "description": "Ferris mug", "price": "10.00", "stock": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let product_id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, listed) = send(
        &app,
        Method::GET,
        "/api/products?q=mug&page=1&per_page=10",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["meta"]["total"], 1);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/cart/items",
        Some(&user),
        Some(json!({ "product_id": product_id, "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, cart) = send(&app, Method::GET, "/api/cart", Some(&user), None).await;
    assert_eq!(cart["data"]["summary"]["subtotal"], "20.00");
    assert_eq!(cart["data"]["summary"]["item_count"], 2);

    let (status, order) = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&user),
        Some(json!({ "shipping_address": "1 Ferris Way", "payment_method": "card" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["data"]["order"]["total_amount"], "20.00");
    assert_eq!(order["data"]["order"]["status"], "pending");
    let order_id = order["data"]["order"]["id"].as_str().unwrap().to_string();

    let (_, cart) = send(&app, Method::GET, "/api/cart", Some(&user), None).await;
    assert_eq!(cart["data"]["items"].as_array().unwrap().len(), 0);

    let (status, paid) = send(
        &app,
        Method::PATCH,
        &format!("/api/orders/{order_id}/payment-status"),
        Some(&admin),
        Some(json!({ "status": "paid" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["data"]["payment_status"], "paid");

    let (_, stats) = send(&app, Method::GET, "/api/admin/orders/stats", Some(&admin), None).await;
    assert_eq!(stats["data"]["paid_orders"], 1);
    assert_eq!(stats["data"]["total_revenue"], "20.00");
}

#[tokio::test]
async fn failed_validation_returns_violations() {
    let h = Harness::new();
    let app = create_app(h.state.clone());
    let user_token = token_for(&h, ROLE_USER).await;
    let user_id = h.state.auth.authenticate(&user_token).unwrap().user_id;
    let mug = h.product("Mug", "10.00", 5).await;
    h.state.cart.add_item(user_id, mug.id, 5).await.unwrap();
    storefront_api::store::CatalogStore::adjust_stock(h.store.as_ref(), mug.id, -4)
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&user_token),
        Some(json!({ "shipping_address": "1 Ferris Way", "payment_method": "card" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["errors"][0],
        "Insufficient stock for Mug: requested 5, available 1"
    );
}

#[tokio::test]
async fn cancelling_someone_elses_order_is_forbidden() {
    let h = Harness::new();
    let app = create_app(h.state.clone());
    let owner_token = token_for(&h, ROLE_USER).await;
    let stranger_token = token_for(&h, ROLE_USER).await;
    let owner_id = h.state.auth.authenticate(&owner_token).unwrap().user_id;
    let mug = h.product("Mug", "10.00", 5).await;
    h.state.cart.add_item(owner_id, mug.id, 1).await.unwrap();
    let order = h
        .state
        .checkout
        .checkout(owner_id, common::checkout_request())
        .await
        .unwrap();

    let uri = format!("/api/orders/{}/cancel", order.order.id);
    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&stranger_token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&owner_token),
        Some(json!({ "reason": "duplicate" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
}

#[tokio::test]
async fn unknown_routes_get_a_json_404() {
    let h = Harness::new();
    let app = create_app(h.state.clone());

    let (status, body) = send(&app, Method::GET, "/api/nope", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}
