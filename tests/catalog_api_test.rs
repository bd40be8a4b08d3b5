mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn customer_lifecycle() {
    let app = TestApp::new().await;

    for (first, last) in [("Paul", "Renard"), ("Alice", "Bernard")] {
        let response = app
            .request_authenticated(
                Method::POST,
                "/api/v1/customers?site_id=7",
                Some(json!({ "first_name": first, "last_name": last, "city": "Lyon" })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        assert_eq!(response.data()["site_id"], 7);
    }

    let list = app
        .request_authenticated(Method::GET, "/api/v1/customers", None)
        .await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.data()["total"], 2);
    assert_eq!(list.data()["customers"][0]["last_name"], "Bernard");

    let customer_id = list.data()["customers"][1]["customer_id"]
        .as_i64()
        .expect("customer id");

    let updated = app
        .request_authenticated(
            Method::PATCH,
            &format!("/api/v1/customers/{customer_id}"),
            Some(json!({ "email": "paul.renard@example.com" })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.data()["email"], "paul.renard@example.com");
    assert_eq!(updated.data()["first_name"], "Paul");

    let invalid = app
        .request_authenticated(
            Method::PATCH,
            &format!("/api/v1/customers/{customer_id}"),
            Some(json!({ "email": "not-an-email" })),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let order = app
        .request_authenticated(
            Method::POST,
            "/api/v1/orders?site_id=7",
            Some(json!({
                "customer_id": customer_id,
                "payment": { "payment_type_id": 1 },
                "items": [{ "product_name": "Box", "quantity": 1, "unit_price": "3.00" }]
            })),
        )
        .await;
    assert_eq!(order.status, StatusCode::CREATED, "{}", order.body);

    let blocked = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/customers/{customer_id}"), None)
        .await;
    assert_eq!(blocked.status, StatusCode::CONFLICT);

    let other_id = list.data()["customers"][0]["customer_id"]
        .as_i64()
        .expect("customer id");
    let deleted = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/customers/{other_id}"), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let missing = app
        .request_authenticated(Method::GET, &format!("/api/v1/customers/{other_id}"), None)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_catalogue_and_stock() {
    let app = TestApp::new().await;

    let created = app
        .request_authenticated(
            Method::POST,
            "/api/v1/products?site_id=7",
            Some(json!({ "sku": "CRT-4030", "name": "Carton 40x30", "unit_price": "1.25", "stock_quantity": 3 })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    assert_eq!(created.data()["unit_price"], "1.25");
    assert_eq!(created.data()["out_of_stock"], false);
    let product_id = created.data()["product_id"].as_i64().expect("product id");

    let duplicate = app
        .request_authenticated(
            Method::POST,
            "/api/v1/products?site_id=7",
            Some(json!({ "sku": "CRT-4030", "name": "Other", "unit_price": "2.00" })),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let negative = app
        .request_authenticated(
            Method::POST,
            "/api/v1/products?site_id=7",
            Some(json!({ "sku": "NEG-1", "name": "Negative", "unit_price": "-1.00" })),
        )
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);

    let adjusted = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/products/{product_id}/stock"),
            Some(json!({ "delta": -3 })),
        )
        .await;
    assert_eq!(adjusted.status, StatusCode::OK);
    assert_eq!(adjusted.data()["stock_quantity"], 0);
    assert_eq!(adjusted.data()["out_of_stock"], true);

    let filtered = app
        .request_authenticated(Method::GET, "/api/v1/products?out_of_stock=true", None)
        .await;
    assert_eq!(filtered.status, StatusCode::OK);
    assert_eq!(filtered.data()["total"], 1);

    let searched = app
        .request_authenticated(Method::GET, "/api/v1/products?search=CRT", None)
        .await;
    assert_eq!(searched.data()["products"][0]["sku"], "CRT-4030");

    let deleted = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/products/{product_id}"), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
}

#[tokio::test]
async fn dashboard_kpis_ignore_annulled_orders() {
    let app = TestApp::new().await;

    app.request_authenticated(
        Method::POST,
        "/api/v1/products?site_id=7",
        Some(json!({ "sku": "EMPTY", "name": "Sold out", "unit_price": "4.00" })),
    )
    .await;
    app.request_authenticated(
        Method::POST,
        "/api/v1/customers?site_id=7",
        Some(json!({ "first_name": "Louis", "last_name": "Petit" })),
    )
    .await;

    let mut ids = Vec::new();
    for (total, paid) in [("10.00", true), ("15.50", false), ("99.00", false)] {
        let response = app
            .request_authenticated(
                Method::POST,
                "/api/v1/orders?site_id=7",
                Some(json!({
                    "total": total,
                    "is_paid": paid,
                    "payment": { "payment_type_id": 1 },
                    "items": [{ "product_name": "Box", "quantity": 1, "unit_price": total }]
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        ids.push(response.data()["order"]["order_id"].as_i64().expect("order id"));
    }

    let annulled = app
        .request_authenticated(
            Method::PATCH,
            &format!("/api/v1/orders/{}", ids[2]),
            Some(json!({ "is_annulled": true })),
        )
        .await;
    assert_eq!(annulled.status, StatusCode::OK);

    let kpis = app
        .request_authenticated(Method::GET, "/api/v1/dashboard/kpis", None)
        .await;
    assert_eq!(kpis.status, StatusCode::OK);
    let data = kpis.data();
    assert_eq!(data["total_orders"], 2);
    assert_eq!(data["unpaid_orders"], 1);
    assert_eq!(data["pending_invoicing"], 2);
    assert_eq!(data["revenue"], "25.50");
    assert_eq!(data["out_of_stock_products"], 1);
    assert_eq!(data["customers"], 1);
}
