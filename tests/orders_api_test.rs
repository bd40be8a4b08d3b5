mod common;

use axum::http::{Method, StatusCode};
use gespack_api::entities::{order, order_address, order_item, order_note, order_payment};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde_json::{json, Value};
use std::{collections::HashSet, sync::Arc};

use common::TestApp;

fn order_payload() -> Value {
    json!({
        "shipping": "4.40",
        "payment": { "payment_type_id": 2, "card_last4": "4242", "card_expiry": "12/27" },
        "items": [
            { "product_name": "Carton 40x30", "quantity": 2, "unit_price": "10.00" },
            { "product_name": "Adhesive tape", "quantity": 1, "unit_price": "5.50" }
        ],
        "addresses": [
            {
                "address_type": "shipping",
                "recipient": "Jeanne Martin",
                "street": "12 rue des Lilas",
                "postal_code": "69003",
                "city": "Lyon",
                "country": "FR"
            }
        ],
        "notes": ["  Leave at the front desk  ", "   ", ""]
    })
}

async fn create_order(app: &TestApp, payload: Value) -> common::TestResponse {
    app.request_authenticated(Method::POST, "/api/v1/orders?site_id=7", Some(payload))
        .await
}

#[tokio::test]
async fn create_order_writes_the_whole_graph() {
    let app = TestApp::new().await;

    let response = create_order(&app, order_payload()).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    assert_eq!(response.body["success"], true);

    let data = response.data();
    let header = &data["order"];
    assert_eq!(header["site_id"], 7);
    assert_eq!(header["order_reference"], "00000001");
    assert_eq!(header["order_lines"], 2);
    assert_eq!(header["subtotal"], "25.50");
    assert_eq!(header["total"], "29.90");
    assert_eq!(header["payment_type_id"], 2);
    assert_eq!(data["created_by_name"], "clerk display");

    let lines: Vec<i64> = data["items"]
        .as_array()
        .expect("items array")
        .iter()
        .map(|item| item["line_number"].as_i64().expect("line number"))
        .collect();
    assert_eq!(lines, vec![1, 2]);

    let order_id = header["order_id"].as_i64().expect("order id");
    let payment = &data["payment"];
    assert_eq!(payment["order_id"].as_i64(), Some(order_id));
    assert_eq!(payment["amount"], "29.90");
    assert_eq!(header["payment_id"], payment["payment_id"]);

    let notes = order_note::Entity::find()
        .all(&*app.state.db)
        .await
        .expect("query notes");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].note_text, "Leave at the front desk");
    assert_eq!(notes[0].order_id as i64, order_id);

    assert_eq!(app.count::<order_address::Entity>().await, 1);
    assert_eq!(app.count::<order_item::Entity>().await, 2);
}

#[tokio::test]
async fn empty_notes_write_no_rows() {
    let app = TestApp::new().await;

    let mut payload = order_payload();
    payload["notes"] = json!([]);
    let response = create_order(&app, payload).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(app.count::<order_note::Entity>().await, 0);
    assert_eq!(response.data()["notes"], json!([]));
}

#[tokio::test]
async fn references_increment_per_site() {
    let app = TestApp::new().await;

    for expected in ["00000001", "00000002", "00000003"] {
        let response = create_order(&app, order_payload()).await;
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.data()["order"]["order_reference"], expected);
    }

    let other_site = app.create_user("nantes", &[9]).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders?site_id=9",
            Some(order_payload()),
            Some(&other_site),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.data()["order"]["order_reference"], "00000001");
}

#[tokio::test]
async fn unparseable_latest_reference_restarts_at_one() {
    let app = TestApp::new().await;

    let mut payload = order_payload();
    payload["order_reference"] = json!("WEB-42");
    let response = create_order(&app, payload).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.data()["order"]["order_reference"], "WEB-42");

    let response = create_order(&app, order_payload()).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.data()["order"]["order_reference"], "00000001");
}

#[tokio::test]
async fn persistent_reference_collision_is_a_conflict() {
    let app = TestApp::new().await;

    let mut first = order_payload();
    first["order_reference"] = json!("00000002");
    assert_eq!(create_order(&app, first).await.status, StatusCode::CREATED);

    let mut second = order_payload();
    second["order_reference"] = json!("00000001");
    assert_eq!(create_order(&app, second).await.status, StatusCode::CREATED);

    // The latest order holds 00000001, so every attempt computes 00000002.
    let response = create_order(&app, order_payload()).await;
    assert_eq!(response.status, StatusCode::CONFLICT, "{}", response.body);
    assert_eq!(response.body["success"], false);

    assert_eq!(app.count::<order::Entity>().await, 2);
    assert_eq!(app.count::<order_payment::Entity>().await, 2);
    assert_eq!(app.count::<order_item::Entity>().await, 4);
}

#[tokio::test]
async fn invalid_nested_payloads_are_rejected() {
    let app = TestApp::new().await;

    let mut payload = order_payload();
    payload["items"][0]["quantity"] = json!(0);
    let response = create_order(&app, payload).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let mut payload = order_payload();
    payload["addresses"][0]["address_type"] = json!("warehouse");
    let response = create_order(&app, payload).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let mut payload = order_payload();
    payload["customer_id"] = json!(9999);
    let response = create_order(&app, payload).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    assert_eq!(app.count::<order::Entity>().await, 0);
}

#[tokio::test]
async fn creation_needs_exactly_one_site() {
    let app = TestApp::new().await;
    let both = app.create_user("regional", &[7, 9]).await;

    let response = app
        .request(Method::POST, "/api/v1/orders", Some(order_payload()), Some(&both))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders?site_ids=9",
            Some(order_payload()),
            Some(&both),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn list_search_update_and_notes() {
    let app = TestApp::new().await;

    let customer = app
        .request_authenticated(
            Method::POST,
            "/api/v1/customers?site_id=7",
            Some(json!({ "first_name": "Jeanne", "last_name": "Martin" })),
        )
        .await;
    assert_eq!(customer.status, StatusCode::CREATED);
    let customer_id = customer.data()["customer_id"].clone();

    let mut payload = order_payload();
    payload["customer_id"] = customer_id;
    let created = create_order(&app, payload).await;
    let order_id = created.data()["order"]["order_id"].as_i64().expect("order id");
    create_order(&app, order_payload()).await;

    let list = app
        .request_authenticated(Method::GET, "/api/v1/orders?per_page=10", None)
        .await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.data()["total"], 2);
    assert_eq!(list.data()["orders"][0]["order_reference"], "00000002");

    let found = app
        .request_authenticated(Method::GET, "/api/v1/orders/search?q=Mart", None)
        .await;
    assert_eq!(found.status, StatusCode::OK);
    let hits = found.data().as_array().expect("search results");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["order_id"].as_i64(), Some(order_id));

    let blank = app
        .request_authenticated(Method::GET, "/api/v1/orders/search?q=%20", None)
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let updated = app
        .request_authenticated(
            Method::PATCH,
            &format!("/api/v1/orders/{order_id}"),
            Some(json!({ "shipping": "0.50", "is_paid": true })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.body);
    assert_eq!(updated.data()["total"], "26.00");
    assert_eq!(updated.data()["is_paid"], true);

    let note = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/notes"),
            Some(json!({ "note_text": "Customer called back" })),
        )
        .await;
    assert_eq!(note.status, StatusCode::CREATED);

    let blank_note = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/notes"),
            Some(json!({ "note_text": "   " })),
        )
        .await;
    assert_eq!(blank_note.status, StatusCode::BAD_REQUEST);

    let notes = order_note::Entity::find()
        .filter(order_note::Column::OrderId.eq(order_id as i32))
        .order_by_asc(order_note::Column::NoteId)
        .all(&*app.state.db)
        .await
        .expect("query notes");
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[1].note_text, "Customer called back");
}

#[tokio::test]
async fn delete_removes_children() {
    let app = TestApp::new().await;

    let created = create_order(&app, order_payload()).await;
    let order_id = created.data()["order"]["order_id"].as_i64().expect("order id");

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    assert_eq!(app.count::<order::Entity>().await, 0);
    assert_eq!(app.count::<order_payment::Entity>().await, 0);
    assert_eq!(app.count::<order_item::Entity>().await, 0);
    assert_eq!(app.count::<order_address::Entity>().await, 0);
    assert_eq!(app.count::<order_note::Entity>().await, 0);

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn orders_of_other_sites_are_invisible() {
    let app = TestApp::new().await;
    let nantes = app.create_user("nantes", &[9]).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders?site_id=9",
            Some(order_payload()),
            Some(&nantes),
        )
        .await;
    let order_id = response.data()["order"]["order_id"].as_i64().expect("order id");

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/orders?site_id=9", None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creations_never_share_a_reference() {
    let app = Arc::new(TestApp::with_pool_size(4).await);

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { create_order(&app, order_payload()).await })
        })
        .collect();

    let mut references = Vec::new();
    for handle in handles {
        let response = handle.await.expect("request task panicked");
        match response.status {
            StatusCode::CREATED => references.push(
                response.data()["order"]["order_reference"]
                    .as_str()
                    .expect("reference")
                    .to_string(),
            ),
            StatusCode::CONFLICT => assert_eq!(response.body["success"], false),
            other => panic!("unexpected status {other}: {}", response.body),
        }
    }

    assert!(!references.is_empty());
    let distinct: HashSet<&String> = references.iter().collect();
    assert_eq!(distinct.len(), references.len());

    let orders = order::Entity::find()
        .all(&*app.state.db)
        .await
        .expect("query orders");
    assert_eq!(orders.len(), references.len());
    assert_eq!(
        app.count::<order_payment::Entity>().await,
        references.len() as u64
    );

    for created in orders {
        let payment_id = created.payment_id.expect("payment linked");
        let payment = order_payment::Entity::find_by_id(payment_id)
            .one(&*app.state.db)
            .await
            .expect("query payment")
            .expect("payment exists");
        assert_eq!(payment.order_id, created.order_id);
    }
}
