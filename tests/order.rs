mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{spawn_app, TestApp};

async fn approve_prescription(app: &TestApp, admin: &str, user_token: &str) {
    let response = app
        .client
        .post(app.url("/api/prescription"))
        .bearer_auth(user_token)
        .json(&json!({
            "images": [{ "url": "https://img.example.com/rx-1.jpg" }]
        }))
        .send()
        .await
        .expect("Failed to upload prescription");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response.json::<Value>().await.expect("Body");
    let prescription_id = body["data"]["prescriptionId"].as_i64().expect("id");

    let response = app
        .client
        .patch(app.url(&format!("/api/admin/prescription/{}/status", prescription_id)))
        .bearer_auth(admin)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .expect("Failed to review prescription");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn placing_from_empty_cart_is_rejected() {
    let app = spawn_app().await;
    let token = app.register_user("order1@example.com").await;

    let response = app.place_order(&token).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["message"], "Cart is empty");
}

#[tokio::test]
async fn amoxicillin_scenario_end_to_end() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register_user("amoxi@example.com").await;

    let drug_id = app
        .create_drug(
            &admin,
            json!({
                "name": "Amoxicillin",
                "price": 500.0,
                "quantity": 5,
                "prescription_required": true
            }),
        )
        .await;

    // Cart subtotal 3 x 500 = 1500.
    let cart = app.add_to_cart(&token, drug_id, 3).await;
    assert_eq!(cart["data"]["summary"]["subtotal"], 1500.0);
    assert_eq!(cart["data"]["summary"]["requiresPrescription"], true);

    // No prescription yet: placement rejected, stock untouched.
    let response = app.place_order(&token).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["code"], "prescription_required");
    assert_eq!(app.drug_quantity(&admin, drug_id).await, 5);

    // Approved prescription unlocks placement; stock still untouched.
    approve_prescription(&app, &admin, &token).await;
    let response = app.place_order(&token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response.json::<Value>().await.expect("Body");
    let order_id = body["data"]["orderId"].as_i64().expect("order id");
    assert_eq!(body["data"]["summary"]["totalAmount"], 1500.0);
    assert_eq!(app.drug_quantity(&admin, drug_id).await, 5);

    // The cart was cleared by checkout.
    let cart = app
        .client
        .get(app.url("/api/cart"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to fetch cart")
        .json::<Value>()
        .await
        .expect("Body");
    assert_eq!(cart["data"]["summary"]["totalItems"], 0);

    // Approval deducts stock.
    let response = app.set_order_status(&admin, order_id, "approved").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.drug_quantity(&admin, drug_id).await, 2);

    // Cancelling the approved order restores it.
    let response = app.set_order_status(&admin, order_id, "cancelled").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.drug_quantity(&admin, drug_id).await, 5);
}

#[tokio::test]
async fn retired_drugs_cannot_be_checked_out_from_stale_carts() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register_user("stale@example.com").await;

    let drug_id = app
        .create_drug(&admin, json!({ "name": "Soon Retired", "quantity": 20 }))
        .await;
    app.add_to_cart(&token, drug_id, 2).await;

    let response = app
        .client
        .patch(app.url(&format!("/api/admin/drug/{}", drug_id)))
        .bearer_auth(&admin)
        .json(&json!({ "is_active": false }))
        .send()
        .await
        .expect("Failed to patch drug");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.place_order(&token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["message"], "Soon Retired is no longer available");
}

#[tokio::test]
async fn approval_is_all_or_nothing_across_lines() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register_user("atomic@example.com").await;

    let plentiful = app
        .create_drug(&admin, json!({ "name": "Plentiful", "quantity": 50 }))
        .await;
    let scarce = app
        .create_drug(&admin, json!({ "name": "Scarce", "quantity": 5 }))
        .await;

    app.add_to_cart(&token, plentiful, 4).await;
    app.add_to_cart(&token, scarce, 5).await;
    let response = app.place_order(&token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response.json::<Value>().await.expect("Body");
    let order_id = body["data"]["orderId"].as_i64().expect("order id");

    // Drain the scarce drug behind the order's back.
    let response = app
        .client
        .patch(app.url(&format!("/api/admin/drug/{}", scarce)))
        .bearer_auth(&admin)
        .json(&json!({ "quantity": 3 }))
        .send()
        .await
        .expect("Failed to patch drug");
    assert_eq!(response.status(), StatusCode::OK);

    // Approval must fail and leave the plentiful drug's stock untouched.
    let response = app.set_order_status(&admin, order_id, "approved").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["code"], "insufficient_stock");
    assert_eq!(app.drug_quantity(&admin, plentiful).await, 50);
    assert_eq!(app.drug_quantity(&admin, scarce).await, 3);
}

#[tokio::test]
async fn competing_approvals_never_oversell() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let first = app.register_user("race1@example.com").await;
    let second = app.register_user("race2@example.com").await;

    let drug_id = app
        .create_drug(&admin, json!({ "name": "Limited Stock", "quantity": 8 }))
        .await;

    app.add_to_cart(&first, drug_id, 5).await;
    let body = app.place_order(&first).await.json::<Value>().await.expect("Body");
    let first_order = body["data"]["orderId"].as_i64().expect("order id");

    app.add_to_cart(&second, drug_id, 5).await;
    let body = app.place_order(&second).await.json::<Value>().await.expect("Body");
    let second_order = body["data"]["orderId"].as_i64().expect("order id");

    // Both orders passed the placement-time check; only one approval can win.
    let first_result = app.set_order_status(&admin, first_order, "approved").await;
    let second_result = app.set_order_status(&admin, second_order, "approved").await;

    let statuses = [first_result.status(), second_result.status()];
    assert!(statuses.contains(&StatusCode::OK));
    assert!(statuses.contains(&StatusCode::UNPROCESSABLE_ENTITY));
    assert_eq!(app.drug_quantity(&admin, drug_id).await, 3);
}

#[tokio::test]
async fn order_total_is_immutable_after_price_change() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register_user("frozen@example.com").await;

    let drug_id = app
        .create_drug(&admin, json!({ "name": "Volatile", "price": 100.0 }))
        .await;

    app.add_to_cart(&token, drug_id, 2).await;
    let body = app.place_order(&token).await.json::<Value>().await.expect("Body");
    let order_id = body["data"]["orderId"].as_i64().expect("order id");
    assert_eq!(body["data"]["summary"]["totalAmount"], 200.0);

    // Reprice the catalog entry.
    let response = app
        .client
        .patch(app.url(&format!("/api/admin/drug/{}", drug_id)))
        .bearer_auth(&admin)
        .json(&json!({ "price": 900.0 }))
        .send()
        .await
        .expect("Failed to patch drug");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .get(app.url(&format!("/api/order/{}", order_id)))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to fetch order");
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["data"]["summary"]["totalAmount"], 200.0);
    assert_eq!(body["data"]["items"][0]["price"], 100.0);
}

#[tokio::test]
async fn invalid_transitions_are_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register_user("machine@example.com").await;

    let drug_id = app
        .create_drug(&admin, json!({ "name": "State Drug" }))
        .await;
    app.add_to_cart(&token, drug_id, 1).await;
    let body = app.place_order(&token).await.json::<Value>().await.expect("Body");
    let order_id = body["data"]["orderId"].as_i64().expect("order id");

    // pending -> completed skips approval.
    let response = app.set_order_status(&admin, order_id, "completed").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Garbage status never reaches the machine.
    let response = app.set_order_status(&admin, order_id, "shipped").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // rejected is terminal.
    let response = app.set_order_status(&admin, order_id, "rejected").await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.set_order_status(&admin, order_id, "approved").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_cancellation_restocks_approved_orders() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register_user("canceller@example.com").await;

    let drug_id = app
        .create_drug(&admin, json!({ "name": "Cancellable", "quantity": 10 }))
        .await;
    app.add_to_cart(&token, drug_id, 4).await;
    let body = app.place_order(&token).await.json::<Value>().await.expect("Body");
    let order_id = body["data"]["orderId"].as_i64().expect("order id");

    let response = app.set_order_status(&admin, order_id, "approved").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.drug_quantity(&admin, drug_id).await, 6);

    let response = app
        .client
        .patch(app.url(&format!("/api/order/{}/cancel", order_id)))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to cancel order");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.drug_quantity(&admin, drug_id).await, 10);
}

#[tokio::test]
async fn completed_orders_cannot_be_cancelled_by_user() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register_user("late@example.com").await;

    let drug_id = app.create_drug(&admin, json!({ "name": "Done Deal" })).await;
    app.add_to_cart(&token, drug_id, 1).await;
    let body = app.place_order(&token).await.json::<Value>().await.expect("Body");
    let order_id = body["data"]["orderId"].as_i64().expect("order id");

    app.set_order_status(&admin, order_id, "approved").await;
    app.set_order_status(&admin, order_id, "completed").await;

    let response = app
        .client
        .patch(app.url(&format!("/api/order/{}/cancel", order_id)))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to cancel order");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn users_cannot_cancel_or_read_foreign_orders() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let owner = app.register_user("owner2@example.com").await;
    let intruder = app.register_user("intruder2@example.com").await;

    let drug_id = app.create_drug(&admin, json!({ "name": "Mine Only" })).await;
    app.add_to_cart(&owner, drug_id, 1).await;
    let body = app.place_order(&owner).await.json::<Value>().await.expect("Body");
    let order_id = body["data"]["orderId"].as_i64().expect("order id");

    let response = app
        .client
        .get(app.url(&format!("/api/order/{}", order_id)))
        .bearer_auth(&intruder)
        .send()
        .await
        .expect("Failed to fetch order");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .client
        .patch(app.url(&format!("/api/order/{}/cancel", order_id)))
        .bearer_auth(&intruder)
        .send()
        .await
        .expect("Failed to cancel order");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn own_orders_are_listed_newest_first() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register_user("lister@example.com").await;

    let drug_id = app.create_drug(&admin, json!({ "name": "Listable" })).await;
    app.add_to_cart(&token, drug_id, 1).await;
    app.place_order(&token).await;
    app.add_to_cart(&token, drug_id, 2).await;
    app.place_order(&token).await;

    let response = app
        .client
        .get(app.url("/api/order"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to list orders");
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.json::<Value>().await.expect("Body");
    let orders = body["data"]["orders"].as_array().expect("orders");
    assert_eq!(orders.len(), 2);
    assert_eq!(body["data"]["pagination"]["totalRecords"], 2);
}
