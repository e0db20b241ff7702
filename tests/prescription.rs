mod common;

use chrono::{Duration, Utc};
use reqwest::StatusCode;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};

use common::spawn_app;
use rust_apteka::entities::prescription;

#[tokio::test]
async fn upload_without_images_is_rejected() {
    let app = spawn_app().await;
    let token = app.register_user("rx1@example.com").await;

    let response = app
        .client
        .post(app.url("/api/prescription"))
        .bearer_auth(&token)
        .json(&json!({ "images": [] }))
        .send()
        .await
        .expect("Failed to upload prescription");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["message"], "No prescription images uploaded");
}

#[tokio::test]
async fn upload_starts_pending_with_thirty_day_expiry() {
    let app = spawn_app().await;
    let token = app.register_user("rx2@example.com").await;

    let response = app
        .client
        .post(app.url("/api/prescription"))
        .bearer_auth(&token)
        .json(&json!({
            "images": [
                { "url": "https://img.example.com/rx-front.jpg" },
                { "url": "https://img.example.com/rx-back.jpg", "caption": "Back page" }
            ],
            "notes": "Two repeats"
        }))
        .send()
        .await
        .expect("Failed to upload prescription");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["canBeUsed"], false);
    assert_eq!(body["data"]["images"].as_array().expect("images").len(), 2);

    let expires_at = body["data"]["expiresAt"].as_str().expect("expiresAt");
    let expires_at = chrono::DateTime::parse_from_rfc3339(expires_at).expect("rfc3339");
    let days = (expires_at.with_timezone(&Utc) - Utc::now()).num_days();
    assert!((29..=30).contains(&days), "expiry {} days out", days);
}

#[tokio::test]
async fn rejection_requires_a_reason() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register_user("rx3@example.com").await;

    let body = app
        .client
        .post(app.url("/api/prescription"))
        .bearer_auth(&token)
        .json(&json!({ "images": [{ "url": "https://img.example.com/rx.jpg" }] }))
        .send()
        .await
        .expect("Failed to upload prescription")
        .json::<Value>()
        .await
        .expect("Body");
    let prescription_id = body["data"]["prescriptionId"].as_i64().expect("id");

    let response = app
        .client
        .patch(app.url(&format!("/api/admin/prescription/{}/status", prescription_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "rejected" }))
        .send()
        .await
        .expect("Failed to review");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .patch(app.url(&format!("/api/admin/prescription/{}/status", prescription_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "rejected", "rejection_reason": "Illegible scan" }))
        .send()
        .await
        .expect("Failed to review");
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["rejectionReason"], "Illegible scan");
    assert_eq!(body["data"]["canBeUsed"], false);
}

#[tokio::test]
async fn review_is_final() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register_user("rx4@example.com").await;

    let body = app
        .client
        .post(app.url("/api/prescription"))
        .bearer_auth(&token)
        .json(&json!({ "images": [{ "url": "https://img.example.com/rx.jpg" }] }))
        .send()
        .await
        .expect("Failed to upload prescription")
        .json::<Value>()
        .await
        .expect("Body");
    let prescription_id = body["data"]["prescriptionId"].as_i64().expect("id");

    let response = app
        .client
        .patch(app.url(&format!("/api/admin/prescription/{}/status", prescription_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .expect("Failed to review");
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["data"]["canBeUsed"], true);

    let response = app
        .client
        .patch(app.url(&format!("/api/admin/prescription/{}/status", prescription_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "rejected", "rejection_reason": "Changed my mind" }))
        .send()
        .await
        .expect("Failed to re-review");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["message"], "Prescription has already been reviewed");
}

#[tokio::test]
async fn check_endpoint_reports_validity() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register_user("rx5@example.com").await;

    let response = app
        .client
        .get(app.url("/api/prescription/check"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to check");
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["data"]["hasValidPrescription"], false);

    let body = app
        .client
        .post(app.url("/api/prescription"))
        .bearer_auth(&token)
        .json(&json!({ "images": [{ "url": "https://img.example.com/rx.jpg" }] }))
        .send()
        .await
        .expect("Failed to upload prescription")
        .json::<Value>()
        .await
        .expect("Body");
    let prescription_id = body["data"]["prescriptionId"].as_i64().expect("id");

    app.client
        .patch(app.url(&format!("/api/admin/prescription/{}/status", prescription_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .expect("Failed to review");

    let response = app
        .client
        .get(app.url("/api/prescription/check"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to check");
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["data"]["hasValidPrescription"], true);
    let days = body["data"]["prescription"]["daysUntilExpiry"]
        .as_i64()
        .expect("days");
    assert!((29..=30).contains(&days));
}

#[tokio::test]
async fn expired_approval_does_not_unlock_orders() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register_user("rx6@example.com").await;

    // Approved long ago; the 30-day window has passed.
    let created = Utc::now() - Duration::days(45);
    let stale = prescription::ActiveModel {
        user_id: Set(2),
        status: Set(prescription::Status::Approved),
        notes: Set(None),
        rejection_reason: Set(None),
        reviewed_by: Set(Some(1)),
        reviewed_at: Set(Some(created + Duration::days(1))),
        expires_at: Set(prescription::default_expiry(created)),
        created_at: Set(created),
        ..Default::default()
    };
    stale.insert(&*app.db).await.expect("Failed to seed prescription");

    let response = app
        .client
        .get(app.url("/api/prescription/check"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to check");
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["data"]["hasValidPrescription"], false);

    let drug_id = app
        .create_drug(
            &admin,
            json!({ "name": "Gated Drug", "prescription_required": true }),
        )
        .await;
    app.add_to_cart(&token, drug_id, 1).await;

    let response = app.place_order(&token).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json::<Value>().await.expect("Body");
    assert_eq!(body["code"], "prescription_required");
}

#[tokio::test]
async fn own_prescriptions_list_filters_by_status() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.register_user("rx7@example.com").await;

    for _ in 0..2 {
        let response = app
            .client
            .post(app.url("/api/prescription"))
            .bearer_auth(&token)
            .json(&json!({ "images": [{ "url": "https://img.example.com/rx.jpg" }] }))
            .send()
            .await
            .expect("Failed to upload prescription");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let body = app
        .client
        .get(app.url("/api/prescription"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to list prescriptions")
        .json::<Value>()
        .await
        .expect("Body");
    let first_id = body["data"][0]["prescriptionId"].as_i64().expect("id");
    assert_eq!(body["data"].as_array().expect("records").len(), 2);

    app.client
        .patch(app.url(&format!("/api/admin/prescription/{}/status", first_id)))
        .bearer_auth(&admin)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .expect("Failed to review");

    let body = app
        .client
        .get(app.url("/api/prescription?status=pending"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to list prescriptions")
        .json::<Value>()
        .await
        .expect("Body");
    let records = body["data"].as_array().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "pending");
}

#[tokio::test]
async fn prescription_images_belong_to_their_owner() {
    let app = spawn_app().await;
    let owner = app.register_user("rxowner@example.com").await;
    let intruder = app.register_user("rxintruder@example.com").await;

    let body = app
        .client
        .post(app.url("/api/prescription"))
        .bearer_auth(&owner)
        .json(&json!({ "images": [{ "url": "https://img.example.com/rx.jpg" }] }))
        .send()
        .await
        .expect("Failed to upload prescription")
        .json::<Value>()
        .await
        .expect("Body");
    let prescription_id = body["data"]["prescriptionId"].as_i64().expect("id");
    let image_id = body["data"]["images"][0]["id"].as_i64().expect("image id");

    let response = app
        .client
        .delete(app.url(&format!(
            "/api/prescription/{}/image/{}",
            prescription_id, image_id
        )))
        .bearer_auth(&intruder)
        .send()
        .await
        .expect("Failed to delete image");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .client
        .delete(app.url(&format!(
            "/api/prescription/{}/image/{}",
            prescription_id, image_id
        )))
        .bearer_auth(&owner)
        .send()
        .await
        .expect("Failed to delete image");
    assert_eq!(response.status(), StatusCode::OK);
}
