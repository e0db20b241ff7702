use chrono::{Duration, Utc};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::{json, Value};
use std::sync::Arc;

use rust_apteka::api::create_api_router;
use rust_apteka::entities::{primary_setup, setup_schema};
use rust_apteka::notify::Notifier;

pub struct TestApp {
    pub base_url: String,
    pub db: Arc<DatabaseConnection>,
    pub client: reqwest::Client,
}

/// Boots the full router over an in-memory SQLite database on an ephemeral
/// port. Seeds the default admin (admin@apteka.local / Secret15).
pub async fn spawn_app() -> TestApp {
    std::env::set_var("SECRET", "integration-test-secret");

    // A single pooled connection keeps every query on the same in-memory db.
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opts)
        .await
        .expect("Failed to open in-memory database");

    setup_schema(&db).await.expect("Failed to create schema");

    let shared_db = Arc::new(db);
    primary_setup(shared_db.clone())
        .await
        .expect("Failed to seed admin");

    let app = create_api_router(shared_db.clone(), Notifier::new());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    TestApp {
        base_url: format!("http://{}", addr),
        db: shared_db,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn admin_token(&self) -> String {
        self.login("admin@apteka.local", "Secret15").await
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to send login request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body = response.json::<Value>().await.expect("Login body");
        body["data"]["token"]
            .as_str()
            .expect("Token missing from login response")
            .to_string()
    }

    /// Registers a fresh customer account and returns its bearer token.
    pub async fn register_user(&self, email: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/register"))
            .json(&json!({
                "email": email,
                "password": "Secret15pass",
                "first_name": "Test",
                "last_name": "Customer",
                "phone": "+2348012345678",
                "address": "12 Marina Road, Lagos"
            }))
            .send()
            .await
            .expect("Failed to send register request");
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);

        let body = response.json::<Value>().await.expect("Register body");
        body["data"]["token"]
            .as_str()
            .expect("Token missing from register response")
            .to_string()
    }

    /// Creates a drug through the admin API and returns its id.
    pub async fn create_drug(&self, admin_token: &str, overrides: Value) -> i64 {
        let mut payload = json!({
            "name": "Paracetamol",
            "description": "Analgesic and antipyretic",
            "category": "analgesics",
            "price": 150.0,
            "quantity": 50,
            "dosage": "500mg",
            "manufacturer": "Emzor",
            "prescription_required": false,
            "expiry_date": (Utc::now() + Duration::days(365)).to_rfc3339(),
        });
        if let (Some(base), Some(extra)) = (payload.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }

        let response = self
            .client
            .post(self.url("/api/admin/drug"))
            .bearer_auth(admin_token)
            .json(&payload)
            .send()
            .await
            .expect("Failed to send create drug request");
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);

        let body = response.json::<Value>().await.expect("Create drug body");
        body["data"]["drug"]["id"].as_i64().expect("Drug id")
    }

    /// Current stock level of a drug, read back through the admin API.
    pub async fn drug_quantity(&self, admin_token: &str, drug_id: i64) -> i64 {
        let response = self
            .client
            .get(self.url(&format!("/api/admin/drug/{}", drug_id)))
            .bearer_auth(admin_token)
            .send()
            .await
            .expect("Failed to fetch drug");
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body = response.json::<Value>().await.expect("Drug body");
        body["data"]["drug"]["quantity"].as_i64().expect("Quantity")
    }

    pub async fn add_to_cart(&self, token: &str, drug_id: i64, quantity: i64) -> Value {
        let response = self
            .client
            .post(self.url("/api/cart"))
            .bearer_auth(token)
            .json(&json!({ "drug_id": drug_id, "quantity": quantity }))
            .send()
            .await
            .expect("Failed to send add to cart request");
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        response.json::<Value>().await.expect("Cart body")
    }

    /// Places an order for whatever the user's cart holds.
    pub async fn place_order(&self, token: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/order"))
            .bearer_auth(token)
            .json(&json!({ "payment_method": "card" }))
            .send()
            .await
            .expect("Failed to send place order request")
    }

    pub async fn set_order_status(
        &self,
        admin_token: &str,
        order_id: i64,
        status: &str,
    ) -> reqwest::Response {
        self.client
            .patch(self.url(&format!("/api/admin/order/{}/status", order_id)))
            .bearer_auth(admin_token)
            .json(&json!({ "status": status }))
            .send()
            .await
            .expect("Failed to send status update request")
    }
}
