use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use rust_apteka::api::create_api_router;
use rust_apteka::entities::{primary_setup, setup_schema};
use rust_apteka::notify::Notifier;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db: DatabaseConnection = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    setup_schema(&db).await.expect("Failed to create schema");

    let shared_db = Arc::new(db);
    primary_setup(shared_db.clone())
        .await
        .expect("Failed to seed database");

    let app = create_api_router(shared_db, Notifier::new());

    let addr = std::env::var("APTEKA_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!(addr = %addr, "rust-apteka listening");
    axum::serve(listener, app).await.expect("Server failed");
}
