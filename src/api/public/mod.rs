pub mod auth;
pub mod drug;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use auth::auth_router;
use drug::drug_router;

pub fn public_api_router(db: Arc<DatabaseConnection>) -> Router {
    let auth_router = auth_router(db.clone());
    let drug_router = drug_router(db.clone());

    Router::new().merge(auth_router).merge(drug_router)
}
