pub mod dashboard;
pub mod drug;
pub mod order;
pub mod prescription;

use axum::{middleware::from_fn_with_state, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::entities::user::Role;
use crate::middleware::auth::{auth_middleware, AuthState};
use dashboard::admin_dashboard_router;
use drug::admin_drug_router;
use order::admin_order_router;
use prescription::admin_prescription_router;

pub fn admin_api_router(db: Arc<DatabaseConnection>) -> Router {
    let admin_drug_router = admin_drug_router(db.clone());
    let admin_order_router = admin_order_router(db.clone());
    let admin_prescription_router = admin_prescription_router(db.clone());
    let admin_dashboard_router = admin_dashboard_router(db.clone());

    Router::new()
        .merge(admin_drug_router)
        .merge(admin_order_router)
        .merge(admin_prescription_router)
        .merge(admin_dashboard_router)
        .layer(from_fn_with_state(
            AuthState {
                db: db.clone(),
                role: Role::Admin,
            },
            auth_middleware,
        ))
}
