pub mod admin;
pub mod public;
pub mod user;

use axum::{middleware::from_fn, Extension, Router};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::middleware::logging::logging_middleware;
use crate::notify::Notifier;
use admin::admin_api_router;
use public::public_api_router;
use user::user_api_router;

pub fn create_api_router(shared_db: Arc<DatabaseConnection>, notifier: Notifier) -> Router {
    Router::new()
        .nest("/api", public_api_router(shared_db.clone()))
        .nest("/api", user_api_router(shared_db.clone()))
        .nest("/api/admin", admin_api_router(shared_db))
        .layer(Extension(notifier))
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Common `?page=&limit=` query parameters for list endpoints.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    /// Resolved (page, limit, offset). Pages start at 1; limit defaults to
    /// 10 and is capped at 100.
    pub fn resolve(&self) -> (u64, u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(10).clamp(1, 100);
        (page, limit, (page - 1) * limit)
    }
}

pub fn pagination_json(page: u64, limit: u64, total: u64) -> serde_json::Value {
    let total_pages = total.div_ceil(limit);
    json!({
        "currentPage": page,
        "totalPages": total_pages,
        "totalRecords": total,
        "hasNext": page < total_pages,
        "hasPrev": page > 1,
    })
}
