use axum::{extract::Extension, routing::get, Json, Router};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use std::sync::Arc;

use crate::entities::{
    cart_item::{self, Entity as CartItemEntity},
    order::{self, Entity as OrderEntity, Status},
};
use crate::error::{ok_response, ApiError};
use crate::middleware::auth::Claims;

//ROUTERS
pub fn user_dashboard_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/dashboard", get(get_user_dashboard))
        .layer(Extension(db))
}

async fn count_orders(
    db: &DatabaseConnection,
    user_id: i32,
    status: Option<Status>,
) -> Result<u64, ApiError> {
    let mut query = OrderEntity::find().filter(order::Column::UserId.eq(user_id));
    if let Some(status) = status {
        query = query.filter(order::Column::Status.eq(status));
    }
    Ok(query.count(db).await?)
}

//ROUTES
async fn get_user_dashboard(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = claims.user_id;

    let total = count_orders(&db, user_id, None).await?;
    let pending = count_orders(&db, user_id, Some(Status::Pending)).await?;
    let approved = count_orders(&db, user_id, Some(Status::Approved)).await?;
    let completed = count_orders(&db, user_id, Some(Status::Completed)).await?;
    let rejected = count_orders(&db, user_id, Some(Status::Rejected)).await?;
    let cancelled = count_orders(&db, user_id, Some(Status::Cancelled)).await?;

    let lines = CartItemEntity::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .all(&*db)
        .await?;
    let cart_total: f32 = lines.iter().map(|line| line.line_total()).sum();

    Ok(ok_response(
        "User dashboard stats retrieved",
        json!({
            "role": "user",
            "stats": {
                "orders": {
                    "total": total,
                    "pending": pending,
                    "approved": approved,
                    "completed": completed,
                    "rejected": rejected,
                    "cancelled": cancelled,
                },
                "cart": {
                    "items": lines.len(),
                    "total": cart_total,
                },
            },
        }),
    ))
}
