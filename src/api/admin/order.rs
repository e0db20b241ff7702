use axum::{
    extract::{Extension, Path, Query},
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use crate::api::user::order::{order_snapshot, restock_order_items};
use crate::api::{pagination_json, PageQuery};
use crate::entities::{
    drug::{self, Entity as DrugEntity},
    order::{self, Entity as OrderEntity, Status, StockEffect},
    order_item::{self, Entity as OrderItemEntity},
};
use crate::error::{ok_response, ApiError};
use crate::middleware::auth::Claims;
use crate::notify::{Notification, Notifier};

//ROUTERS
pub fn admin_order_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/order", get(admin_list_orders))
        .route("/order/:id", get(admin_get_order))
        .route("/order/:id/status", patch(update_order_status))
        .layer(Extension(db))
}

//ROUTES
async fn admin_list_orders(
    Query(page): Query<PageQuery>,
    Query(params): Query<AdminOrderQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (page_no, limit, offset) = page.resolve();

    let mut query = OrderEntity::find();
    if let Some(raw) = &params.status {
        let status = Status::from_str(raw).map_err(ApiError::validation)?;
        query = query.filter(order::Column::Status.eq(status));
    }
    if let Some(user_id) = params.user_id {
        query = query.filter(order::Column::UserId.eq(user_id));
    }

    let total = query.clone().count(&*db).await?;
    let orders = query
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .offset(offset)
        .limit(limit)
        .all(&*db)
        .await?;

    let summaries = orders
        .iter()
        .map(|o| {
            json!({
                "orderId": o.id,
                "orderNumber": o.order_number,
                "userId": o.user_id,
                "status": o.status.as_str(),
                "totalAmount": o.total_amount,
                "createdAt": o.created_at,
                "updatedAt": o.updated_at,
            })
        })
        .collect::<Vec<_>>();

    Ok(ok_response(
        "Orders retrieved successfully",
        json!({
            "orders": summaries,
            "pagination": pagination_json(page_no, limit, total),
        }),
    ))
}

async fn admin_get_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let found = OrderEntity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".into()))?;

    let snapshot = order_snapshot(&*db, &found).await?;
    Ok(ok_response("Order details retrieved successfully", snapshot))
}

/// Drives the order state machine. Approval deducts stock with one
/// conditional decrement per line; if any line cannot be satisfied the
/// transaction rolls back and no stock moves at all.
async fn update_order_status(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Extension(notifier): Extension<Notifier>,
    Json(payload): Json<UpdateOrderStatus>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let next = Status::from_str(&payload.status)
        .map_err(|_| ApiError::validation("Valid status is required"))?;

    let txn = db.begin().await?;

    let found = OrderEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".into()))?;

    let previous = found.status;
    if !previous.can_transition_to(next) {
        return Err(ApiError::validation(format!(
            "Cannot change order status from {} to {}",
            previous.as_str(),
            next.as_str()
        )));
    }

    match previous.stock_effect(next) {
        StockEffect::Deduct => {
            let items = OrderItemEntity::find()
                .filter(order_item::Column::OrderId.eq(found.id))
                .all(&txn)
                .await?;

            for item in &items {
                // Decrement only if enough stock remains; a concurrent
                // approval that got there first makes this a no-op and the
                // whole transition fails.
                let result = DrugEntity::update_many()
                    .col_expr(
                        drug::Column::Quantity,
                        Expr::col(drug::Column::Quantity).sub(item.quantity),
                    )
                    .filter(drug::Column::Id.eq(item.drug_id))
                    .filter(drug::Column::Quantity.gte(item.quantity))
                    .exec(&txn)
                    .await?;

                if result.rows_affected == 0 {
                    return Err(ApiError::InsufficientStock(format!(
                        "Insufficient stock for {}",
                        item.name
                    )));
                }
            }
        }
        StockEffect::Restock => {
            let items = OrderItemEntity::find()
                .filter(order_item::Column::OrderId.eq(found.id))
                .all(&txn)
                .await?;
            restock_order_items(&txn, &items).await?;
        }
        StockEffect::None => {}
    }

    let mut updated: order::ActiveModel = found.into();
    updated.status = Set(next);
    if let Some(notes) = payload.notes.clone() {
        updated.notes = Set(Some(notes));
    }
    updated.updated_at = Set(Utc::now());
    let updated = updated.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        admin = claims.user_id,
        order = updated.id,
        from = previous.as_str(),
        to = next.as_str(),
        "order status changed"
    );

    notifier.dispatch(Notification::OrderStatusChange {
        email: updated.contact_email.clone(),
        order_number: updated.order_number.clone(),
        previous: previous.as_str().to_string(),
        next: next.as_str().to_string(),
    });

    Ok(ok_response(
        "Order status updated successfully",
        json!({
            "orderId": updated.id,
            "orderNumber": updated.order_number,
            "previousStatus": previous.as_str(),
            "status": updated.status.as_str(),
            "notes": updated.notes,
            "updatedAt": updated.updated_at,
        }),
    ))
}

//Structs
#[derive(Clone, Debug, Deserialize)]
struct UpdateOrderStatus {
    status: String,
    notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct AdminOrderQuery {
    status: Option<String>,
    user_id: Option<i32>,
}
