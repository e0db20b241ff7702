use axum::{extract::Extension, routing::get, Json, Router};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QuerySelect,
};
use serde_json::json;
use std::sync::Arc;

use crate::entities::{
    drug::{self, Entity as DrugEntity, LOW_STOCK_THRESHOLD},
    order::{self, Entity as OrderEntity, Status},
    user::{self, Entity as UserEntity},
};
use crate::error::{ok_response, ApiError};

//ROUTERS
pub fn admin_dashboard_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/dashboard", get(get_admin_dashboard))
        .layer(Extension(db))
}

#[derive(Debug, FromQueryResult)]
struct RevenueRow {
    total: Option<f64>,
}

async fn count_orders_with(
    db: &DatabaseConnection,
    status: Status,
) -> Result<u64, ApiError> {
    Ok(OrderEntity::find()
        .filter(order::Column::Status.eq(status))
        .count(db)
        .await?)
}

//ROUTES
async fn get_admin_dashboard(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let now = Utc::now();
    let today_start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);

    let total_users = UserEntity::find().count(&*db).await?;
    let active_users = UserEntity::find()
        .filter(user::Column::IsActive.eq(true))
        .count(&*db)
        .await?;
    let new_users_today = UserEntity::find()
        .filter(user::Column::CreatedAt.gte(today_start))
        .count(&*db)
        .await?;

    let total_orders = OrderEntity::find().count(&*db).await?;
    let pending_orders = count_orders_with(&db, Status::Pending).await?;
    let approved_orders = count_orders_with(&db, Status::Approved).await?;
    let completed_orders = count_orders_with(&db, Status::Completed).await?;
    let rejected_orders = count_orders_with(&db, Status::Rejected).await?;
    let cancelled_orders = count_orders_with(&db, Status::Cancelled).await?;

    // Revenue counts completed orders only.
    let revenue = OrderEntity::find()
        .select_only()
        .column_as(order::Column::TotalAmount.sum(), "total")
        .filter(order::Column::Status.eq(Status::Completed))
        .into_model::<RevenueRow>()
        .one(&*db)
        .await?
        .and_then(|row| row.total)
        .unwrap_or(0.0);

    let total_drugs = DrugEntity::find().count(&*db).await?;
    let low_stock_drugs = DrugEntity::find()
        .filter(drug::Column::Quantity.lte(LOW_STOCK_THRESHOLD))
        .filter(drug::Column::Quantity.gt(0))
        .count(&*db)
        .await?;
    let out_of_stock_drugs = DrugEntity::find()
        .filter(drug::Column::Quantity.eq(0))
        .count(&*db)
        .await?;
    let prescription_drugs = DrugEntity::find()
        .filter(drug::Column::PrescriptionRequired.eq(true))
        .count(&*db)
        .await?;
    let otc_drugs = DrugEntity::find()
        .filter(drug::Column::PrescriptionRequired.eq(false))
        .count(&*db)
        .await?;

    Ok(ok_response(
        "Admin dashboard stats retrieved",
        json!({
            "role": "admin",
            "stats": {
                "users": {
                    "total": total_users,
                    "active": active_users,
                    "newToday": new_users_today,
                },
                "orders": {
                    "total": total_orders,
                    "pending": pending_orders,
                    "approved": approved_orders,
                    "completed": completed_orders,
                    "rejected": rejected_orders,
                    "cancelled": cancelled_orders,
                },
                "inventory": {
                    "totalDrugs": total_drugs,
                    "lowStock": low_stock_drugs,
                    "outOfStock": out_of_stock_drugs,
                    "prescriptionDrugs": prescription_drugs,
                    "nonPrescriptionDrugs": otc_drugs,
                },
                "revenue": {
                    "total": revenue,
                },
            },
        }),
    ))
}
