use axum::{
    extract::{Extension, Path, Query},
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use crate::api::{pagination_json, PageQuery};
use crate::entities::{
    prescription::{self, Entity as PrescriptionEntity, Status},
    prescription_image::{self, Entity as PrescriptionImageEntity},
    user::Entity as UserEntity,
};
use crate::error::{ok_response, ApiError};
use crate::middleware::auth::Claims;
use crate::notify::{Notification, Notifier};

//ROUTERS
pub fn admin_prescription_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/prescription", get(admin_list_prescriptions))
        .route("/prescription/:id/status", patch(update_prescription_status))
        .layer(Extension(db))
}

//ROUTES
async fn admin_list_prescriptions(
    Query(page): Query<PageQuery>,
    Query(params): Query<AdminPrescriptionQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (page_no, limit, offset) = page.resolve();

    let mut query = PrescriptionEntity::find();
    if let Some(raw) = &params.status {
        let status = Status::from_str(raw).map_err(ApiError::validation)?;
        query = query.filter(prescription::Column::Status.eq(status));
    }
    if let Some(user_id) = params.user_id {
        query = query.filter(prescription::Column::UserId.eq(user_id));
    }

    let total = query.clone().count(&*db).await?;
    let records = query
        .order_by_desc(prescription::Column::CreatedAt)
        .offset(offset)
        .limit(limit)
        .all(&*db)
        .await?;

    let now = Utc::now();
    let mut body = Vec::with_capacity(records.len());
    for record in &records {
        let images = PrescriptionImageEntity::find()
            .filter(prescription_image::Column::PrescriptionId.eq(record.id))
            .all(&*db)
            .await?;
        body.push(json!({
            "prescriptionId": record.id,
            "userId": record.user_id,
            "status": record.status.as_str(),
            "images": images,
            "imagesCount": images.len(),
            "rejectionReason": record.rejection_reason,
            "notes": record.notes,
            "reviewedBy": record.reviewed_by,
            "reviewedAt": record.reviewed_at,
            "expiresAt": record.expires_at,
            "isExpired": record.is_expired(now),
            "createdAt": record.created_at,
        }));
    }

    Ok(ok_response(
        "Prescriptions retrieved successfully",
        json!({
            "prescriptions": body,
            "pagination": pagination_json(page_no, limit, total),
        }),
    ))
}

async fn update_prescription_status(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Extension(notifier): Extension<Notifier>,
    Json(payload): Json<UpdatePrescriptionStatus>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let next = Status::from_str(&payload.status)
        .map_err(|_| ApiError::validation("Valid status is required"))?;

    // Review decides; it never re-pends.
    if !matches!(next, Status::Approved | Status::Rejected) {
        return Err(ApiError::validation(
            "Status must be 'approved' or 'rejected'",
        ));
    }

    if next == Status::Rejected && payload.rejection_reason.is_none() {
        return Err(ApiError::validation(
            "Rejection reason is required when rejecting a prescription",
        ));
    }

    let txn = db.begin().await?;

    let record = PrescriptionEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Prescription not found".into()))?;

    if record.status != Status::Pending {
        return Err(ApiError::validation(
            "Prescription has already been reviewed",
        ));
    }

    let owner = UserEntity::find_by_id(record.user_id).one(&txn).await?;

    let now = Utc::now();
    let mut reviewed: prescription::ActiveModel = record.into();
    reviewed.status = Set(next);
    reviewed.reviewed_by = Set(Some(claims.user_id));
    reviewed.reviewed_at = Set(Some(now));
    if let Some(reason) = payload.rejection_reason.clone() {
        reviewed.rejection_reason = Set(Some(reason));
    }
    if let Some(notes) = payload.notes.clone() {
        reviewed.notes = Set(Some(notes));
    }
    let reviewed = reviewed.update(&txn).await?;

    txn.commit().await?;

    if let Some(owner) = owner {
        notifier.dispatch(Notification::PrescriptionReviewed {
            email: owner.email,
            status: next.as_str().to_string(),
        });
    }

    Ok(ok_response(
        "Prescription status updated successfully",
        json!({
            "prescriptionId": reviewed.id,
            "status": reviewed.status.as_str(),
            "reviewedBy": claims.user_id,
            "reviewedAt": reviewed.reviewed_at,
            "rejectionReason": reviewed.rejection_reason,
            "notes": reviewed.notes,
            "expiresAt": reviewed.expires_at,
            "canBeUsed": reviewed.can_be_used_for_order(Utc::now()),
        }),
    ))
}

//Structs
#[derive(Clone, Debug, Deserialize)]
struct UpdatePrescriptionStatus {
    status: String,
    rejection_reason: Option<String>,
    notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct AdminPrescriptionQuery {
    status: Option<String>,
    user_id: Option<i32>,
}
