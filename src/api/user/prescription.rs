use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use validator::Validate;

use crate::entities::prescription::{
    self, default_expiry, Entity as PrescriptionEntity, Status,
};
use crate::entities::prescription_image::{self, Entity as PrescriptionImageEntity};
use crate::error::{ok_response, ApiError};
use crate::middleware::auth::Claims;

//ROUTERS
pub fn prescription_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route(
            "/prescription",
            post(upload_prescription).get(get_user_prescriptions),
        )
        .route("/prescription/check", get(check_valid_prescription))
        .route(
            "/prescription/:id/image/:image_id",
            delete(delete_prescription_image),
        )
        .layer(Extension(db))
}

/// Latest-expiring approved, unexpired prescription for the user, if any.
/// This is the single lookup order placement trusts.
pub async fn find_valid_prescription<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Option<prescription::Model>, ApiError> {
    let found = PrescriptionEntity::find()
        .filter(prescription::Column::UserId.eq(user_id))
        .filter(prescription::Column::Status.eq(Status::Approved))
        .filter(prescription::Column::ExpiresAt.gt(now))
        .order_by_desc(prescription::Column::ExpiresAt)
        .one(conn)
        .await?;
    Ok(found)
}

async fn prescription_json<C: ConnectionTrait>(
    conn: &C,
    record: &prescription::Model,
) -> Result<serde_json::Value, ApiError> {
    let images = PrescriptionImageEntity::find()
        .filter(prescription_image::Column::PrescriptionId.eq(record.id))
        .all(conn)
        .await?;

    let now = Utc::now();
    Ok(json!({
        "prescriptionId": record.id,
        "status": record.status.as_str(),
        "images": images,
        "notes": record.notes,
        "rejectionReason": record.rejection_reason,
        "reviewedBy": record.reviewed_by,
        "reviewedAt": record.reviewed_at,
        "expiresAt": record.expires_at,
        "isExpired": record.is_expired(now),
        "canBeUsed": record.can_be_used_for_order(now),
        "createdAt": record.created_at,
    }))
}

//ROUTES
async fn upload_prescription(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UploadPrescription>,
) -> Result<Response, ApiError> {
    payload.validate()?;

    if payload.images.is_empty() {
        return Err(ApiError::validation("No prescription images uploaded"));
    }

    let now = Utc::now();
    let txn = db.begin().await?;

    let new_prescription = prescription::ActiveModel {
        user_id: Set(claims.user_id),
        status: Set(Status::Pending),
        notes: Set(payload.notes.clone()),
        rejection_reason: Set(None),
        reviewed_by: Set(None),
        reviewed_at: Set(None),
        expires_at: Set(default_expiry(now)),
        created_at: Set(now),
        ..Default::default()
    };

    let prescription_id = PrescriptionEntity::insert(new_prescription)
        .exec(&txn)
        .await?
        .last_insert_id;

    let image_models =
        payload
            .images
            .iter()
            .enumerate()
            .map(|(index, image)| prescription_image::ActiveModel {
                prescription_id: Set(prescription_id),
                url: Set(image.url.clone()),
                caption: Set(image
                    .caption
                    .clone()
                    .unwrap_or_else(|| format!("Prescription image {}", index + 1))),
                uploaded_at: Set(now),
                ..Default::default()
            });
    PrescriptionImageEntity::insert_many(image_models)
        .exec(&txn)
        .await?;

    let record = PrescriptionEntity::find_by_id(prescription_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::Internal("Prescription vanished after insert".into()))?;
    let body = prescription_json(&txn, &record).await?;

    txn.commit().await?;

    Ok((
        StatusCode::CREATED,
        ok_response("Prescription uploaded successfully", body),
    )
        .into_response())
}

async fn get_user_prescriptions(
    Query(params): Query<PrescriptionListQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut query =
        PrescriptionEntity::find().filter(prescription::Column::UserId.eq(claims.user_id));
    if let Some(raw) = &params.status {
        let status = Status::from_str(raw).map_err(ApiError::validation)?;
        query = query.filter(prescription::Column::Status.eq(status));
    }

    let records = query
        .order_by_desc(prescription::Column::CreatedAt)
        .all(&*db)
        .await?;

    let mut body = Vec::with_capacity(records.len());
    for record in &records {
        body.push(prescription_json(&*db, record).await?);
    }

    Ok(ok_response("Prescriptions retrieved successfully", body))
}

async fn check_valid_prescription(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let now = Utc::now();
    let valid = find_valid_prescription(&*db, claims.user_id, now).await?;

    let body = match valid {
        Some(record) => {
            let days_until_expiry = (record.expires_at - now).num_days();
            json!({
                "hasValidPrescription": true,
                "prescription": {
                    "prescriptionId": record.id,
                    "expiresAt": record.expires_at,
                    "daysUntilExpiry": days_until_expiry,
                },
            })
        }
        None => json!({
            "hasValidPrescription": false,
            "prescription": null,
        }),
    };

    Ok(ok_response("Prescription check completed", body))
}

async fn delete_prescription_image(
    Path((id, image_id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let txn = db.begin().await?;

    let record = PrescriptionEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Prescription not found".into()))?;

    if record.user_id != claims.user_id {
        return Err(ApiError::Forbidden("Access denied".into()));
    }

    let deleted = PrescriptionImageEntity::delete_many()
        .filter(prescription_image::Column::Id.eq(image_id))
        .filter(prescription_image::Column::PrescriptionId.eq(id))
        .exec(&txn)
        .await?;

    if deleted.rows_affected == 0 {
        return Err(ApiError::NotFound("Image not found".into()));
    }

    txn.commit().await?;

    Ok(ok_response(
        "Prescription image deleted successfully",
        json!({ "prescriptionId": id, "imageId": image_id }),
    ))
}

//Structs
#[derive(Clone, Debug, Deserialize, Validate)]
struct UploadPrescription {
    #[validate(nested)]
    images: Vec<PrescriptionImageInput>,
    notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct PrescriptionListQuery {
    status: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
struct PrescriptionImageInput {
    #[validate(url(message = "Image URL must be a valid URL"))]
    url: String,
    caption: Option<String>,
}
