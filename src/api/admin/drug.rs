use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::api::{pagination_json, PageQuery};
use crate::entities::cart_item::{self, Entity as CartItemEntity};
use crate::entities::drug::{self, Entity as DrugEntity, LOW_STOCK_THRESHOLD};
use crate::entities::drug_image::{self, Entity as DrugImageEntity};
use crate::entities::order_item::{self, Entity as OrderItemEntity};
use crate::error::{ok_response, ApiError, FieldError};
use crate::middleware::auth::Claims;

//ROUTERS
pub fn admin_drug_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/drug", post(create_drug).get(admin_list_drugs))
        .route(
            "/drug/:id",
            get(admin_get_drug).patch(patch_drug).delete(delete_drug),
        )
        .route("/drug/:id/image", post(add_drug_images))
        .route(
            "/drug/:id/image/:image_id",
            patch(set_primary_image).delete(delete_drug_image),
        )
        .layer(Extension(db))
}

fn check_single_primary(images: &[DrugImageInput]) -> Result<(), ApiError> {
    let primaries = images.iter().filter(|image| image.is_primary).count();
    if primaries > 1 {
        return Err(ApiError::validation_fields(
            "Only one image can be primary",
            vec![FieldError::new("images", "At most one image may be primary")],
        ));
    }
    Ok(())
}

async fn drug_with_images<C: ConnectionTrait>(
    conn: &C,
    record: &drug::Model,
) -> Result<serde_json::Value, ApiError> {
    let images = DrugImageEntity::find()
        .filter(drug_image::Column::DrugId.eq(record.id))
        .all(conn)
        .await?;
    Ok(json!({ "drug": record, "images": images }))
}

//ROUTES
async fn create_drug(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateDrug>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    let images = payload.images.clone().unwrap_or_default();
    check_single_primary(&images)?;

    let txn = db.begin().await?;

    let existing = DrugEntity::find()
        .filter(drug::Column::Name.eq(payload.name.clone()))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Drug with this name already exists".into()));
    }

    let new_drug = drug::ActiveModel {
        name: Set(payload.name.clone()),
        description: Set(payload.description.clone()),
        category: Set(payload.category.clone()),
        price: Set(payload.price),
        quantity: Set(payload.quantity),
        dosage: Set(payload.dosage.clone()),
        manufacturer: Set(payload.manufacturer.clone()),
        prescription_required: Set(payload.prescription_required.unwrap_or(false)),
        is_active: Set(true),
        expiry_date: Set(payload.expiry_date),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let drug_id = DrugEntity::insert(new_drug).exec(&txn).await?.last_insert_id;

    if !images.is_empty() {
        let image_models = images.iter().map(|image| drug_image::ActiveModel {
            drug_id: Set(drug_id),
            url: Set(image.url.clone()),
            caption: Set(image.caption.clone().unwrap_or_default()),
            is_primary: Set(image.is_primary),
            ..Default::default()
        });
        DrugImageEntity::insert_many(image_models).exec(&txn).await?;
    }

    let record = DrugEntity::find_by_id(drug_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::Internal("Drug vanished after insert".into()))?;
    let body = drug_with_images(&txn, &record).await?;

    txn.commit().await?;

    tracing::info!(admin = claims.user_id, drug = drug_id, "drug created");
    Ok((
        StatusCode::CREATED,
        ok_response("Drug created successfully", body),
    )
        .into_response())
}

async fn admin_list_drugs(
    Query(page): Query<PageQuery>,
    Query(params): Query<AdminDrugQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (page_no, limit, offset) = page.resolve();

    let mut condition = Condition::all();
    if let Some(active) = params.is_active {
        condition = condition.add(drug::Column::IsActive.eq(active));
    }
    if let Some(category) = &params.category {
        condition = condition.add(drug::Column::Category.eq(category.clone()));
    }
    if params.low_stock.unwrap_or(false) {
        condition = condition.add(drug::Column::Quantity.lte(LOW_STOCK_THRESHOLD));
    }
    if params.expired.unwrap_or(false) {
        condition = condition.add(drug::Column::ExpiryDate.lt(Utc::now()));
    }

    let total = DrugEntity::find()
        .filter(condition.clone())
        .count(&*db)
        .await?;

    let drugs = DrugEntity::find()
        .filter(condition)
        .order_by_desc(drug::Column::CreatedAt)
        .order_by_desc(drug::Column::Id)
        .offset(offset)
        .limit(limit)
        .all(&*db)
        .await?;

    Ok(ok_response(
        "Drugs retrieved successfully",
        json!({
            "drugs": drugs,
            "pagination": pagination_json(page_no, limit, total),
        }),
    ))
}

async fn admin_get_drug(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = DrugEntity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Drug not found".into()))?;

    let body = drug_with_images(&*db, &record).await?;
    Ok(ok_response("Drug retrieved successfully", body))
}

async fn patch_drug(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<UpdateDrug>,
) -> Result<Json<serde_json::Value>, ApiError> {
    payload.validate()?;
    if let Some(images) = &payload.images {
        check_single_primary(images)?;
    }

    let txn = db.begin().await?;

    let record = DrugEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Drug not found".into()))?;

    // Renames re-check uniqueness against everything but this drug.
    if let Some(name) = &payload.name {
        if *name != record.name {
            let clash = DrugEntity::find()
                .filter(drug::Column::Name.eq(name.clone()))
                .filter(drug::Column::Id.ne(id))
                .one(&txn)
                .await?;
            if clash.is_some() {
                return Err(ApiError::Conflict(
                    "Drug with this name already exists".into(),
                ));
            }
        }
    }

    let mut updated: drug::ActiveModel = record.into();
    if let Some(name) = payload.name.clone() {
        updated.name = Set(name);
    }
    if let Some(description) = payload.description.clone() {
        updated.description = Set(description);
    }
    if let Some(category) = payload.category.clone() {
        updated.category = Set(category);
    }
    if let Some(price) = payload.price {
        updated.price = Set(price);
    }
    if let Some(quantity) = payload.quantity {
        updated.quantity = Set(quantity);
    }
    if let Some(dosage) = payload.dosage.clone() {
        updated.dosage = Set(dosage);
    }
    if let Some(manufacturer) = payload.manufacturer.clone() {
        updated.manufacturer = Set(manufacturer);
    }
    if let Some(rx) = payload.prescription_required {
        updated.prescription_required = Set(rx);
    }
    if let Some(active) = payload.is_active {
        updated.is_active = Set(active);
    }
    if let Some(expiry) = payload.expiry_date {
        updated.expiry_date = Set(expiry);
    }
    let updated = updated.update(&txn).await?;

    // An images payload replaces the whole list.
    if let Some(images) = &payload.images {
        DrugImageEntity::delete_many()
            .filter(drug_image::Column::DrugId.eq(id))
            .exec(&txn)
            .await?;
        if !images.is_empty() {
            let image_models = images.iter().map(|image| drug_image::ActiveModel {
                drug_id: Set(id),
                url: Set(image.url.clone()),
                caption: Set(image.caption.clone().unwrap_or_default()),
                is_primary: Set(image.is_primary),
                ..Default::default()
            });
            DrugImageEntity::insert_many(image_models).exec(&txn).await?;
        }
    }

    let body = drug_with_images(&txn, &updated).await?;
    txn.commit().await?;

    Ok(ok_response("Drug updated successfully", body))
}

async fn delete_drug(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let txn = db.begin().await?;

    let record = DrugEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Drug not found".into()))?;

    // Historical orders keep referencing the drug; retire instead of delete.
    let referenced = OrderItemEntity::find()
        .filter(order_item::Column::DrugId.eq(id))
        .count(&txn)
        .await?;

    let message = if referenced > 0 {
        let mut retired: drug::ActiveModel = record.into();
        retired.is_active = Set(false);
        retired.update(&txn).await?;
        "Drug retired (referenced by existing orders)"
    } else {
        // Stale cart lines would keep a foreign key on the drug.
        CartItemEntity::delete_many()
            .filter(cart_item::Column::DrugId.eq(id))
            .exec(&txn)
            .await?;
        DrugImageEntity::delete_many()
            .filter(drug_image::Column::DrugId.eq(id))
            .exec(&txn)
            .await?;
        DrugEntity::delete_by_id(id).exec(&txn).await?;
        "Drug deleted successfully"
    };

    txn.commit().await?;

    Ok(ok_response(message, json!({ "drugId": id })))
}

async fn add_drug_images(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<AddImages>,
) -> Result<Json<serde_json::Value>, ApiError> {
    payload.validate()?;
    check_single_primary(&payload.images)?;

    if payload.images.is_empty() {
        return Err(ApiError::validation("Images array is required"));
    }

    let txn = db.begin().await?;

    let record = DrugEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Drug not found".into()))?;

    // A new primary displaces any existing one.
    if payload.images.iter().any(|image| image.is_primary) {
        DrugImageEntity::update_many()
            .col_expr(drug_image::Column::IsPrimary, Expr::value(false))
            .filter(drug_image::Column::DrugId.eq(id))
            .exec(&txn)
            .await?;
    }

    let image_models = payload.images.iter().map(|image| drug_image::ActiveModel {
        drug_id: Set(id),
        url: Set(image.url.clone()),
        caption: Set(image.caption.clone().unwrap_or_default()),
        is_primary: Set(image.is_primary),
        ..Default::default()
    });
    DrugImageEntity::insert_many(image_models).exec(&txn).await?;

    let body = drug_with_images(&txn, &record).await?;
    txn.commit().await?;

    Ok(ok_response("Images uploaded successfully", body))
}

async fn set_primary_image(
    Path((id, image_id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let txn = db.begin().await?;

    let record = DrugEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Drug not found".into()))?;

    let target = DrugImageEntity::find_by_id(image_id)
        .filter(drug_image::Column::DrugId.eq(id))
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".into()))?;

    DrugImageEntity::update_many()
        .col_expr(drug_image::Column::IsPrimary, Expr::value(false))
        .filter(drug_image::Column::DrugId.eq(id))
        .exec(&txn)
        .await?;

    let mut primary: drug_image::ActiveModel = target.into();
    primary.is_primary = Set(true);
    primary.update(&txn).await?;

    let body = drug_with_images(&txn, &record).await?;
    txn.commit().await?;

    Ok(ok_response("Primary image set successfully", body))
}

async fn delete_drug_image(
    Path((id, image_id)): Path<(i32, i32)>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let txn = db.begin().await?;

    let record = DrugEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Drug not found".into()))?;

    let deleted = DrugImageEntity::delete_many()
        .filter(drug_image::Column::Id.eq(image_id))
        .filter(drug_image::Column::DrugId.eq(id))
        .exec(&txn)
        .await?;

    if deleted.rows_affected == 0 {
        return Err(ApiError::NotFound("Image not found".into()));
    }

    let body = drug_with_images(&txn, &record).await?;
    txn.commit().await?;

    Ok(ok_response("Image deleted successfully", body))
}

//Structs
#[derive(Clone, Debug, Deserialize, Validate)]
struct CreateDrug {
    #[validate(length(min = 3, max = 100, message = "Drug name must be 3-100 characters"))]
    name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    description: String,
    #[validate(length(min = 1, message = "Category is required"))]
    category: String,
    #[validate(range(min = 0.0, message = "Price must be positive"))]
    price: f32,
    #[validate(range(min = 0, message = "Quantity must be positive"))]
    quantity: i32,
    #[validate(length(min = 1, message = "Dosage is required"))]
    dosage: String,
    #[validate(length(min = 1, message = "Manufacturer is required"))]
    manufacturer: String,
    prescription_required: Option<bool>,
    expiry_date: chrono::DateTime<chrono::Utc>,
    #[validate(nested)]
    images: Option<Vec<DrugImageInput>>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
struct UpdateDrug {
    #[validate(length(min = 3, max = 100, message = "Drug name must be 3-100 characters"))]
    name: Option<String>,
    description: Option<String>,
    category: Option<String>,
    #[validate(range(min = 0.0, message = "Price must be positive"))]
    price: Option<f32>,
    #[validate(range(min = 0, message = "Quantity must be positive"))]
    quantity: Option<i32>,
    dosage: Option<String>,
    manufacturer: Option<String>,
    prescription_required: Option<bool>,
    is_active: Option<bool>,
    expiry_date: Option<chrono::DateTime<chrono::Utc>>,
    #[validate(nested)]
    images: Option<Vec<DrugImageInput>>,
}

#[derive(Clone, Debug, Deserialize)]
struct AdminDrugQuery {
    is_active: Option<bool>,
    category: Option<String>,
    low_stock: Option<bool>,
    expired: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
struct AddImages {
    #[validate(nested)]
    images: Vec<DrugImageInput>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
struct DrugImageInput {
    #[validate(url(message = "Image URL must be a valid URL"))]
    url: String,
    caption: Option<String>,
    #[serde(default)]
    is_primary: bool,
}
