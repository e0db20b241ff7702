use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::entities::{
    cart_item::{self, Entity as CartItemEntity, MAX_LINE_QUANTITY},
    drug::Entity as DrugEntity,
};
use crate::error::{ok_response, ApiError};
use crate::middleware::auth::Claims;

//ROUTERS
pub fn cart_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/cart", get(get_cart).post(add_item).delete(clear_cart))
        .route("/cart/:id", patch(update_item).delete(remove_item))
        .layer(Extension(db))
}

/// Full cart representation for a user: lines joined with their drugs plus
/// derived totals. An empty cart is a valid value, never an error.
pub async fn cart_snapshot<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> Result<serde_json::Value, ApiError> {
    let lines = CartItemEntity::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .find_also_related(DrugEntity)
        .all(conn)
        .await?;

    let mut items = Vec::with_capacity(lines.len());
    let mut total_items: i32 = 0;
    let mut subtotal: f32 = 0.0;
    let mut requires_prescription = false;

    for (line, found_drug) in &lines {
        let found_drug = found_drug
            .as_ref()
            .ok_or_else(|| ApiError::Internal("Cart line references a missing drug".into()))?;

        total_items += line.quantity;
        subtotal += line.line_total();
        requires_prescription |= found_drug.prescription_required;

        items.push(json!({
            "cartItemId": line.id,
            "drugId": found_drug.id,
            "name": found_drug.name,
            "category": found_drug.category,
            "price": line.price,
            "quantity": line.quantity,
            "itemTotal": line.line_total(),
            "prescriptionRequired": found_drug.prescription_required,
            "addedAt": line.added_at,
        }));
    }

    Ok(json!({
        "items": items,
        "summary": {
            "totalItems": total_items,
            "subtotal": subtotal,
            "requiresPrescription": requires_prescription,
        },
    }))
}

//ROUTES
async fn get_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = cart_snapshot(&*db, claims.user_id).await?;
    Ok(ok_response("Cart retrieved successfully", snapshot))
}

async fn add_item(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddToCart>,
) -> Result<Response, ApiError> {
    payload.validate()?;
    let quantity = payload.quantity.unwrap_or(1);
    let user_id = claims.user_id;

    let txn = db.begin().await?;

    let found_drug = DrugEntity::find_by_id(payload.drug_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Drug not found".into()))?;

    if !found_drug.is_active {
        return Err(ApiError::validation("Drug is not available"));
    }

    let existing = CartItemEntity::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .filter(cart_item::Column::DrugId.eq(payload.drug_id))
        .one(&txn)
        .await?;

    match existing {
        Some(line) => {
            let merged = line.quantity + quantity;
            if merged > MAX_LINE_QUANTITY {
                return Err(ApiError::validation(format!(
                    "Cannot add more than {} of the same drug",
                    MAX_LINE_QUANTITY
                )));
            }
            if found_drug.quantity < merged {
                return Err(ApiError::InsufficientStock(format!(
                    "Only {} items available in stock",
                    found_drug.quantity
                )));
            }

            let mut line: cart_item::ActiveModel = line.into();
            line.quantity = Set(merged);
            line.update(&txn).await?;
        }
        None => {
            if found_drug.quantity < quantity {
                return Err(ApiError::InsufficientStock(format!(
                    "Only {} items available in stock",
                    found_drug.quantity
                )));
            }

            let new_line = cart_item::ActiveModel {
                user_id: Set(user_id),
                drug_id: Set(payload.drug_id),
                quantity: Set(quantity),
                price: Set(found_drug.price),
                added_at: Set(Utc::now()),
                ..Default::default()
            };
            CartItemEntity::insert(new_line).exec(&txn).await?;
        }
    }

    let snapshot = cart_snapshot(&txn, user_id).await?;
    txn.commit().await?;

    Ok((
        StatusCode::CREATED,
        ok_response("Item added to cart successfully", snapshot),
    )
        .into_response())
}

async fn update_item(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateCartItem>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !(1..=MAX_LINE_QUANTITY).contains(&payload.quantity) {
        return Err(ApiError::validation(format!(
            "Quantity must be between 1 and {}",
            MAX_LINE_QUANTITY
        )));
    }

    let txn = db.begin().await?;

    let line = CartItemEntity::find_by_id(id)
        .filter(cart_item::Column::UserId.eq(claims.user_id))
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Item not found in cart".into()))?;

    let found_drug = DrugEntity::find_by_id(line.drug_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::Internal("Cart line references a missing drug".into()))?;

    if found_drug.quantity < payload.quantity {
        return Err(ApiError::InsufficientStock(format!(
            "Only {} items available in stock",
            found_drug.quantity
        )));
    }

    let mut line: cart_item::ActiveModel = line.into();
    line.quantity = Set(payload.quantity);
    line.update(&txn).await?;

    let snapshot = cart_snapshot(&txn, claims.user_id).await?;
    txn.commit().await?;

    Ok(ok_response("Cart item updated successfully", snapshot))
}

async fn remove_item(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let txn = db.begin().await?;

    let deleted = CartItemEntity::delete_many()
        .filter(cart_item::Column::Id.eq(id))
        .filter(cart_item::Column::UserId.eq(claims.user_id))
        .exec(&txn)
        .await?;

    if deleted.rows_affected == 0 {
        return Err(ApiError::NotFound("Item not found in cart".into()));
    }

    let snapshot = cart_snapshot(&txn, claims.user_id).await?;
    txn.commit().await?;

    Ok(ok_response("Item removed from cart successfully", snapshot))
}

async fn clear_cart(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = CartItemEntity::delete_many()
        .filter(cart_item::Column::UserId.eq(claims.user_id))
        .exec(&*db)
        .await?;

    if deleted.rows_affected == 0 {
        return Err(ApiError::NotFound("Cart not found".into()));
    }

    Ok(ok_response(
        "Cart cleared successfully",
        json!({
            "items": [],
            "summary": {
                "totalItems": 0,
                "subtotal": 0.0,
                "requiresPrescription": false,
            },
        }),
    ))
}

//Structs
#[derive(Clone, Debug, Deserialize, Validate)]
struct AddToCart {
    drug_id: i32,
    #[validate(range(min = 1, max = 10, message = "Quantity must be between 1 and 10"))]
    quantity: Option<i32>,
}

#[derive(Clone, Debug, Deserialize)]
struct UpdateCartItem {
    quantity: i32,
}
