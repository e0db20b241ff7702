use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use rand::Rng;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use crate::api::{pagination_json, PageQuery};
use crate::api::user::prescription::find_valid_prescription;
use crate::entities::{
    cart_item::{self, Entity as CartItemEntity},
    drug::{self, Entity as DrugEntity},
    order::{self, Entity as OrderEntity, PaymentMethod, Status},
    order_item::{self, Entity as OrderItemEntity},
    user::Entity as UserEntity,
};
use crate::error::{ok_response, ApiError};
use crate::middleware::auth::Claims;
use crate::notify::{Notification, Notifier};

//ROUTERS
pub fn order_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/order", post(place_order).get(get_user_orders))
        .route("/order/:id", get(get_order_details))
        .route("/order/:id/cancel", patch(cancel_order))
        .layer(Extension(db))
}

fn generate_order_number() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("ORD-{}{:04}", Utc::now().format("%y%m%d%H%M%S"), suffix)
}

/// Full order representation: snapshot lines plus derived summary.
pub async fn order_snapshot<C: ConnectionTrait>(
    conn: &C,
    placed: &order::Model,
) -> Result<serde_json::Value, ApiError> {
    let items = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(placed.id))
        .all(conn)
        .await?;

    let total_items: i32 = items.iter().map(|item| item.quantity).sum();
    let items_json: Vec<serde_json::Value> = items
        .iter()
        .map(|item| {
            json!({
                "drugId": item.drug_id,
                "name": item.name,
                "quantity": item.quantity,
                "price": item.price,
                "itemTotal": item.line_total(),
                "prescriptionRequired": item.prescription_required,
            })
        })
        .collect();

    Ok(json!({
        "orderId": placed.id,
        "orderNumber": placed.order_number,
        "status": placed.status.as_str(),
        "items": items_json,
        "summary": {
            "totalItems": total_items,
            "totalAmount": placed.total_amount,
        },
        "shippingAddress": placed.shipping_address,
        "contact": {
            "phone": placed.contact_phone,
            "email": placed.contact_email,
        },
        "payment": {
            "method": placed.payment_method,
            "status": placed.payment_status,
        },
        "prescriptionId": placed.prescription_id,
        "notes": placed.notes,
        "createdAt": placed.created_at,
        "updatedAt": placed.updated_at,
    }))
}

/// Restores the quantities an approval deducted, one increment per line.
pub async fn restock_order_items<C: ConnectionTrait>(
    conn: &C,
    items: &[order_item::Model],
) -> Result<(), ApiError> {
    for item in items {
        DrugEntity::update_many()
            .col_expr(
                drug::Column::Quantity,
                Expr::col(drug::Column::Quantity).add(item.quantity),
            )
            .filter(drug::Column::Id.eq(item.drug_id))
            .exec(conn)
            .await?;
    }
    Ok(())
}

//ROUTES
async fn place_order(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Extension(notifier): Extension<Notifier>,
    Json(payload): Json<PlaceOrder>,
) -> Result<Response, ApiError> {
    let user_id = claims.user_id;
    let now = Utc::now();

    let payment_method = match &payload.payment_method {
        Some(raw) => PaymentMethod::from_str(raw).map_err(ApiError::validation)?,
        None => PaymentMethod::Card,
    };

    let txn = db.begin().await?;

    let buyer = UserEntity::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".into()))?;

    let shipping_address = payload
        .shipping_address
        .clone()
        .or_else(|| buyer.address.clone())
        .ok_or_else(|| ApiError::validation("Shipping address is required"))?;

    let lines = CartItemEntity::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .find_also_related(DrugEntity)
        .all(&txn)
        .await?;

    if lines.is_empty() {
        return Err(ApiError::validation("Cart is empty"));
    }

    // Prescription gate comes before any totals work: fail fast when a
    // prescription-required line has no approved, unexpired prescription.
    let needs_prescription = lines
        .iter()
        .any(|(_, d)| d.as_ref().is_some_and(|d| d.prescription_required));

    let prescription_id = if needs_prescription {
        let valid = find_valid_prescription(&txn, user_id, now)
            .await?
            .ok_or_else(|| {
                ApiError::PrescriptionRequired(
                    "Valid approved prescription required for this order. \
                     Please upload and get approval first."
                        .into(),
                )
            })?;
        Some(valid.id)
    } else {
        None
    };

    // Stock is checked at placement, not reserved; approval re-checks with
    // a conditional decrement.
    let mut total_amount: f32 = 0.0;
    let mut snapshot_items = Vec::with_capacity(lines.len());

    for (line, found_drug) in &lines {
        let found_drug = found_drug
            .as_ref()
            .ok_or_else(|| ApiError::Internal("Cart line references a missing drug".into()))?;

        // A drug retired after it entered the cart cannot be checked out.
        if !found_drug.is_active {
            return Err(ApiError::validation(format!(
                "{} is no longer available",
                found_drug.name
            )));
        }

        if found_drug.quantity < line.quantity {
            return Err(ApiError::InsufficientStock(format!(
                "Insufficient stock for {}. Only {} available",
                found_drug.name, found_drug.quantity
            )));
        }

        total_amount += line.line_total();
        snapshot_items.push((line.clone(), found_drug.clone()));
    }

    let new_order = order::ActiveModel {
        order_number: Set(generate_order_number()),
        user_id: Set(user_id),
        status: Set(Status::Pending),
        total_amount: Set(total_amount),
        shipping_address: Set(shipping_address),
        contact_phone: Set(buyer.phone.clone()),
        contact_email: Set(buyer.email.clone()),
        payment_method: Set(payment_method),
        payment_status: Set("unpaid".to_string()),
        notes: Set(payload.notes.clone()),
        prescription_id: Set(prescription_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let order_id = OrderEntity::insert(new_order).exec(&txn).await?.last_insert_id;

    let item_models = snapshot_items.iter().map(|(line, found_drug)| {
        order_item::ActiveModel {
            order_id: Set(order_id),
            drug_id: Set(found_drug.id),
            name: Set(found_drug.name.clone()),
            quantity: Set(line.quantity),
            price: Set(line.price),
            prescription_required: Set(found_drug.prescription_required),
            ..Default::default()
        }
    });
    OrderItemEntity::insert_many(item_models).exec(&txn).await?;

    CartItemEntity::delete_many()
        .filter(cart_item::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    let placed = OrderEntity::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::Internal("Order vanished after insert".into()))?;
    let snapshot = order_snapshot(&txn, &placed).await?;

    txn.commit().await?;

    // Best-effort confirmation; the order stands whether or not this lands.
    notifier.dispatch(Notification::OrderConfirmation {
        email: buyer.email,
        first_name: buyer.first_name,
        order_number: placed.order_number.clone(),
        total_amount: placed.total_amount,
    });

    Ok((
        StatusCode::CREATED,
        ok_response("Order placed successfully", snapshot),
    )
        .into_response())
}

async fn get_user_orders(
    Query(page): Query<PageQuery>,
    Query(params): Query<OrderListQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (page_no, limit, offset) = page.resolve();

    let mut query = OrderEntity::find().filter(order::Column::UserId.eq(claims.user_id));
    if let Some(raw) = &params.status {
        let status = Status::from_str(raw).map_err(ApiError::validation)?;
        query = query.filter(order::Column::Status.eq(status));
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

async fn get_order_details(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let found = OrderEntity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".into()))?;

    if found.user_id != claims.user_id {
        return Err(ApiError::Forbidden("Access denied".into()));
    }

    let snapshot = order_snapshot(&*db, &found).await?;
    Ok(ok_response("Order details retrieved successfully", snapshot))
}

async fn cancel_order(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(claims): Extension<Claims>,
    Extension(notifier): Extension<Notifier>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let txn = db.begin().await?;

    let found = OrderEntity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".into()))?;

    if found.user_id != claims.user_id {
        return Err(ApiError::Forbidden("Access denied".into()));
    }

    if !matches!(found.status, Status::Pending | Status::Approved) {
        return Err(ApiError::validation(
            "Order cannot be cancelled at this stage",
        ));
    }

    // An approved order already consumed stock; give it back line by line.
    if found.status == Status::Approved {
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(found.id))
            .all(&txn)
            .await?;
        restock_order_items(&txn, &items).await?;
    }

    let previous = found.status;
    let mut cancelled: order::ActiveModel = found.into();
    cancelled.status = Set(Status::Cancelled);
    cancelled.updated_at = Set(Utc::now());
    let cancelled = cancelled.update(&txn).await?;

    txn.commit().await?;

    notifier.dispatch(Notification::OrderStatusChange {
        email: cancelled.contact_email.clone(),
        order_number: cancelled.order_number.clone(),
        previous: previous.as_str().to_string(),
        next: Status::Cancelled.as_str().to_string(),
    });

    Ok(ok_response(
        "Order cancelled successfully",
        json!({
            "orderId": cancelled.id,
            "orderNumber": cancelled.order_number,
            "status": cancelled.status.as_str(),
        }),
    ))
}

//Structs
#[derive(Clone, Debug, Deserialize)]
struct PlaceOrder {
    shipping_address: Option<String>,
    payment_method: Option<String>,
    notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct OrderListQuery {
    status: Option<String>,
}
