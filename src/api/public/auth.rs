use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::entities::{
    hash_password,
    user::{self, Entity as UserEntity, Role},
};
use crate::error::{ok_response, ApiError};
use crate::middleware::auth::generate_token;
use crate::notify::{Notification, Notifier};

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("phone regex must parse"));

//ROUTERS
pub fn auth_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login))
        .layer(Extension(db))
}

//ROUTES
async fn register_user(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(notifier): Extension<Notifier>,
    Json(payload): Json<RegisterUser>,
) -> Result<Response, ApiError> {
    payload.validate()?;

    let txn = db.begin().await?;

    let existing = UserEntity::find()
        .filter(user::Column::Email.eq(payload.email.clone()))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let password = hash_password(&payload.password).map_err(ApiError::Internal)?;

    let new_user = user::ActiveModel {
        email: Set(payload.email.clone()),
        password: Set(password),
        first_name: Set(payload.first_name.clone()),
        last_name: Set(payload.last_name.clone()),
        phone: Set(payload.phone.clone()),
        address: Set(payload.address.clone()),
        role: Set(Role::User),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let user_id = UserEntity::insert(new_user).exec(&txn).await?.last_insert_id;

    let token = generate_token(user_id, Role::User)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    // The welcome notification must go out before the account exists, so a
    // failed dispatch rolls the registration back and the user can retry.
    notifier
        .send(&Notification::Welcome {
            email: payload.email.clone(),
            first_name: payload.first_name.clone(),
        })
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    txn.commit().await?;

    Ok((
        StatusCode::CREATED,
        ok_response(
            "Registration successful",
            json!({
                "token": token,
                "user": {
                    "id": user_id,
                    "email": payload.email,
                    "role": Role::User.as_str(),
                },
            }),
        ),
    )
        .into_response())
}

async fn login(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Json(payload): Json<UserLogin>,
) -> Result<Response, ApiError> {
    let found = UserEntity::find()
        .filter(user::Column::Email.eq(payload.email.clone()))
        .filter(user::Column::IsActive.eq(true))
        .one(&*db)
        .await?;

    let found = found.ok_or_else(|| ApiError::Unauthorized("Invalid email or password".into()))?;

    found
        .check_hash(&payload.password)
        .map_err(|_| ApiError::Unauthorized("Invalid email or password".into()))?;

    let token = generate_token(found.id, found.role)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(ok_response(
        "Login successful",
        json!({
            "token": token,
            "user": {
                "id": found.id,
                "email": found.email,
                "role": found.role.as_str(),
            },
        }),
    )
    .into_response())
}

//Structs
#[derive(Clone, Debug, Deserialize, Validate)]
struct RegisterUser {
    #[validate(email(message = "A valid email is required"))]
    email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
    #[validate(length(min = 1, message = "First name is required"))]
    first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    last_name: String,
    #[validate(regex(path = *PHONE_RE, message = "Phone must be 7-15 digits"))]
    phone: Option<String>,
    address: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct UserLogin {
    email: String,
    password: String,
}
