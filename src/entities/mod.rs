pub mod cart_item;
pub mod drug;
pub mod drug_image;
pub mod order;
pub mod order_item;
pub mod prescription;
pub mod prescription_image;
pub mod user;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use chrono::Utc;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, Schema, Set,
    TransactionTrait,
};
use std::sync::Arc;

use crate::entities::{
    cart_item::Entity as CartItem, drug::Entity as Drug, drug_image::Entity as DrugImage,
    order::Entity as Order, order_item::Entity as OrderItem,
    prescription::Entity as Prescription, prescription_image::Entity as PrescriptionImage,
    user::Entity as User,
};

pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let create_user_table = schema.create_table_from_entity(User);
    let create_drug_table = schema.create_table_from_entity(Drug);
    let create_drug_image_table = schema.create_table_from_entity(DrugImage);
    let create_cart_item_table = schema.create_table_from_entity(CartItem);
    let create_prescription_table = schema.create_table_from_entity(Prescription);
    let create_prescription_image_table = schema.create_table_from_entity(PrescriptionImage);
    let create_order_table = schema.create_table_from_entity(Order);
    let create_order_item_table = schema.create_table_from_entity(OrderItem);

    db.execute(backend.build(&create_user_table)).await?;
    db.execute(backend.build(&create_drug_table)).await?;
    db.execute(backend.build(&create_drug_image_table)).await?;
    db.execute(backend.build(&create_cart_item_table)).await?;
    db.execute(backend.build(&create_prescription_table)).await?;
    db.execute(backend.build(&create_prescription_image_table))
        .await?;
    db.execute(backend.build(&create_order_table)).await?;
    db.execute(backend.build(&create_order_item_table)).await?;

    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| format!("Failed to hash password: {}", err))
}

/// Seeds the default admin account on first boot. Does nothing on a
/// non-empty users table.
pub async fn primary_setup(db: Arc<DatabaseConnection>) -> Result<(), DbErr> {
    if User::find().count(&*db).await? > 0 {
        return Ok(());
    }

    let password_hash = hash_password("Secret15")
        .map_err(|err| DbErr::Custom(format!("Seed failed: {}", err)))?;

    let now = Utc::now();
    let new_admin = user::ActiveModel {
        email: Set("admin@apteka.local".to_owned()),
        password: Set(password_hash),
        first_name: Set("Apteka".to_owned()),
        last_name: Set("Admin".to_owned()),
        phone: Set(None),
        address: Set(None),
        role: Set(user::Role::Admin),
        is_active: Set(true),
        created_at: Set(now),
        ..Default::default()
    };

    let txn = db.begin().await?;
    User::insert(new_admin).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!("seeded default admin account");
    Ok(())
}
