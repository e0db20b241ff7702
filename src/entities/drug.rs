use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::entities::drug_image::Entity as DrugImage;

/// Threshold below which (inclusive) a drug counts as low stock.
pub const LOW_STOCK_THRESHOLD: i32 = 10;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "drugs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub category: String,
    pub price: f32,
    pub quantity: i32,
    pub dosage: String,
    pub manufacturer: String,
    #[sea_orm(default = false)]
    pub prescription_required: bool,
    #[sea_orm(default = true)]
    pub is_active: bool,
    pub expiry_date: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

impl Model {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= LOW_STOCK_THRESHOLD
    }

    pub fn is_expired(&self, now: DateTimeUtc) -> bool {
        self.expiry_date < now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "DrugImage")]
    Images,
}

impl Related<DrugImage> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
