use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Immutable snapshot of one cart line taken at checkout. Name, price and
/// the prescription flag are copied so later catalog edits cannot alter a
/// placed order.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub order_id: i32,
    pub drug_id: i32,
    pub name: String,
    pub quantity: i32,
    pub price: f32,
    pub prescription_required: bool,
}

impl Model {
    pub fn line_total(&self) -> f32 {
        self.price * self.quantity as f32
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::order::Entity",
        from = "Column::OrderId",
        to = "crate::entities::order::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "crate::entities::drug::Entity",
        from = "Column::DrugId",
        to = "crate::entities::drug::Column::Id"
    )]
    Drug,
}

impl Related<crate::entities::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<crate::entities::drug::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Drug.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
