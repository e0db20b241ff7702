use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::entities::drug::Entity as Drug;
use crate::entities::user::Entity as User;

/// Hard cap on how many units of one drug a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 10;

/// One line of a user's cart. The cart itself is just the set of a user's
/// rows; totals are always derived from the lines, never stored.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "cart_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub user_id: i32,
    pub drug_id: i32,
    pub quantity: i32,
    /// Price captured when the line was added.
    pub price: f32,
    pub added_at: DateTimeUtc,
}

impl Model {
    pub fn line_total(&self) -> f32 {
        self.price * self.quantity as f32
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "User",
        from = "Column::UserId",
        to = "crate::entities::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "Drug",
        from = "Column::DrugId",
        to = "crate::entities::drug::Column::Id"
    )]
    Drug,
}

impl Related<User> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<Drug> for Entity {
    fn to() -> RelationDef {
        Relation::Drug.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
