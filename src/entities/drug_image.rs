use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "drug_images")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub drug_id: i32,
    pub url: String,
    pub caption: String,
    #[sea_orm(default = false)]
    pub is_primary: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::drug::Entity",
        from = "Column::DrugId",
        to = "crate::entities::drug::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Drug,
}

impl Related<crate::entities::drug::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Drug.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
