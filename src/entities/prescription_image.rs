use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "prescription_images")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub prescription_id: i32,
    /// Externally hosted image, referenced by URL only.
    pub url: String,
    pub caption: String,
    pub uploaded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::prescription::Entity",
        from = "Column::PrescriptionId",
        to = "crate::entities::prescription::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Prescription,
}

impl Related<crate::entities::prescription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Prescription.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
