use axum::{
    extract::{Extension, Path, Query},
    routing::get,
    Json, Router,
};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::api::{pagination_json, PageQuery};
use crate::entities::drug::{self, Entity as DrugEntity};
use crate::error::{ok_response, ApiError};

//ROUTERS
pub fn drug_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/drug", get(list_drugs))
        .route("/drug/:id", get(get_drug))
        .layer(Extension(db))
}

//ROUTES
async fn list_drugs(
    Query(page): Query<PageQuery>,
    Query(params): Query<BrowseQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (page_no, limit, offset) = page.resolve();

    let mut condition = Condition::all().add(drug::Column::IsActive.eq(true));
    if let Some(category) = &params.category {
        condition = condition.add(drug::Column::Category.eq(category.clone()));
    }
    if let Some(rx) = params.prescription_required {
        condition = condition.add(drug::Column::PrescriptionRequired.eq(rx));
    }
    if let Some(search) = &params.search {
        condition = condition.add(drug::Column::Name.contains(search));
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

async fn get_drug(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let found = DrugEntity::find_by_id(id)
        .filter(drug::Column::IsActive.eq(true))
        .one(&*db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Drug not found".into()))?;

    let images = found
        .find_related(crate::entities::drug_image::Entity)
        .all(&*db)
        .await?;

    Ok(ok_response(
        "Drug retrieved successfully",
        json!({
            "drug": found,
            "images": images,
        }),
    ))
}

//Structs
#[derive(Clone, Debug, Deserialize)]
struct BrowseQuery {
    category: Option<String>,
    prescription_required: Option<bool>,
    search: Option<String>,
}
