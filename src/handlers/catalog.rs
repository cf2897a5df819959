use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::AppError;
use crate::models::{BaseRates, CategoryConfig};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub source: String,
    /// Display order
    pub categories: Vec<CategoryConfig>,
    pub rates: BaseRates,
}

/// GET /api/catalog
pub async fn get_catalog(State(state): State<AppState>) -> Result<Json<CatalogResponse>, AppError> {
    let catalog = state.current_catalog()?;

    Ok(Json(CatalogResponse {
        source: state.catalog_source.describe(),
        categories: catalog.sorted_categories().into_iter().cloned().collect(),
        rates: catalog.rates.clone(),
    }))
}
