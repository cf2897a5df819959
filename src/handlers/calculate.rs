use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::error::AppError;
use crate::pricing::{Calculation, CalculationRequest};
use crate::state::AppState;

/// POST /api/calculate - price a quote without storing it
pub async fn calculate(
    State(state): State<AppState>,
    payload: Result<Json<CalculationRequest>, JsonRejection>,
) -> Result<Json<Calculation>, AppError> {
    let Json(request) = payload?;
    let catalog = state.current_catalog()?;

    Ok(Json(request.evaluate(catalog)))
}
