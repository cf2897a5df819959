//! Quote session HTTP API
//!
//! A quote is opened into an editing session, receives pricing events and is
//! closed again. Every state change is queued on the debounced writer; close
//! and delete go through the same writer and wait for the store.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::error::AppError;
use crate::models::{DocumentTotals, QuoteSnapshot, QuoteSummary};
use crate::session::{PricingEvent, SessionView};
use crate::state::AppState;

const MAX_QUOTE_NUMBER_LEN: usize = 64;

#[derive(Debug, Serialize)]
pub struct QuoteListItem {
    #[serde(flatten)]
    pub summary: QuoteSummary,
    /// Whether an editing session is open
    pub open: bool,
}

#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub quote_number: String,
    pub totals: DocumentTotals,
}

fn validate_quote_number(quote_number: &str) -> Result<(), AppError> {
    let trimmed = quote_number.trim();
    if trimmed.is_empty() || trimmed.len() != quote_number.len() {
        return Err(AppError::InvalidInput(
            "quote number must be non-empty without surrounding whitespace".to_string(),
        ));
    }
    if quote_number.len() > MAX_QUOTE_NUMBER_LEN || quote_number.chars().any(char::is_control) {
        return Err(AppError::InvalidInput(format!(
            "quote number must be at most {} printable characters",
            MAX_QUOTE_NUMBER_LEN
        )));
    }
    Ok(())
}

/// GET /api/quotes
pub async fn list_quotes(State(state): State<AppState>) -> Result<Json<Vec<QuoteListItem>>, AppError> {
    let summaries = state.store.list().await?;

    Ok(Json(
        summaries
            .into_iter()
            .map(|summary| QuoteListItem {
                open: state.sessions.is_open(&summary.quote_number),
                summary,
            })
            .collect(),
    ))
}

/// POST /api/quotes/:number/open
///
/// Unknown quote numbers start a new, unpriced quote.
pub async fn open_quote(
    State(state): State<AppState>,
    Path(quote_number): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    validate_quote_number(&quote_number)?;
    let catalog = state.current_catalog()?;

    if !state.sessions.is_open(&quote_number) {
        let snapshot = state
            .store
            .load(&quote_number)
            .await?
            .unwrap_or_else(|| QuoteSnapshot::empty(quote_number.clone()));

        let view = state
            .sessions
            .open(snapshot, catalog, |snapshot| state.writer.submit(snapshot));
        tracing::info!(
            quote_number = %quote_number,
            state = %view.state,
            "Opened quote"
        );
        return Ok(Json(view));
    }

    Ok(Json(state.sessions.view(&quote_number)?))
}

/// GET /api/quotes/:number
pub async fn get_quote(
    State(state): State<AppState>,
    Path(quote_number): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.view(&quote_number)?))
}

/// POST /api/quotes/:number/events
pub async fn apply_event(
    State(state): State<AppState>,
    Path(quote_number): Path<String>,
    payload: Result<Json<PricingEvent>, JsonRejection>,
) -> Result<Json<SessionView>, AppError> {
    let Json(event) = payload?;
    // Events reprice the quote; never against rates whose source is gone
    state.current_catalog()?;

    let view = state
        .sessions
        .apply(&quote_number, event, |snapshot| state.writer.submit(snapshot))?;
    Ok(Json(view))
}

/// GET /api/quotes/:number/totals
pub async fn get_totals(
    State(state): State<AppState>,
    Path(quote_number): Path<String>,
) -> Result<Json<DocumentTotals>, AppError> {
    Ok(Json(state.sessions.totals(&quote_number)?))
}

/// POST /api/quotes/:number/close
pub async fn close_quote(
    State(state): State<AppState>,
    Path(quote_number): Path<String>,
) -> Result<Json<CloseResponse>, AppError> {
    let snapshot = state
        .sessions
        .close(&quote_number)
        .ok_or_else(|| AppError::SessionNotOpen(quote_number.clone()))?;

    // Supersedes every snapshot still queued for the quote
    state.writer.persist(snapshot.clone()).await?;

    let totals = snapshot
        .prices
        .map(|prices| DocumentTotals::from_prices(&prices))
        .ok_or_else(|| AppError::InternalError("closed session has no prices".to_string()))?;

    tracing::info!(quote_number = %quote_number, "Closed quote");
    Ok(Json(CloseResponse { quote_number, totals }))
}

/// DELETE /api/quotes/:number
pub async fn delete_quote(
    State(state): State<AppState>,
    Path(quote_number): Path<String>,
) -> Result<StatusCode, AppError> {
    let was_open = state.sessions.close(&quote_number).is_some();
    let was_stored = state.writer.delete(&quote_number).await?;

    if !was_open && !was_stored {
        return Err(AppError::QuoteNotFound(quote_number));
    }

    tracing::info!(quote_number = %quote_number, "Deleted quote");
    Ok(StatusCode::NO_CONTENT)
}
