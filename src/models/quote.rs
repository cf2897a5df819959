use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::category::CategoryEntry;
use crate::models::pricing::{clamp_discount, EditablePriceSet, ExpenseInputs, Overrides};
use crate::money::{round5, TAX_RATE};

/// Persisted pricing record of one quote, keyed by its quote number
///
/// The manual-override marks are deliberately absent: they are re-derived by
/// comparing `prices` with a fresh computation when the quote is opened.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QuoteSnapshot {
    pub quote_number: String,
    #[serde(default)]
    pub category_entries: Vec<CategoryEntry>,
    #[serde(default)]
    pub expenses: ExpenseInputs,
    #[serde(default)]
    pub overrides: Overrides,
    /// `None` until the quote has been priced once
    #[serde(default)]
    pub prices: Option<EditablePriceSet>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl QuoteSnapshot {
    /// A quote that has never been priced
    pub fn empty(quote_number: impl Into<String>) -> Self {
        Self {
            quote_number: quote_number.into(),
            category_entries: Vec::new(),
            expenses: ExpenseInputs::default(),
            overrides: Overrides::default(),
            prices: None,
            updated_at: Utc::now(),
        }
    }
}

/// Listing row for stored quotes
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QuoteSummary {
    pub quote_number: String,
    pub total_object_count: u64,
    pub subtotal: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl From<&QuoteSnapshot> for QuoteSummary {
    fn from(snapshot: &QuoteSnapshot) -> Self {
        Self {
            quote_number: snapshot.quote_number.clone(),
            total_object_count: snapshot
                .category_entries
                .iter()
                .map(|e| u64::from(e.count))
                .sum(),
            subtotal: snapshot.prices.map(|p| p.subtotal),
            updated_at: snapshot.updated_at,
        }
    }
}

/// Final figures handed to document generation
///
/// All amounts are already rounded to 0.05 and must be printed verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct DocumentTotals {
    pub subtotal: f64,
    pub discount_percent: f64,
    pub discount_amount: f64,
    pub net_amount: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub grand_total: f64,
}

impl DocumentTotals {
    pub fn from_prices(prices: &EditablePriceSet) -> Self {
        let subtotal = round5(prices.subtotal);
        let discount_percent = clamp_discount(prices.discount_percent);
        let discount_amount = round5(subtotal * discount_percent / 100.0);
        let net_amount = round5(subtotal - discount_amount);
        let tax_amount = round5(net_amount * TAX_RATE);
        let grand_total = round5(net_amount + tax_amount);

        Self {
            subtotal,
            discount_percent,
            discount_amount,
            net_amount,
            tax_rate: TAX_RATE,
            tax_amount,
            grand_total,
        }
    }
}
