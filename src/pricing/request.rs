use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::models::{
    reconcile_entries, CategoryEntry, ComputedResult, DocumentTotals, EditablePriceSet,
    ExpenseInputs, Overrides,
};
use crate::pricing::CostCalculator;

/// Inputs of a one-off calculation that is not tied to a stored quote
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CalculationRequest {
    #[serde(default)]
    pub category_entries: Vec<CategoryEntry>,
    #[serde(default)]
    pub overrides: Overrides,
    #[serde(default)]
    pub expenses: ExpenseInputs,
    #[serde(default)]
    pub discount_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Calculation {
    /// Entries aligned with the catalog, in display order
    pub category_entries: Vec<CategoryEntry>,
    pub computed: ComputedResult,
    pub prices: EditablePriceSet,
    pub totals: DocumentTotals,
}

impl CalculationRequest {
    pub fn evaluate(&self, catalog: Arc<Catalog>) -> Calculation {
        let category_entries = reconcile_entries(&self.category_entries, &catalog.categories);
        let computed = CostCalculator::new(catalog).calculate(
            &category_entries,
            &self.overrides,
            &self.expenses,
        );
        let prices = computed.price_set(self.discount_percent);
        let totals = DocumentTotals::from_prices(&prices);

        Calculation {
            category_entries,
            computed,
            prices,
            totals,
        }
    }
}
