//! Quote editing session
//!
//! One [`QuoteSession`] per open quote owns the pricing state
//! `(EditablePriceSet, ManualOverrideSet, Overrides)`. Inputs arrive as
//! [`PricingEvent`]s; each event moves the session to its next state
//! deterministically and the caller persists [`QuoteSession::snapshot`].

pub mod registry;

pub use registry::SessionRegistry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::AppError;
use crate::models::{
    reconcile_entries, CategoryEntry, ComputedResult, DocumentTotals, EditablePriceSet,
    ExpenseInputs, ManualOverrideSet, Overrides, PriceField, QuoteSnapshot,
};
use crate::models::pricing::clamp_discount;
use crate::money::{differs, round5, sanitize};
use crate::pricing::CostCalculator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Quote has never been priced; a session leaves it when it is opened
    Uninitialized,
    /// Every price line equals the computed proposal
    Computed,
    /// At least one price line holds a human-entered value
    Edited,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Computed => "computed",
            SessionState::Edited => "edited",
        };
        f.write_str(name)
    }
}

/// Input to a quote session
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PricingEvent {
    /// Change the object count of one configured category
    SetCategoryCount {
        category_id: String,
        #[serde(deserialize_with = "crate::models::category::deserialize_count")]
        count: u32,
    },
    /// Replace all category counts
    SetCategoryEntries { entries: Vec<CategoryEntry> },
    SetExpenses { expenses: ExpenseInputs },
    /// Direct edit of one price line
    EditPrice { field: PriceField, value: f64 },
    SetDiscount { percent: f64 },
    SetHoursOverride { value: Option<f64> },
    SetBindingOverride { value: Option<f64> },
    /// Categories or rates were reloaded
    #[serde(skip)]
    CatalogReloaded(Arc<Catalog>),
}

impl PricingEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PricingEvent::SetCategoryCount { .. } => "set_category_count",
            PricingEvent::SetCategoryEntries { .. } => "set_category_entries",
            PricingEvent::SetExpenses { .. } => "set_expenses",
            PricingEvent::EditPrice { .. } => "edit_price",
            PricingEvent::SetDiscount { .. } => "set_discount",
            PricingEvent::SetHoursOverride { .. } => "set_hours_override",
            PricingEvent::SetBindingOverride { .. } => "set_binding_override",
            PricingEvent::CatalogReloaded(_) => "catalog_reloaded",
        }
    }
}

/// Read-only projection of a session, as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub quote_number: String,
    pub state: SessionState,
    pub category_entries: Vec<CategoryEntry>,
    pub expenses: ExpenseInputs,
    pub overrides: Overrides,
    pub computed: ComputedResult,
    pub prices: EditablePriceSet,
    pub manual_overrides: ManualOverrideSet,
    pub totals: DocumentTotals,
    pub updated_at: DateTime<Utc>,
}

pub struct QuoteSession {
    quote_number: String,
    calculator: CostCalculator,
    entries: Vec<CategoryEntry>,
    expenses: ExpenseInputs,
    overrides: Overrides,
    computed: ComputedResult,
    prices: EditablePriceSet,
    marks: ManualOverrideSet,
    updated_at: DateTime<Utc>,
}

impl QuoteSession {
    /// Open a session from its persisted snapshot
    ///
    /// Without persisted prices the quote is priced from scratch. With
    /// persisted prices they are adopted and every line that differs from a
    /// fresh computation is marked as manual. Entries are reconciled with
    /// the catalog first; if that changes any count the quote is reset.
    pub fn open(snapshot: QuoteSnapshot, catalog: Arc<Catalog>) -> Self {
        let entries = reconcile_entries(&snapshot.category_entries, &catalog.categories);
        let counts_changed = !same_counts(&snapshot.category_entries, &entries);

        let mut session = Self {
            quote_number: snapshot.quote_number,
            calculator: CostCalculator::new(catalog),
            entries,
            expenses: snapshot.expenses.normalized(),
            overrides: snapshot.overrides.normalized(),
            computed: ComputedResult::default(),
            prices: EditablePriceSet::default(),
            marks: ManualOverrideSet::new(),
            updated_at: snapshot.updated_at,
        };

        match snapshot.prices {
            Some(prices) if !counts_changed => {
                session.recompute();
                session.prices = prices;
                session.prices.discount_percent = clamp_discount(prices.discount_percent);
                session.marks = ManualOverrideSet::derive(&session.prices, &session.computed);
            }
            Some(prices) => {
                tracing::info!(
                    quote_number = %session.quote_number,
                    "Category configuration changed since last save, repricing quote"
                );
                session.prices.discount_percent = clamp_discount(prices.discount_percent);
                session.structural_reset();
                session.touch();
            }
            None => {
                session.structural_reset();
                session.touch();
                crate::metrics::record_transition(
                    "open",
                    SessionState::Uninitialized,
                    session.state(),
                );
            }
        }

        tracing::debug!(
            quote_number = %session.quote_number,
            state = %session.state(),
            manual = session.marks.len(),
            "Opened quote session"
        );
        session
    }

    pub fn quote_number(&self) -> &str {
        &self.quote_number
    }

    pub fn state(&self) -> SessionState {
        if self.marks.is_empty() {
            SessionState::Computed
        } else {
            SessionState::Edited
        }
    }

    pub fn prices(&self) -> &EditablePriceSet {
        &self.prices
    }

    pub fn computed(&self) -> &ComputedResult {
        &self.computed
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    pub fn manual_overrides(&self) -> &ManualOverrideSet {
        &self.marks
    }

    pub fn category_entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.calculator.catalog()
    }

    /// Apply one event
    ///
    /// Returns `Ok(false)` when the event leaves the state unchanged, in
    /// which case there is nothing to persist.
    pub fn apply(&mut self, event: PricingEvent) -> Result<bool, AppError> {
        let kind = event.kind();
        let from = self.state();

        let changed = match event {
            PricingEvent::SetCategoryCount { category_id, count } => {
                let mut entries = self.entries.clone();
                let entry = entries
                    .iter_mut()
                    .find(|e| e.category_id == category_id)
                    .ok_or_else(|| {
                        AppError::InvalidInput(format!("unknown category: {}", category_id))
                    })?;
                entry.count = count;
                self.replace_entries(entries)
            }
            PricingEvent::SetCategoryEntries { entries } => {
                let entries = reconcile_entries(&entries, &self.catalog().categories);
                self.replace_entries(entries)
            }
            PricingEvent::SetExpenses { expenses } => {
                let expenses = expenses.normalized();
                if expenses == self.expenses {
                    false
                } else {
                    self.expenses = expenses;
                    self.structural_reset();
                    true
                }
            }
            PricingEvent::EditPrice { field, value } => {
                self.edit_price(field, value);
                true
            }
            PricingEvent::SetDiscount { percent } => {
                let percent = clamp_discount(percent);
                let changed = percent != self.prices.discount_percent;
                self.prices.discount_percent = percent;
                changed
            }
            PricingEvent::SetHoursOverride { value } => {
                self.set_override(PriceField::Aufnahme, |o| o.hours_override = value)
            }
            PricingEvent::SetBindingOverride { value } => {
                self.set_override(PriceField::Material, |o| o.binding_quantity_override = value)
            }
            PricingEvent::CatalogReloaded(catalog) => self.reload_catalog(catalog),
        };

        if changed {
            self.touch();
            crate::metrics::record_transition(kind, from, self.state());
            tracing::debug!(
                quote_number = %self.quote_number,
                event = kind,
                from = %from,
                to = %self.state(),
                "Applied pricing event"
            );
        }

        Ok(changed)
    }

    /// Persistable projection of the current state
    pub fn snapshot(&self) -> QuoteSnapshot {
        QuoteSnapshot {
            quote_number: self.quote_number.clone(),
            category_entries: self.entries.clone(),
            expenses: self.expenses,
            overrides: self.overrides,
            prices: Some(self.prices),
            updated_at: self.updated_at,
        }
    }

    pub fn totals(&self) -> DocumentTotals {
        DocumentTotals::from_prices(&self.prices)
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            quote_number: self.quote_number.clone(),
            state: self.state(),
            category_entries: self.entries.clone(),
            expenses: self.expenses,
            overrides: self.overrides,
            computed: self.computed.clone(),
            prices: self.prices,
            manual_overrides: self.marks.clone(),
            totals: self.totals(),
            updated_at: self.updated_at,
        }
    }

    fn replace_entries(&mut self, entries: Vec<CategoryEntry>) -> bool {
        if same_counts(&entries, &self.entries) {
            // Titles may still have been refreshed
            self.entries = entries;
            return false;
        }
        self.entries = entries;
        self.structural_reset();
        true
    }

    /// Reprice from scratch: all nine lines take the computed values, marks
    /// and overrides are cleared. The discount is kept.
    fn structural_reset(&mut self) {
        self.overrides = Overrides::default();
        self.recompute();
        self.prices = self.computed.price_set(self.prices.discount_percent);
        self.marks.clear();
    }

    fn recompute(&mut self) {
        self.computed = self
            .calculator
            .calculate(&self.entries, &self.overrides, &self.expenses);
    }

    fn edit_price(&mut self, field: PriceField, value: f64) {
        self.prices.set(field, round5(sanitize(value)));
        self.marks.mark(field);
        if field != PriceField::Subtotal {
            self.refresh_subtotal();
        }
    }

    /// Replace one quantity override and reprice the line it drives
    ///
    /// Re-sending the active value is a no-op unless the line has since been
    /// edited away from it.
    fn set_override(&mut self, field: PriceField, update: impl FnOnce(&mut Overrides)) -> bool {
        let previous = self.overrides;
        update(&mut self.overrides);
        self.overrides = self.overrides.normalized();

        let active = match field {
            PriceField::Aufnahme => self.overrides.hours().is_some(),
            _ => self.overrides.binding_quantity().is_some(),
        };
        let line_diverged = differs(self.prices.get(field), self.computed.amount(field));
        if self.overrides == previous && !(active && line_diverged) {
            return false;
        }

        self.recompute();
        if active {
            self.write_computed_line(field);
        }
        true
    }

    /// Copy one line from the computed result and mark it as manual
    fn write_computed_line(&mut self, field: PriceField) {
        self.prices.set(field, self.computed.amount(field));
        self.marks.mark(field);
        self.refresh_subtotal();
    }

    /// Subtotal follows the line items; it is marked only if it moved
    fn refresh_subtotal(&mut self) {
        let previous = self.prices.subtotal;
        self.prices.subtotal = self.prices.line_items_total();
        if differs(previous, self.prices.subtotal) {
            self.marks.mark(PriceField::Subtotal);
        }
    }

    fn reload_catalog(&mut self, catalog: Arc<Catalog>) -> bool {
        let entries = reconcile_entries(&self.entries, &catalog.categories);
        let counts_changed = !same_counts(&self.entries, &entries);
        self.calculator = CostCalculator::new(catalog);
        self.entries = entries;

        if counts_changed {
            self.structural_reset();
            return true;
        }

        let before = (self.computed.clone(), self.marks.clone());
        self.recompute();
        let differing = ManualOverrideSet::derive(&self.prices, &self.computed);
        self.marks.extend(&differing);
        before != (self.computed.clone(), self.marks.clone())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Whether two entry lists charge the same objects
///
/// Zero counts and titles are irrelevant.
fn same_counts(a: &[CategoryEntry], b: &[CategoryEntry]) -> bool {
    fn counts(entries: &[CategoryEntry]) -> HashMap<&str, u32> {
        entries
            .iter()
            .filter(|e| e.count > 0)
            .map(|e| (e.category_id.as_str(), e.count))
            .collect()
    }
    counts(a) == counts(b)
}
