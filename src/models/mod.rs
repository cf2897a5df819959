pub mod category;
pub mod pricing;
pub mod quote;
pub mod rates;

pub use category::{reconcile_entries, sorted_categories, CategoryConfig, CategoryEntry};
pub use pricing::{
    ComputedResult, EditablePriceSet, ExpenseInputs, ManualOverrideSet, Overrides, PhaseResult,
    PriceField,
};
pub use quote::{DocumentTotals, QuoteSnapshot, QuoteSummary};
pub use rates::{BaseRates, PhaseRate};
