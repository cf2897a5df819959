use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::catalog::Catalog;
use crate::models::{
    BaseRates, CategoryConfig, CategoryEntry, ComputedResult, ExpenseInputs, Overrides, PhaseRate,
    PhaseResult, PriceField,
};
use crate::money::{round5, sanitize};

/// Compute the itemized price breakdown of a quote
///
/// Pure and deterministic. Out-of-range input is clamped rather than
/// rejected:
/// - entries whose category is not configured are ignored
/// - negative or non-finite overrides fall back to the computed quantity
/// - expense inputs are normalized (negatives become 0, engagements 1..=4)
///
/// Every phase amount is rounded to 0.05 on its own before the subtotal is
/// summed and rounded again.
pub fn compute(
    entries: &[CategoryEntry],
    categories: &[CategoryConfig],
    rates: &BaseRates,
    overrides: &Overrides,
    expenses: &ExpenseInputs,
) -> ComputedResult {
    let allowances: HashMap<&str, f64> = categories
        .iter()
        .map(|c| (c.id.as_str(), sanitize(c.unit_time_allowance_hours)))
        .collect();

    let mut total_object_count: u64 = 0;
    let mut category_hours = 0.0;
    for entry in entries {
        match allowances.get(entry.category_id.as_str()) {
            Some(allowance) => {
                total_object_count += u64::from(entry.count);
                category_hours += f64::from(entry.count) * allowance;
            }
            None => {
                tracing::debug!(
                    category_id = %entry.category_id,
                    count = entry.count,
                    "Ignoring entry for unconfigured category"
                );
            }
        }
    }

    let basics = hourly_phase(&rates.basics, total_object_count);
    let scheduling = hourly_phase(&rates.scheduling, total_object_count);
    let report = hourly_phase(&rates.report, total_object_count);
    let control = hourly_phase(&rates.control, total_object_count);
    let closing = hourly_phase(&rates.closing, total_object_count);
    let survey = survey_phase(rates, total_object_count, category_hours, overrides);
    let material = material_phase(rates, total_object_count, overrides);
    let expenses = expense_phase(rates, total_object_count, &expenses.normalized());

    let mut result = ComputedResult {
        total_object_count,
        basics,
        scheduling,
        survey,
        report,
        control,
        closing,
        material,
        expenses,
        subtotal: 0.0,
    };
    result.subtotal = round5(
        PriceField::LINE_ITEMS
            .iter()
            .map(|field| result.amount(*field))
            .sum(),
    );

    result
}

/// Fixed plus per-object hours; an empty quote has no hours at all
fn hourly_phase(rate: &PhaseRate, object_count: u64) -> PhaseResult {
    let hours = if object_count == 0 {
        0.0
    } else {
        sanitize(rate.hours_for(object_count))
    };

    PhaseResult {
        raw_quantity: hours,
        effective_quantity: hours,
        amount: round5(hours * sanitize(rate.hourly_rate)),
    }
}

fn survey_phase(
    rates: &BaseRates,
    object_count: u64,
    category_hours: f64,
    overrides: &Overrides,
) -> PhaseResult {
    let base = hourly_phase(&rates.survey, object_count).raw_quantity;
    let raw_hours = category_hours + base;
    let effective_hours = overrides.hours().unwrap_or(raw_hours);

    PhaseResult {
        raw_quantity: raw_hours,
        effective_quantity: effective_hours,
        amount: round5(effective_hours * sanitize(rates.survey.hourly_rate)),
    }
}

/// One binding unit per object plus the USB medium
fn material_phase(rates: &BaseRates, object_count: u64, overrides: &Overrides) -> PhaseResult {
    let raw_units = object_count as f64;
    let override_units = overrides.binding_quantity();
    let effective_units = override_units.unwrap_or(raw_units);

    let amount = if object_count == 0 && override_units.is_none() {
        0.0
    } else {
        round5(sanitize(rates.usb_flat_fee) + effective_units * sanitize(rates.binding_unit_price))
    };

    PhaseResult {
        raw_quantity: raw_units,
        effective_quantity: effective_units,
        amount,
    }
}

/// Travel, meals, overnight stays and the per-engagement flat fee
///
/// Each term is rounded before summation so that the printed breakdown adds
/// up to the printed total.
fn expense_phase(rates: &BaseRates, object_count: u64, expenses: &ExpenseInputs) -> PhaseResult {
    let engagements = if object_count > 0 || expenses.has_travel() {
        f64::from(expenses.engagements)
    } else {
        0.0
    };

    let terms = [
        expenses.kilometers * sanitize(rates.travel_per_km),
        expenses.travel_time_hours * sanitize(rates.travel_hourly_rate),
        f64::from(expenses.meal_count) * sanitize(rates.meal_unit_price),
        f64::from(expenses.overnight_count) * sanitize(rates.overnight_unit_price),
        engagements * sanitize(rates.engagement_flat_fee),
    ];
    let amount = round5(terms.iter().map(|term| round5(*term)).sum());

    PhaseResult {
        raw_quantity: engagements,
        effective_quantity: engagements,
        amount,
    }
}

/// Calculator bound to one catalog snapshot
#[derive(Debug, Clone)]
pub struct CostCalculator {
    catalog: Arc<Catalog>,
}

impl CostCalculator {
    /// Create a new cost calculator
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Calculate a quote against this calculator's catalog
    pub fn calculate(
        &self,
        entries: &[CategoryEntry],
        overrides: &Overrides,
        expenses: &ExpenseInputs,
    ) -> ComputedResult {
        let start = Instant::now();
        let result = compute(
            entries,
            &self.catalog.categories,
            &self.catalog.rates,
            overrides,
            expenses,
        );

        crate::metrics::record_calculation(start.elapsed());
        tracing::debug!(
            objects = result.total_object_count,
            survey_hours = result.survey.effective_quantity,
            subtotal = result.subtotal,
            "Calculated quote"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::round5;
    use crate::test_support::{sample_catalog, sample_categories, sample_entries, sample_rates};

    fn survey_only_rates() -> BaseRates {
        let mut rates = sample_rates();
        rates.survey = PhaseRate { hourly_rate: 120.0, base_hours: 0.0, hours_per_object: 0.0 };
        rates
    }

    #[test]
    fn test_end_to_end_survey_amount() {
        let result = compute(
            &sample_entries(),
            &sample_categories(),
            &survey_only_rates(),
            &Overrides::default(),
            &ExpenseInputs::default(),
        );

        assert_eq!(result.total_object_count, 7);
        assert_eq!(result.survey.raw_quantity, 8.0);
        assert_eq!(result.survey.effective_quantity, 8.0);
        assert_eq!(result.survey.amount, 960.0);
    }

    #[test]
    fn test_all_phases_with_sample_rates() {
        let result = compute(
            &sample_entries(),
            &sample_categories(),
            &sample_rates(),
            &Overrides::default(),
            &ExpenseInputs::default(),
        );

        // 1.0h * 140
        assert_eq!(result.basics.amount, 140.0);
        // (0.5 + 0.7)h * 95 = 114.0
        assert_eq!(result.scheduling.amount, 114.0);
        // (1.0 + 5.25)h * 120 = 750.0
        assert_eq!(result.report.amount, 750.0);
        // 1.75h * 140 = 245.0
        assert_eq!(result.control.amount, 245.0);
        // 0.5h * 95 = 47.5
        assert_eq!(result.closing.amount, 47.5);
        // 25 + 7 * 18.5 = 154.5
        assert_eq!(result.material.amount, 154.5);
        assert_eq!(result.material.raw_quantity, 7.0);
        // one engagement, no travel
        assert_eq!(result.expenses.amount, 45.0);
        assert_eq!(
            result.subtotal,
            round5(140.0 + 114.0 + 960.0 + 750.0 + 245.0 + 47.5 + 154.5 + 45.0)
        );
    }

    #[test]
    fn test_subtotal_is_rounded_sum_of_lines() {
        let mut rates = sample_rates();
        rates.scheduling.hourly_rate = 97.33;
        rates.binding_unit_price = 17.37;
        let expenses = ExpenseInputs {
            kilometers: 83.0,
            travel_time_hours: 1.3,
            meal_count: 3,
            overnight_count: 1,
            engagements: 2,
        };

        let result = compute(
            &sample_entries(),
            &sample_categories(),
            &rates,
            &Overrides::default(),
            &expenses,
        );
        let prices = result.price_set(0.0);

        assert_eq!(prices.subtotal, prices.line_items_total());
        for field in PriceField::ALL {
            let steps = result.amount(field) * 20.0;
            assert!((steps - steps.round()).abs() < 1e-9, "{} not a 0.05 multiple", field);
        }
    }

    #[test]
    fn test_expense_terms_rounded_individually() {
        let mut rates = sample_rates();
        rates.travel_per_km = 0.7;
        rates.travel_hourly_rate = 0.0;
        rates.meal_unit_price = 10.01;
        rates.engagement_flat_fee = 0.0;
        let expenses = ExpenseInputs {
            kilometers: 10.5,
            travel_time_hours: 0.0,
            meal_count: 1,
            overnight_count: 0,
            engagements: 1,
        };

        let result = compute(
            &sample_entries(),
            &sample_categories(),
            &rates,
            &Overrides::default(),
            &expenses,
        );

        // 7.35 + round5(10.01) = 7.35 + 10.00
        assert_eq!(result.expenses.amount, 17.35);
    }

    #[test]
    fn test_engagement_fee_scales_with_engagements() {
        let expenses = ExpenseInputs { engagements: 3, ..ExpenseInputs::default() };
        let result = compute(
            &sample_entries(),
            &sample_categories(),
            &sample_rates(),
            &Overrides::default(),
            &expenses,
        );
        assert_eq!(result.expenses.amount, 135.0);
        assert_eq!(result.expenses.effective_quantity, 3.0);
    }

    #[test]
    fn test_hours_override_takes_precedence() {
        let overrides = Overrides { hours_override: Some(5.0), binding_quantity_override: None };
        let result = compute(
            &sample_entries(),
            &sample_categories(),
            &survey_only_rates(),
            &overrides,
            &ExpenseInputs::default(),
        );

        assert_eq!(result.survey.raw_quantity, 8.0);
        assert_eq!(result.survey.effective_quantity, 5.0);
        assert_eq!(result.survey.amount, round5(5.0 * 120.0));
        assert!(result.survey.is_overridden());
    }

    #[test]
    fn test_negative_override_falls_back_to_raw() {
        let overrides = Overrides {
            hours_override: Some(-1.0),
            binding_quantity_override: Some(-3.0),
        };
        let result = compute(
            &sample_entries(),
            &sample_categories(),
            &survey_only_rates(),
            &overrides,
            &ExpenseInputs::default(),
        );

        assert_eq!(result.survey.amount, 960.0);
        assert_eq!(result.material.effective_quantity, 7.0);
    }

    #[test]
    fn test_binding_override() {
        let overrides = Overrides { hours_override: None, binding_quantity_override: Some(2.0) };
        let result = compute(
            &sample_entries(),
            &sample_categories(),
            &sample_rates(),
            &overrides,
            &ExpenseInputs::default(),
        );

        assert_eq!(result.material.raw_quantity, 7.0);
        assert_eq!(result.material.amount, 62.0);
    }

    #[test]
    fn test_empty_catalog_is_all_zero() {
        let result = compute(
            &sample_entries(),
            &[],
            &sample_rates(),
            &Overrides::default(),
            &ExpenseInputs::default(),
        );

        assert_eq!(result.total_object_count, 0);
        for field in PriceField::ALL {
            assert_eq!(result.amount(field), 0.0, "{} should be zero", field);
        }
    }

    #[test]
    fn test_zero_counts_is_all_zero() {
        let entries: Vec<CategoryEntry> = sample_entries()
            .into_iter()
            .map(|mut e| {
                e.count = 0;
                e
            })
            .collect();

        let result = compute(
            &entries,
            &sample_categories(),
            &sample_rates(),
            &Overrides::default(),
            &ExpenseInputs::default(),
        );

        assert_eq!(result.total_object_count, 0);
        assert_eq!(result.subtotal, 0.0);
        assert_eq!(result.material.amount, 0.0);
        assert_eq!(result.expenses.amount, 0.0);
    }

    #[test]
    fn test_unknown_category_ignored() {
        let mut entries = sample_entries();
        entries.push(CategoryEntry::new("Z", "Unbekannt", 10));

        let result = compute(
            &entries,
            &sample_categories(),
            &survey_only_rates(),
            &Overrides::default(),
            &ExpenseInputs::default(),
        );
        assert_eq!(result.total_object_count, 7);
        assert_eq!(result.survey.amount, 960.0);
    }

    #[test]
    fn test_calculator_uses_catalog() {
        let calculator = CostCalculator::new(Arc::new(sample_catalog()));
        let result = calculator.calculate(
            &sample_entries(),
            &Overrides::default(),
            &ExpenseInputs::default(),
        );
        assert_eq!(result.survey.amount, 960.0);
    }
}
