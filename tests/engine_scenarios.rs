//! End-to-end pricing scenarios against the shipped catalog

use offerte_engine::catalog::file::parse_catalog_toml;
use offerte_engine::catalog::Catalog;
use offerte_engine::models::{
    CategoryEntry, DocumentTotals, EditablePriceSet, ExpenseInputs, Overrides, PriceField,
    QuoteSnapshot,
};
use offerte_engine::money::round5;
use offerte_engine::pricing::compute;
use offerte_engine::session::{PricingEvent, QuoteSession, SessionState};
use std::sync::Arc;

fn catalog() -> Arc<Catalog> {
    Arc::new(parse_catalog_toml(include_str!("../catalog.toml")).expect("shipped catalog is valid"))
}

fn entries(a: u32, b: u32, c: u32) -> Vec<CategoryEntry> {
    vec![
        CategoryEntry::new("A", "EFH", a),
        CategoryEntry::new("B", "MFH", b),
        CategoryEntry::new("C", "Strassen", c),
    ]
}

#[test]
fn test_reference_scenario() {
    let catalog = catalog();
    let result = compute(
        &entries(2, 1, 4),
        &catalog.categories,
        &catalog.rates,
        &Overrides::default(),
        &ExpenseInputs::default(),
    );

    assert_eq!(result.total_object_count, 7);
    assert_eq!(result.survey.raw_quantity, 8.0);
    assert_eq!(result.survey.amount, 960.0);

    let prices = EditablePriceSet {
        subtotal: 2000.0,
        discount_percent: 10.0,
        ..EditablePriceSet::default()
    };
    let totals = DocumentTotals::from_prices(&prices);
    assert_eq!(totals.discount_amount, 200.0);
    assert_eq!(totals.net_amount, 1800.0);
    assert_eq!(totals.tax_amount, 145.80);
    assert_eq!(totals.grand_total, 1945.80);
}

#[test]
fn test_computed_subtotal_is_sum_of_lines() {
    let catalog = catalog();
    for (a, b, c) in [(0, 0, 0), (1, 0, 0), (3, 2, 11), (17, 5, 40)] {
        let expenses = ExpenseInputs {
            kilometers: 37.3,
            travel_time_hours: 1.25,
            meal_count: a,
            overnight_count: b,
            engagements: 2,
        };
        let result = compute(
            &entries(a, b, c),
            &catalog.categories,
            &catalog.rates,
            &Overrides::default(),
            &expenses,
        );
        let prices = result.price_set(0.0);
        assert_eq!(prices.subtotal, prices.line_items_total(), "counts {a}/{b}/{c}");

        for field in PriceField::ALL {
            let amount = prices.get(field);
            assert_eq!(round5(amount), amount, "{field} is not a multiple of 0.05");
        }
    }
}

#[test]
fn test_editing_session_round_trip() {
    let catalog = catalog();
    let mut snapshot = QuoteSnapshot::empty("2024-117");
    snapshot.category_entries = entries(2, 1, 4);

    let mut session = QuoteSession::open(snapshot, catalog.clone());
    assert_eq!(session.state(), SessionState::Computed);

    session
        .apply(PricingEvent::SetHoursOverride { value: Some(5.0) })
        .unwrap();
    assert_eq!(session.prices().aufnahme, round5(5.0 * 120.0));

    session
        .apply(PricingEvent::EditPrice { field: PriceField::Spesen, value: 112.42 })
        .unwrap();
    session.apply(PricingEvent::SetDiscount { percent: 10.0 }).unwrap();

    // Persist, close and reopen
    let stored = serde_json::to_string(&session.snapshot()).unwrap();
    let reopened = QuoteSession::open(serde_json::from_str(&stored).unwrap(), catalog.clone());

    assert_eq!(reopened.prices(), session.prices());
    assert_eq!(reopened.totals(), session.totals());
    assert!(reopened.manual_overrides().contains(PriceField::Spesen));
    assert!(reopened.manual_overrides().contains(PriceField::Subtotal));
    assert_eq!(reopened.state(), SessionState::Edited);

    // Structural change discards every manual value
    let mut reopened = reopened;
    reopened
        .apply(PricingEvent::SetCategoryEntries { entries: entries(2, 1, 4) })
        .unwrap();
    assert_eq!(reopened.state(), SessionState::Edited);

    reopened
        .apply(PricingEvent::SetCategoryEntries { entries: entries(2, 2, 4) })
        .unwrap();
    assert_eq!(reopened.state(), SessionState::Computed);
    assert_eq!(reopened.prices().aufnahme, round5(11.0 * 120.0));
    assert_eq!(reopened.overrides(), &Overrides::default());
    assert_eq!(reopened.prices().discount_percent, 10.0);
}

#[test]
fn test_empty_catalog_prices_nothing() {
    let mut catalog = (*catalog()).clone();
    catalog.categories.clear();

    let mut snapshot = QuoteSnapshot::empty("2024-118");
    snapshot.category_entries = entries(2, 1, 4);
    let session = QuoteSession::open(snapshot, Arc::new(catalog));

    assert!(session.category_entries().is_empty());
    assert_eq!(session.computed().total_object_count, 0);
    assert_eq!(session.prices().subtotal, 0.0);
    assert_eq!(session.totals().grand_total, 0.0);
}
