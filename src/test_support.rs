//! Shared fixtures for unit tests

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{Catalog, FileCatalogSource};
use crate::persistence::DebouncedWriter;
use crate::state::AppState;
use crate::store::{MemoryQuoteStore, QuoteStore};
use crate::models::{BaseRates, CategoryConfig, CategoryEntry, PhaseRate};

/// The shipped `catalog.toml`; describes the same catalog as [`sample_catalog`]
/// apart from category descriptions
pub const SAMPLE_CATALOG_TOML: &str = include_str!("../catalog.toml");

pub fn category(id: &str, title: &str, sort_order: i64, allowance: f64) -> CategoryConfig {
    CategoryConfig {
        id: id.to_string(),
        title: title.to_string(),
        sort_order,
        unit_time_allowance_hours: allowance,
        description: None,
    }
}

/// EFH 1.5h, MFH 3.0h, Strassen 0.5h
pub fn sample_categories() -> Vec<CategoryConfig> {
    vec![
        category("A", "EFH", 1, 1.5),
        category("B", "MFH", 2, 3.0),
        category("C", "Strassen", 3, 0.5),
    ]
}

pub fn sample_rates() -> BaseRates {
    BaseRates {
        basics: PhaseRate { hourly_rate: 140.0, base_hours: 1.0, hours_per_object: 0.0 },
        scheduling: PhaseRate { hourly_rate: 95.0, base_hours: 0.5, hours_per_object: 0.1 },
        survey: PhaseRate { hourly_rate: 120.0, base_hours: 0.0, hours_per_object: 0.0 },
        report: PhaseRate { hourly_rate: 120.0, base_hours: 1.0, hours_per_object: 0.75 },
        control: PhaseRate { hourly_rate: 140.0, base_hours: 0.0, hours_per_object: 0.25 },
        closing: PhaseRate { hourly_rate: 95.0, base_hours: 0.5, hours_per_object: 0.0 },
        usb_flat_fee: 25.0,
        binding_unit_price: 18.5,
        travel_per_km: 0.75,
        travel_hourly_rate: 95.0,
        meal_unit_price: 30.0,
        overnight_unit_price: 160.0,
        engagement_flat_fee: 45.0,
    }
}

pub fn sample_catalog() -> Catalog {
    Catalog {
        categories: sample_categories(),
        rates: sample_rates(),
    }
}

/// A=2, B=1, C=4
pub fn sample_entries() -> Vec<CategoryEntry> {
    vec![
        CategoryEntry::new("A", "EFH", 2),
        CategoryEntry::new("B", "MFH", 1),
        CategoryEntry::new("C", "Strassen", 4),
    ]
}

/// App state over an in-memory store, without a loaded catalog
///
/// Must be called inside a tokio runtime (spawns the snapshot writer).
pub fn test_state_without_catalog() -> AppState {
    let store: Arc<dyn QuoteStore> = Arc::new(MemoryQuoteStore::new());
    let writer = DebouncedWriter::spawn(store.clone(), Duration::from_millis(10));
    let source = FileCatalogSource::new(concat!(env!("CARGO_MANIFEST_DIR"), "/catalog.toml"));
    AppState::new(Arc::new(source), store, writer)
}

/// App state with [`sample_catalog`] loaded
pub fn test_state() -> AppState {
    let state = test_state_without_catalog();
    state.catalog.store(Some(Arc::new(sample_catalog())));
    state
}
