//! Command implementations for the CLI
//!
//! - start: Start the engine server
//! - test: Test configuration and catalog validity
//! - config: Configuration display and validation
//! - catalog: Show (and optionally import) the catalog
//! - calculate: Price a quote from a JSON file
//! - quotes: Inspect and delete stored quotes

pub mod calculate;
pub mod catalog;
pub mod config;
pub mod quotes;
pub mod start;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Color, ContentArrangement, Table};
use offerte_engine::config::{CatalogSourceKind, Config, StorageBackend};
use offerte_engine::db;
use offerte_engine::models::{DocumentTotals, EditablePriceSet, PriceField};
use offerte_engine::money::format_chf;
use sqlx::SqlitePool;

/// Open the database when the configuration stores anything in it
pub(crate) async fn database_pool(cfg: &Config) -> Result<Option<SqlitePool>> {
    if cfg.storage.backend == StorageBackend::Sqlite
        || cfg.catalog.source == CatalogSourceKind::Database
    {
        Ok(Some(db::connect(&cfg.storage.database_path).await?))
    } else {
        Ok(None)
    }
}

pub(crate) fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        header
            .iter()
            .map(|h| Cell::new(h).fg(Color::Cyan))
            .collect::<Vec<_>>(),
    );
    table
}

pub(crate) fn amount_cell(amount: f64) -> Cell {
    Cell::new(format_chf(amount)).set_alignment(CellAlignment::Right)
}

/// The nine price lines of a quote
pub(crate) fn price_table(prices: &EditablePriceSet) -> Table {
    let mut table = new_table(&["LINE", "AMOUNT"]);
    for field in PriceField::ALL {
        table.add_row(vec![Cell::new(field.label()), amount_cell(prices.get(field))]);
    }
    table
}

pub(crate) fn totals_table(totals: &DocumentTotals) -> Table {
    let mut table = new_table(&["TOTALS", "AMOUNT"]);
    table.add_row(vec![Cell::new("Zwischentotal"), amount_cell(totals.subtotal)]);
    table.add_row(vec![
        Cell::new(format!("Rabatt {}%", totals.discount_percent)),
        amount_cell(-totals.discount_amount),
    ]);
    table.add_row(vec![Cell::new("Netto"), amount_cell(totals.net_amount)]);
    table.add_row(vec![
        Cell::new(format!("MWST {:.1}%", totals.tax_rate * 100.0)),
        amount_cell(totals.tax_amount),
    ]);
    table.add_row(vec![
        Cell::new("Total").fg(Color::Green),
        amount_cell(totals.grand_total).fg(Color::Green),
    ]);
    table
}
