use anyhow::{bail, Result};
use colored::Colorize;
use comfy_table::{Cell, CellAlignment};
use offerte_engine::config::{self, StorageBackend};
use offerte_engine::models::DocumentTotals;
use offerte_engine::money::format_chf;
use offerte_engine::store::{build_quote_store, QuoteStore};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::{database_pool, new_table, price_table, totals_table};

async fn open_store(config_path: &Path) -> Result<Arc<dyn QuoteStore>> {
    let cfg = config::load_config(config_path)?;
    if cfg.storage.backend == StorageBackend::Memory {
        bail!("storage.backend is 'memory': quotes only live inside a running engine");
    }
    let pool = database_pool(&cfg).await?;
    Ok(build_quote_store(&cfg.storage, pool)?)
}

/// Execute the quotes list command
pub async fn list(config_path: &Path) -> Result<()> {
    let store = open_store(config_path).await?;
    let quotes = store.list().await?;

    if quotes.is_empty() {
        println!("{}", "No stored quotes".yellow());
        return Ok(());
    }

    let mut table = new_table(&["QUOTE", "OBJECTS", "SUBTOTAL", "UPDATED"]);
    for quote in &quotes {
        table.add_row(vec![
            Cell::new(&quote.quote_number),
            Cell::new(quote.total_object_count).set_alignment(CellAlignment::Right),
            Cell::new(quote.subtotal.map(format_chf).unwrap_or_else(|| "-".to_string()))
                .set_alignment(CellAlignment::Right),
            Cell::new(quote.updated_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    println!("{}", table);
    println!("\nTotal: {} quotes", quotes.len());
    Ok(())
}

/// Execute the quotes show command
///
/// Shows stored values only; manual marks are derived when a quote is opened
/// in the engine and are therefore not listed here.
pub async fn show(config_path: &Path, quote_number: &str) -> Result<()> {
    let store = open_store(config_path).await?;
    let Some(snapshot) = store.load(quote_number).await? else {
        bail!("Quote not found: {}", quote_number);
    };

    println!("{} {}", "Quote".bold(), snapshot.quote_number);
    println!("Updated: {}", snapshot.updated_at.format("%Y-%m-%d %H:%M:%S"));
    println!();

    let mut objects = new_table(&["CATEGORY", "COUNT"]);
    for entry in &snapshot.category_entries {
        objects.add_row(vec![
            Cell::new(&entry.title),
            Cell::new(entry.count).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{}", objects);

    if let Some(hours) = snapshot.overrides.hours_override {
        println!("Survey hours override: {:.2}", hours);
    }
    if let Some(units) = snapshot.overrides.binding_quantity_override {
        println!("Binding quantity override: {:.2}", units);
    }
    println!();

    match snapshot.prices {
        Some(prices) => {
            println!("{}", price_table(&prices));
            println!();
            println!("{}", totals_table(&DocumentTotals::from_prices(&prices)));
        }
        None => println!("{}", "Not priced yet".yellow()),
    }
    Ok(())
}

/// Execute the quotes delete command
pub async fn delete(config_path: &Path, quote_number: &str) -> Result<()> {
    let store = open_store(config_path).await?;

    if store.delete(quote_number).await? {
        info!(quote_number = %quote_number, "Deleted stored quote");
        println!("{} {}", "✓ Deleted quote".green(), quote_number);
        Ok(())
    } else {
        bail!("Quote not found: {}", quote_number)
    }
}
