use anyhow::{bail, Result};
use colored::Colorize;
use comfy_table::{Cell, CellAlignment};
use offerte_engine::catalog::{build_catalog_source, file::parse_catalog_toml, SqliteCatalogSource};
use offerte_engine::config::{self, CatalogSourceKind};
use offerte_engine::money::format_chf;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{database_pool, new_table};

/// Execute the catalog command
///
/// With `import`, the TOML file is written into the database catalog first.
pub async fn execute(config_path: &Path, import: Option<PathBuf>) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    let pool = database_pool(&cfg).await?;

    if let Some(path) = import {
        let Some(pool) = pool.clone() else {
            bail!("Catalog import needs the sqlite storage backend");
        };
        let content = tokio::fs::read_to_string(&path).await?;
        let catalog = parse_catalog_toml(&content)?;
        SqliteCatalogSource::new(pool).import(&catalog).await?;

        println!(
            "{} {} categories from {}",
            "✓ Imported".green(),
            catalog.categories.len(),
            path.display()
        );
        if cfg.catalog.source != CatalogSourceKind::Database {
            println!(
                "  {}",
                "Note: catalog.source is 'file', the engine will not read the database catalog".yellow()
            );
        }
        println!();
    }

    let source = build_catalog_source(&cfg.catalog, pool)?;
    let catalog = source.load().await?;
    info!("Displaying catalog from {}", source.describe());

    println!("{} {}", "Catalog source:".bold(), source.describe());
    println!();

    let mut categories = new_table(&["ID", "TITLE", "ORDER", "HOURS/OBJECT", "DESCRIPTION"]);
    for category in catalog.sorted_categories() {
        categories.add_row(vec![
            Cell::new(&category.id),
            Cell::new(&category.title),
            Cell::new(category.sort_order).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", category.unit_time_allowance_hours))
                .set_alignment(CellAlignment::Right),
            Cell::new(category.description.as_deref().unwrap_or("")),
        ]);
    }
    println!("Categories:");
    println!("{}", categories);
    println!();

    let mut phases = new_table(&["PHASE", "RATE/HOUR", "BASE HOURS", "HOURS/OBJECT"]);
    for (name, rate) in catalog.rates.phases() {
        phases.add_row(vec![
            Cell::new(name),
            Cell::new(format_chf(rate.hourly_rate)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", rate.base_hours)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", rate.hours_per_object)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("Phase rates:");
    println!("{}", phases);
    println!();

    let rates = &catalog.rates;
    let mut fees = new_table(&["FEE", "AMOUNT"]);
    for (name, value) in [
        ("USB flat fee", rates.usb_flat_fee),
        ("Binding per unit", rates.binding_unit_price),
        ("Travel per km", rates.travel_per_km),
        ("Travel per hour", rates.travel_hourly_rate),
        ("Meal", rates.meal_unit_price),
        ("Overnight stay", rates.overnight_unit_price),
        ("Per engagement", rates.engagement_flat_fee),
    ] {
        fees.add_row(vec![
            Cell::new(name),
            Cell::new(format_chf(value)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("Fees:");
    println!("{}", fees);

    Ok(())
}
