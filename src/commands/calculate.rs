use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{Cell, CellAlignment};
use offerte_engine::catalog::build_catalog_source;
use offerte_engine::config;
use offerte_engine::models::PriceField;
use offerte_engine::pricing::CalculationRequest;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::{amount_cell, database_pool, new_table, totals_table};

/// Execute the calculate command
pub async fn execute(config_path: &Path, input: &Path, json: bool) -> Result<()> {
    let cfg = config::load_config(config_path)?;

    let content = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let request: CalculationRequest = serde_json::from_str(&content)
        .with_context(|| format!("Invalid calculation input in {}", input.display()))?;

    let pool = database_pool(&cfg).await?;
    let source = build_catalog_source(&cfg.catalog, pool)?;
    let catalog = Arc::new(source.load().await?);

    let calculation = request.evaluate(catalog);
    info!(
        objects = calculation.computed.total_object_count,
        subtotal = calculation.computed.subtotal,
        "Calculated quote from {}",
        input.display()
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&calculation)?);
        return Ok(());
    }

    let mut objects = new_table(&["CATEGORY", "COUNT"]);
    for entry in &calculation.category_entries {
        objects.add_row(vec![
            Cell::new(&entry.title),
            Cell::new(entry.count).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{}", objects);
    println!();

    let computed = &calculation.computed;
    let phases = [
        (PriceField::Grundlagen, &computed.basics),
        (PriceField::Termin, &computed.scheduling),
        (PriceField::Aufnahme, &computed.survey),
        (PriceField::Bericht, &computed.report),
        (PriceField::Kontrolle, &computed.control),
        (PriceField::Abschluss, &computed.closing),
        (PriceField::Material, &computed.material),
        (PriceField::Spesen, &computed.expenses),
    ];

    let mut lines = new_table(&["LINE", "QUANTITY", "AMOUNT"]);
    for (field, phase) in phases {
        let quantity = if phase.is_overridden() {
            format!("{:.2} ({:.2})", phase.effective_quantity, phase.raw_quantity)
        } else {
            format!("{:.2}", phase.effective_quantity)
        };
        lines.add_row(vec![
            Cell::new(field.label()),
            Cell::new(quantity).set_alignment(CellAlignment::Right),
            amount_cell(phase.amount),
        ]);
    }
    println!("{}", lines);
    println!();

    println!("{}", totals_table(&calculation.totals));
    println!(
        "{} {} objects",
        "Total objects:".bold(),
        computed.total_object_count
    );

    Ok(())
}
