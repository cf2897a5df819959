//! Catalog stored in SQLite
//!
//! Categories live in `categories`, the six hourly phases in `phase_rates`
//! and the flat fees in the singleton `base_rates` row. An incomplete rate
//! card is treated as an unavailable catalog, never patched with defaults.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::catalog::{Catalog, CatalogSource};
use crate::error::AppError;
use crate::models::{BaseRates, CategoryConfig, PhaseRate};

const PHASES: [&str; 6] = ["basics", "scheduling", "survey", "report", "control", "closing"];

pub struct SqliteCatalogSource {
    db_pool: SqlitePool,
}

impl SqliteCatalogSource {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    async fn load_categories(&self) -> Result<Vec<CategoryConfig>, AppError> {
        #[derive(sqlx::FromRow)]
        struct CategoryRow {
            id: String,
            title: String,
            sort_order: i64,
            unit_time_allowance_hours: f64,
            description: Option<String>,
        }

        // rowid keeps insertion order for equal sort_order values
        let rows = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, title, sort_order, unit_time_allowance_hours, description
            FROM categories
            WHERE deleted_at IS NULL
            ORDER BY sort_order ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.db_pool)
        .await
        .map_err(unavailable)?;

        Ok(rows
            .into_iter()
            .map(|row| CategoryConfig {
                id: row.id,
                title: row.title,
                sort_order: row.sort_order,
                unit_time_allowance_hours: row.unit_time_allowance_hours,
                description: row.description,
            })
            .collect())
    }

    async fn load_rates(&self) -> Result<BaseRates, AppError> {
        #[derive(sqlx::FromRow)]
        struct PhaseRow {
            phase: String,
            hourly_rate: f64,
            base_hours: f64,
            hours_per_object: f64,
        }

        #[derive(sqlx::FromRow)]
        struct FeesRow {
            usb_flat_fee: f64,
            binding_unit_price: f64,
            travel_per_km: f64,
            travel_hourly_rate: f64,
            meal_unit_price: f64,
            overnight_unit_price: f64,
            engagement_flat_fee: f64,
        }

        let phase_rows = sqlx::query_as::<_, PhaseRow>(
            "SELECT phase, hourly_rate, base_hours, hours_per_object FROM phase_rates",
        )
        .fetch_all(&self.db_pool)
        .await
        .map_err(unavailable)?;

        let mut phases: HashMap<String, PhaseRate> = phase_rows
            .into_iter()
            .map(|row| {
                (
                    row.phase,
                    PhaseRate {
                        hourly_rate: row.hourly_rate,
                        base_hours: row.base_hours,
                        hours_per_object: row.hours_per_object,
                    },
                )
            })
            .collect();

        let mut take_phase = |name: &str| {
            phases.remove(name).ok_or_else(|| {
                AppError::ConfigUnavailable(format!("no rate configured for phase '{}'", name))
            })
        };

        let basics = take_phase("basics")?;
        let scheduling = take_phase("scheduling")?;
        let survey = take_phase("survey")?;
        let report = take_phase("report")?;
        let control = take_phase("control")?;
        let closing = take_phase("closing")?;

        let fees = sqlx::query_as::<_, FeesRow>(
            r#"
            SELECT usb_flat_fee, binding_unit_price, travel_per_km, travel_hourly_rate,
                   meal_unit_price, overnight_unit_price, engagement_flat_fee
            FROM base_rates
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.db_pool)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| AppError::ConfigUnavailable("base_rates row is missing".to_string()))?;

        Ok(BaseRates {
            basics,
            scheduling,
            survey,
            report,
            control,
            closing,
            usb_flat_fee: fees.usb_flat_fee,
            binding_unit_price: fees.binding_unit_price,
            travel_per_km: fees.travel_per_km,
            travel_hourly_rate: fees.travel_hourly_rate,
            meal_unit_price: fees.meal_unit_price,
            overnight_unit_price: fees.overnight_unit_price,
            engagement_flat_fee: fees.engagement_flat_fee,
        })
    }

    /// Replace the stored catalog with `catalog` in one transaction
    ///
    /// Categories missing from `catalog` are soft-deleted so that existing
    /// rows keep their insertion order when they come back.
    pub async fn import(&self, catalog: &Catalog) -> Result<(), AppError> {
        catalog.validate()?;
        let now = chrono::Utc::now().timestamp_millis();
        let mut tx = self.db_pool.begin().await?;

        sqlx::query("UPDATE categories SET deleted_at = ? WHERE deleted_at IS NULL")
            .bind(now)
            .execute(&mut *tx)
            .await?;

        for category in &catalog.categories {
            sqlx::query(
                r#"
                INSERT INTO categories (
                    id, title, sort_order, unit_time_allowance_hours, description,
                    created_at, updated_at, deleted_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, NULL)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    sort_order = excluded.sort_order,
                    unit_time_allowance_hours = excluded.unit_time_allowance_hours,
                    description = excluded.description,
                    updated_at = excluded.updated_at,
                    deleted_at = NULL
                "#,
            )
            .bind(&category.id)
            .bind(&category.title)
            .bind(category.sort_order)
            .bind(category.unit_time_allowance_hours)
            .bind(&category.description)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for ((name, rate), expected) in catalog.rates.phases().into_iter().zip(PHASES) {
            debug_assert_eq!(name, expected);
            sqlx::query(
                r#"
                INSERT INTO phase_rates (phase, hourly_rate, base_hours, hours_per_object, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(phase) DO UPDATE SET
                    hourly_rate = excluded.hourly_rate,
                    base_hours = excluded.base_hours,
                    hours_per_object = excluded.hours_per_object,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(name)
            .bind(rate.hourly_rate)
            .bind(rate.base_hours)
            .bind(rate.hours_per_object)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let rates = &catalog.rates;
        sqlx::query(
            r#"
            INSERT INTO base_rates (
                id, usb_flat_fee, binding_unit_price, travel_per_km, travel_hourly_rate,
                meal_unit_price, overnight_unit_price, engagement_flat_fee, updated_at
            )
            VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                usb_flat_fee = excluded.usb_flat_fee,
                binding_unit_price = excluded.binding_unit_price,
                travel_per_km = excluded.travel_per_km,
                travel_hourly_rate = excluded.travel_hourly_rate,
                meal_unit_price = excluded.meal_unit_price,
                overnight_unit_price = excluded.overnight_unit_price,
                engagement_flat_fee = excluded.engagement_flat_fee,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(rates.usb_flat_fee)
        .bind(rates.binding_unit_price)
        .bind(rates.travel_per_km)
        .bind(rates.travel_hourly_rate)
        .bind(rates.meal_unit_price)
        .bind(rates.overnight_unit_price)
        .bind(rates.engagement_flat_fee)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            categories = catalog.categories.len(),
            "Imported catalog into database"
        );
        Ok(())
    }
}

fn unavailable(err: sqlx::Error) -> AppError {
    AppError::ConfigUnavailable(format!("catalog database error: {}", err))
}

#[async_trait]
impl CatalogSource for SqliteCatalogSource {
    fn describe(&self) -> String {
        "database".to_string()
    }

    async fn load(&self) -> Result<Catalog, AppError> {
        let categories = self.load_categories().await?;
        let rates = self.load_rates().await?;

        let catalog = Catalog { categories, rates };
        catalog.validate()?;

        tracing::info!(
            source = %self.describe(),
            categories = catalog.categories.len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }
}
