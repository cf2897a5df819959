use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::{QuoteSnapshot, QuoteSummary};
use crate::store::QuoteStore;

/// Quote snapshots stored as JSON in the `quotes` table
///
/// Object count and subtotal are denormalized into columns for listing.
pub struct SqliteQuoteStore {
    db_pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    quote_number: String,
    total_object_count: i64,
    subtotal: Option<f64>,
    updated_at: i64,
}

impl SqliteQuoteStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

#[async_trait]
impl QuoteStore for SqliteQuoteStore {
    async fn save(&self, snapshot: &QuoteSnapshot) -> Result<(), AppError> {
        let payload = serde_json::to_string(snapshot)
            .map_err(|e| AppError::Storage(format!("Failed to encode snapshot: {}", e)))?;
        let summary = QuoteSummary::from(snapshot);
        let updated_at = snapshot.updated_at.timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO quotes (quote_number, snapshot, total_object_count, subtotal, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(quote_number) DO UPDATE SET
                snapshot = excluded.snapshot,
                total_object_count = excluded.total_object_count,
                subtotal = excluded.subtotal,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&snapshot.quote_number)
        .bind(payload)
        .bind(summary.total_object_count as i64)
        .bind(summary.subtotal)
        .bind(updated_at)
        .bind(updated_at)
        .execute(&self.db_pool)
        .await?;

        tracing::debug!(quote_number = %snapshot.quote_number, "Stored quote snapshot");
        Ok(())
    }

    async fn load(&self, quote_number: &str) -> Result<Option<QuoteSnapshot>, AppError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT snapshot FROM quotes WHERE quote_number = ?")
                .bind(quote_number)
                .fetch_optional(&self.db_pool)
                .await?;

        match row {
            Some((payload,)) => {
                let snapshot = serde_json::from_str(&payload).map_err(|e| {
                    AppError::Storage(format!(
                        "Stored snapshot of quote {} is corrupt: {}",
                        quote_number, e
                    ))
                })?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<QuoteSummary>, AppError> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT quote_number, total_object_count, subtotal, updated_at
            FROM quotes
            ORDER BY updated_at DESC, quote_number ASC
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| QuoteSummary {
                quote_number: row.quote_number,
                total_object_count: row.total_object_count.max(0) as u64,
                subtotal: row.subtotal,
                updated_at: from_millis(row.updated_at),
            })
            .collect())
    }

    async fn delete(&self, quote_number: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM quotes WHERE quote_number = ?")
            .bind(quote_number)
            .execute(&self.db_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{CategoryEntry, EditablePriceSet, Overrides};
    use chrono::Duration;

    fn priced_snapshot(number: &str, subtotal: f64) -> QuoteSnapshot {
        let mut snapshot = QuoteSnapshot::empty(number);
        snapshot.category_entries = vec![CategoryEntry::new("A", "EFH", 3)];
        snapshot.overrides = Overrides {
            hours_override: Some(6.5),
            binding_quantity_override: None,
        };
        snapshot.prices = Some(EditablePriceSet {
            aufnahme: 780.0,
            subtotal,
            discount_percent: 5.0,
            ..EditablePriceSet::default()
        });
        snapshot
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() -> anyhow::Result<()> {
        let store = SqliteQuoteStore::new(db::connect_in_memory().await?);
        let snapshot = priced_snapshot("2024-001", 780.0);

        store.save(&snapshot).await?;
        let loaded = store.load("2024-001").await?.expect("stored");

        assert_eq!(loaded.category_entries, snapshot.category_entries);
        assert_eq!(loaded.overrides, snapshot.overrides);
        assert_eq!(loaded.prices, snapshot.prices);
        assert!(store.load("2024-999").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_replaces_and_lists_newest_first() -> anyhow::Result<()> {
        let store = SqliteQuoteStore::new(db::connect_in_memory().await?);

        let mut older = priced_snapshot("2024-001", 100.0);
        older.updated_at = Utc::now() - Duration::hours(1);
        store.save(&older).await?;
        store.save(&priced_snapshot("2024-002", 200.0)).await?;

        let mut replaced = priced_snapshot("2024-001", 150.0);
        replaced.updated_at = Utc::now() - Duration::minutes(30);
        store.save(&replaced).await?;

        let list = store.list().await?;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].quote_number, "2024-002");
        assert_eq!(list[1].subtotal, Some(150.0));
        assert_eq!(list[1].total_object_count, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete() -> anyhow::Result<()> {
        let store = SqliteQuoteStore::new(db::connect_in_memory().await?);
        store.save(&QuoteSnapshot::empty("2024-003")).await?;

        assert!(store.delete("2024-003").await?);
        assert!(!store.delete("2024-003").await?);
        assert!(store.list().await?.is_empty());
        Ok(())
    }
}
