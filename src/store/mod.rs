//! Persistence of quote snapshots keyed by quote number

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::AppError;
use crate::models::{QuoteSnapshot, QuoteSummary};

pub use memory::MemoryQuoteStore;
pub use sqlite::SqliteQuoteStore;

#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Insert or replace the snapshot of `snapshot.quote_number`
    async fn save(&self, snapshot: &QuoteSnapshot) -> Result<(), AppError>;

    async fn load(&self, quote_number: &str) -> Result<Option<QuoteSnapshot>, AppError>;

    /// Stored quotes, most recently updated first
    async fn list(&self) -> Result<Vec<QuoteSummary>, AppError>;

    /// Returns false when nothing was stored under `quote_number`
    async fn delete(&self, quote_number: &str) -> Result<bool, AppError>;
}

/// Build the configured quote store
///
/// The pool is only needed (and only opened) for the sqlite backend.
pub fn build_quote_store(
    cfg: &StorageConfig,
    pool: Option<sqlx::SqlitePool>,
) -> Result<Arc<dyn QuoteStore>, AppError> {
    match cfg.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryQuoteStore::new())),
        StorageBackend::Sqlite => {
            let pool = pool.ok_or_else(|| {
                AppError::Storage("sqlite storage backend requires a database pool".to_string())
            })?;
            Ok(Arc::new(SqliteQuoteStore::new(pool)))
        }
    }
}
