//! Category registry and base rates
//!
//! The catalog is an immutable snapshot loaded from a [`CatalogSource`].
//! There are no built-in default rates: when the source cannot be read the
//! caller gets [`AppError::ConfigUnavailable`] and no quote can be priced.

pub mod database;
pub mod file;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{CatalogConfig, CatalogSourceKind};
use crate::error::AppError;
use crate::models::{sorted_categories, BaseRates, CategoryConfig};

pub use database::SqliteCatalogSource;
pub use file::FileCatalogSource;

/// Categories and rates for one calculation pass
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Catalog {
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
    pub rates: BaseRates,
}

impl Catalog {
    /// Reject duplicate ids, empty titles and negative numbers
    pub fn validate(&self) -> Result<(), AppError> {
        let mut ids = HashSet::new();
        for category in &self.categories {
            if category.id.trim().is_empty() {
                return Err(AppError::ConfigError("category id cannot be empty".to_string()));
            }
            if !ids.insert(category.id.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "category id '{}' is duplicated",
                    category.id
                )));
            }
            if category.title.trim().is_empty() {
                return Err(AppError::ConfigError(format!(
                    "category '{}': title cannot be empty",
                    category.id
                )));
            }
            let allowance = category.unit_time_allowance_hours;
            if !allowance.is_finite() || allowance < 0.0 {
                return Err(AppError::ConfigError(format!(
                    "category '{}': unit_time_allowance_hours must be non-negative, got {}",
                    category.id, allowance
                )));
            }
        }

        self.rates.validate().map_err(AppError::ConfigError)
    }

    /// Categories in display order
    pub fn sorted_categories(&self) -> Vec<&CategoryConfig> {
        sorted_categories(&self.categories)
    }
}

/// Read-only store of the catalog
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Human-readable location, used in logs
    fn describe(&self) -> String;

    /// Load and validate the current catalog
    async fn load(&self) -> Result<Catalog, AppError>;
}

/// Build the configured catalog source
///
/// The database source needs a pool; it is only opened when configured.
pub fn build_catalog_source(
    cfg: &CatalogConfig,
    pool: Option<sqlx::SqlitePool>,
) -> Result<Arc<dyn CatalogSource>, AppError> {
    match cfg.source {
        CatalogSourceKind::File => Ok(Arc::new(FileCatalogSource::new(&cfg.path))),
        CatalogSourceKind::Database => {
            let pool = pool.ok_or_else(|| {
                AppError::ConfigUnavailable(
                    "catalog source 'database' requires the sqlite storage backend".to_string(),
                )
            })?;
            Ok(Arc::new(SqliteCatalogSource::new(pool)))
        }
    }
}
