use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, CatalogSource};
use crate::error::AppError;

/// Catalog read from a TOML file
///
/// Expected layout:
/// ```toml
/// [[categories]]
/// id = "efh"
/// title = "Einfamilienhaus"
/// sort_order = 1
/// unit_time_allowance_hours = 1.5
///
/// [rates]
/// usb_flat_fee = 25.0
/// # ...
///
/// [rates.survey]
/// hourly_rate = 120.0
/// ```
pub struct FileCatalogSource {
    path: PathBuf,
}

impl FileCatalogSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Parse and validate catalog TOML
pub fn parse_catalog_toml(content: &str) -> Result<Catalog, AppError> {
    let catalog: Catalog = toml::from_str(content)
        .map_err(|e| AppError::ConfigError(format!("invalid catalog TOML: {}", e)))?;
    catalog.validate()?;
    Ok(catalog)
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn load(&self) -> Result<Catalog, AppError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::ConfigUnavailable(format!(
                "cannot read catalog file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let catalog = parse_catalog_toml(&content)?;
        tracing::info!(
            source = %self.describe(),
            categories = catalog.categories.len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }
}
