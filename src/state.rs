//! Shared state of a running engine

use arc_swap::ArcSwapOption;
use std::sync::Arc;

use crate::catalog::{Catalog, CatalogSource};
use crate::error::AppError;
use crate::persistence::DebouncedWriter;
use crate::session::SessionRegistry;
use crate::store::QuoteStore;

#[derive(Clone)]
pub struct AppState {
    /// `None` until a catalog has been loaded successfully
    pub catalog: Arc<ArcSwapOption<Catalog>>,
    pub catalog_source: Arc<dyn CatalogSource>,
    pub sessions: Arc<SessionRegistry>,
    pub store: Arc<dyn QuoteStore>,
    pub writer: DebouncedWriter,
}

impl AppState {
    pub fn new(
        catalog_source: Arc<dyn CatalogSource>,
        store: Arc<dyn QuoteStore>,
        writer: DebouncedWriter,
    ) -> Self {
        Self {
            catalog: Arc::new(ArcSwapOption::empty()),
            catalog_source,
            sessions: Arc::new(SessionRegistry::new()),
            store,
            writer,
        }
    }

    /// The catalog in effect, or `ConfigUnavailable` if none could be loaded
    pub fn current_catalog(&self) -> Result<Arc<Catalog>, AppError> {
        self.catalog.load_full().ok_or_else(|| {
            AppError::ConfigUnavailable(format!(
                "no catalog loaded from {}",
                self.catalog_source.describe()
            ))
        })
    }

    /// Load the catalog from its source and swap it in
    ///
    /// If the source is unreachable the catalog is unloaded: nothing is
    /// priced against rates that can no longer be confirmed. A source that
    /// answers with an invalid catalog leaves the previous one in effect.
    /// On success every open session is reconciled and changed sessions are
    /// queued for persistence. Returns the number of sessions that changed.
    pub async fn reload_catalog(&self) -> Result<usize, AppError> {
        let catalog = match self.catalog_source.load().await {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => {
                crate::metrics::record_catalog_reload("error");
                let source = self.catalog_source.describe();
                match &e {
                    AppError::ConfigUnavailable(_) => {
                        if self.catalog.swap(None).is_some() {
                            tracing::error!(
                                source = %source,
                                error = %e,
                                "Catalog source lost, pricing disabled until it is back"
                            );
                        }
                    }
                    _ if self.catalog.load().is_some() => {
                        tracing::warn!(
                            source = %source,
                            error = %e,
                            "Invalid catalog rejected, previous rates remain in effect"
                        );
                    }
                    _ => {}
                }
                return Err(e);
            }
        };

        self.catalog.store(Some(catalog.clone()));
        crate::metrics::record_catalog_reload("ok");

        Ok(self
            .sessions
            .reload_catalog(catalog, |snapshot| self.writer.submit(snapshot)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FileCatalogSource;
    use crate::store::MemoryQuoteStore;
    use std::time::Duration;

    fn state_for(path: &std::path::Path) -> AppState {
        let store: Arc<dyn QuoteStore> = Arc::new(MemoryQuoteStore::new());
        let writer = DebouncedWriter::spawn(store.clone(), Duration::from_millis(10));
        AppState::new(Arc::new(FileCatalogSource::new(path)), store, writer)
    }

    #[tokio::test]
    async fn test_catalog_unavailable_until_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir.path().join("missing.toml"));

        assert!(matches!(state.current_catalog(), Err(AppError::ConfigUnavailable(_))));
        assert!(state.reload_catalog().await.is_err());
        assert!(matches!(state.current_catalog(), Err(AppError::ConfigUnavailable(_))));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, crate::test_support::SAMPLE_CATALOG_TOML).unwrap();

        let state = state_for(&path);
        state.reload_catalog().await.unwrap();
        let loaded = state.current_catalog().unwrap();

        std::fs::write(&path, "not = [valid").unwrap();
        assert!(state.reload_catalog().await.is_err());
        assert_eq!(state.current_catalog().unwrap(), loaded);
    }

    #[tokio::test]
    async fn test_lost_source_unloads_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, crate::test_support::SAMPLE_CATALOG_TOML).unwrap();

        let state = state_for(&path);
        state.reload_catalog().await.unwrap();
        assert!(state.current_catalog().is_ok());

        std::fs::remove_file(&path).unwrap();
        let result = state.reload_catalog().await;
        assert!(matches!(result, Err(AppError::ConfigUnavailable(_))));
        assert!(matches!(state.current_catalog(), Err(AppError::ConfigUnavailable(_))));

        // Back once the source is
        std::fs::write(&path, crate::test_support::SAMPLE_CATALOG_TOML).unwrap();
        state.reload_catalog().await.unwrap();
        assert!(state.current_catalog().is_ok());
    }
}
