use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::AppError;
use crate::models::{QuoteSnapshot, QuoteSummary};
use crate::store::QuoteStore;

/// Volatile store, used for tests and `storage.backend = "memory"`
#[derive(Default)]
pub struct MemoryQuoteStore {
    quotes: DashMap<String, QuoteSnapshot>,
}

impl MemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[async_trait]
impl QuoteStore for MemoryQuoteStore {
    async fn save(&self, snapshot: &QuoteSnapshot) -> Result<(), AppError> {
        self.quotes
            .insert(snapshot.quote_number.clone(), snapshot.clone());
        Ok(())
    }

    async fn load(&self, quote_number: &str) -> Result<Option<QuoteSnapshot>, AppError> {
        Ok(self.quotes.get(quote_number).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> Result<Vec<QuoteSummary>, AppError> {
        let mut summaries: Vec<QuoteSummary> = self
            .quotes
            .iter()
            .map(|entry| QuoteSummary::from(entry.value()))
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn delete(&self, quote_number: &str) -> Result<bool, AppError> {
        Ok(self.quotes.remove(quote_number).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = MemoryQuoteStore::new();
        let snapshot = QuoteSnapshot::empty("Q-1");

        store.save(&snapshot).await.unwrap();
        assert_eq!(store.load("Q-1").await.unwrap(), Some(snapshot));
        assert_eq!(store.len(), 1);

        assert!(store.delete("Q-1").await.unwrap());
        assert!(!store.delete("Q-1").await.unwrap());
        assert!(store.load("Q-1").await.unwrap().is_none());
    }
}
