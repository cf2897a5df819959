use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::AppError;
use crate::models::{DocumentTotals, QuoteSnapshot};
use crate::session::{PricingEvent, QuoteSession, SessionView};

/// Open quote sessions keyed by quote number
///
/// Each session is only touched under its own shard lock, so events for one
/// quote are applied strictly in arrival order. Snapshots are handed to the
/// `persist` callbacks while that lock is still held; a later `close` of the
/// same quote therefore always happens after they were queued.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, QuoteSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session unless one is already open for the quote
    ///
    /// `persist` receives the snapshot of a freshly opened session whose
    /// state is not yet stored.
    pub fn open(
        &self,
        snapshot: QuoteSnapshot,
        catalog: Arc<Catalog>,
        persist: impl FnOnce(QuoteSnapshot),
    ) -> SessionView {
        let view = match self.sessions.entry(snapshot.quote_number.clone()) {
            Entry::Occupied(entry) => return entry.get().view(),
            Entry::Vacant(entry) => {
                let stored = snapshot.clone();
                let session = QuoteSession::open(snapshot, catalog);
                let current = session.snapshot();
                if current != stored {
                    persist(current);
                }
                let view = session.view();
                entry.insert(session);
                view
            }
        };

        // Outside the entry guard: len() locks every shard
        crate::metrics::set_open_sessions(self.sessions.len());
        view
    }

    pub fn is_open(&self, quote_number: &str) -> bool {
        self.sessions.contains_key(quote_number)
    }

    pub fn view(&self, quote_number: &str) -> Result<SessionView, AppError> {
        self.sessions
            .get(quote_number)
            .map(|session| session.view())
            .ok_or_else(|| AppError::SessionNotOpen(quote_number.to_string()))
    }

    pub fn totals(&self, quote_number: &str) -> Result<DocumentTotals, AppError> {
        self.sessions
            .get(quote_number)
            .map(|session| session.totals())
            .ok_or_else(|| AppError::SessionNotOpen(quote_number.to_string()))
    }

    /// Apply an event; `persist` is called only if the state changed
    pub fn apply(
        &self,
        quote_number: &str,
        event: PricingEvent,
        persist: impl FnOnce(QuoteSnapshot),
    ) -> Result<SessionView, AppError> {
        let mut session = self
            .sessions
            .get_mut(quote_number)
            .ok_or_else(|| AppError::SessionNotOpen(quote_number.to_string()))?;

        if session.apply(event)? {
            persist(session.snapshot());
        }
        Ok(session.view())
    }

    /// Remove the session, returning its final snapshot
    pub fn close(&self, quote_number: &str) -> Option<QuoteSnapshot> {
        let closed = self
            .sessions
            .remove(quote_number)
            .map(|(_, session)| session.snapshot());
        crate::metrics::set_open_sessions(self.sessions.len());
        closed
    }

    /// Push a reloaded catalog into every open session
    ///
    /// `persist` receives the snapshot of every session whose state changed.
    /// Returns how many did.
    pub fn reload_catalog(
        &self,
        catalog: Arc<Catalog>,
        mut persist: impl FnMut(QuoteSnapshot),
    ) -> usize {
        let mut changed = 0;

        for mut session in self.sessions.iter_mut() {
            match session.apply(PricingEvent::CatalogReloaded(catalog.clone())) {
                Ok(true) => {
                    changed += 1;
                    persist(session.snapshot());
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        quote_number = %session.quote_number(),
                        error = %e,
                        "Failed to apply catalog reload to session"
                    );
                }
            }
        }

        tracing::info!(
            sessions = self.sessions.len(),
            changed,
            "Applied catalog reload to open sessions"
        );
        changed
    }

    /// Current snapshots of all open sessions
    pub fn snapshots(&self) -> Vec<QuoteSnapshot> {
        self.sessions.iter().map(|s| s.snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn quote_numbers(&self) -> Vec<String> {
        let mut numbers: Vec<String> = self.sessions.iter().map(|s| s.key().clone()).collect();
        numbers.sort();
        numbers
    }
}
