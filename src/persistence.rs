//! Debounced snapshot writer
//!
//! Sessions update in memory on every event; the resulting snapshots are
//! handed to this writer, which keeps only the latest snapshot per quote and
//! writes it once the quote has been quiet for the debounce window.
//!
//! The writer task is the only one that mutates the store while the engine
//! runs. Immediate writes and deletes go through it as well, so they are
//! ordered after any debounced write already in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::error::AppError;
use crate::models::QuoteSnapshot;
use crate::store::QuoteStore;

/// Lower bound for the flush timer period
const MIN_TICK: Duration = Duration::from_millis(10);

#[derive(Debug)]
enum WriterMessage {
    Snapshot(QuoteSnapshot),
    /// Write now, superseding any pending snapshot of the quote
    Persist(QuoteSnapshot, oneshot::Sender<Result<(), AppError>>),
    /// Drop any pending snapshot and delete the stored quote
    Delete(String, oneshot::Sender<Result<bool, AppError>>),
    /// Write everything pending now, then acknowledge
    Flush(oneshot::Sender<()>),
    /// Write everything pending and stop
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the background writer task
#[derive(Clone)]
pub struct DebouncedWriter {
    sender: mpsc::UnboundedSender<WriterMessage>,
}

impl DebouncedWriter {
    /// Spawn the writer task
    ///
    /// A zero `debounce` writes on the next timer tick.
    pub fn spawn(store: Arc<dyn QuoteStore>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            writer_task(store, rx, debounce).await;
        });

        Self { sender: tx }
    }

    /// Queue a snapshot (non-blocking); replaces any pending one for the quote
    pub fn submit(&self, snapshot: QuoteSnapshot) {
        if self.sender.send(WriterMessage::Snapshot(snapshot)).is_err() {
            tracing::warn!("Snapshot writer stopped, dropping snapshot");
        }
    }

    /// Store a snapshot immediately and wait for the result
    pub async fn persist(&self, snapshot: QuoteSnapshot) -> Result<(), AppError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(WriterMessage::Persist(snapshot, ack))
            .map_err(|_| writer_stopped())?;
        done.await.map_err(|_| writer_stopped())?
    }

    /// Delete a stored quote; pending writes for it are dropped
    ///
    /// Returns whether the store held the quote.
    pub async fn delete(&self, quote_number: &str) -> Result<bool, AppError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(WriterMessage::Delete(quote_number.to_string(), ack))
            .map_err(|_| writer_stopped())?;
        done.await.map_err(|_| writer_stopped())?
    }

    /// Write all pending snapshots and wait until they are stored
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(WriterMessage::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Write all pending snapshots and stop the task
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(WriterMessage::Shutdown(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

fn writer_stopped() -> AppError {
    AppError::Storage("snapshot writer is not running".to_string())
}

struct Pending {
    snapshot: QuoteSnapshot,
    due: Instant,
}

async fn writer_task(
    store: Arc<dyn QuoteStore>,
    mut rx: mpsc::UnboundedReceiver<WriterMessage>,
    debounce: Duration,
) {
    let mut pending: HashMap<String, Pending> = HashMap::new();

    let mut flush_timer = tokio::time::interval((debounce / 2).max(MIN_TICK));
    flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(WriterMessage::Snapshot(snapshot)) => {
                        let due = Instant::now() + debounce;
                        pending.insert(snapshot.quote_number.clone(), Pending { snapshot, due });
                    }
                    Some(WriterMessage::Persist(snapshot, ack)) => {
                        pending.remove(&snapshot.quote_number);
                        let result = write_snapshot(&store, &snapshot).await;
                        let _ = ack.send(result);
                    }
                    Some(WriterMessage::Delete(quote_number, ack)) => {
                        pending.remove(&quote_number);
                        let _ = ack.send(store.delete(&quote_number).await);
                    }
                    Some(WriterMessage::Flush(ack)) => {
                        write_all(&store, &mut pending).await;
                        let _ = ack.send(());
                    }
                    Some(WriterMessage::Shutdown(ack)) => {
                        write_all(&store, &mut pending).await;
                        let _ = ack.send(());
                        break;
                    }
                    // All handles dropped, flush remaining and exit
                    None => {
                        write_all(&store, &mut pending).await;
                        break;
                    }
                }
            }

            _ = flush_timer.tick() => {
                write_due(&store, &mut pending, Instant::now()).await;
            }
        }
    }

    tracing::info!("Snapshot writer task shutting down");
}

async fn write_due(store: &Arc<dyn QuoteStore>, pending: &mut HashMap<String, Pending>, now: Instant) {
    let due: Vec<String> = pending
        .iter()
        .filter(|(_, p)| p.due <= now)
        .map(|(k, _)| k.clone())
        .collect();

    for quote_number in due {
        if let Some(p) = pending.remove(&quote_number) {
            let _ = write_snapshot(store, &p.snapshot).await;
        }
    }
}

async fn write_all(store: &Arc<dyn QuoteStore>, pending: &mut HashMap<String, Pending>) {
    for (_, p) in pending.drain() {
        let _ = write_snapshot(store, &p.snapshot).await;
    }
}

async fn write_snapshot(
    store: &Arc<dyn QuoteStore>,
    snapshot: &QuoteSnapshot,
) -> Result<(), AppError> {
    let start = std::time::Instant::now();

    let result = store.save(snapshot).await;
    match &result {
        Ok(()) => {
            tracing::debug!(
                quote_number = %snapshot.quote_number,
                duration_ms = start.elapsed().as_millis(),
                "Persisted quote snapshot"
            );
            crate::metrics::record_persist("ok", start.elapsed());
        }
        Err(e) => {
            // The session still holds the state; the next event resubmits it
            tracing::error!(
                quote_number = %snapshot.quote_number,
                error = %e,
                "Failed to persist quote snapshot"
            );
            crate::metrics::record_persist("error", start.elapsed());
        }
    }
    result
}
