use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;

use crate::db::KvStore;
use crate::errors::AppError;
use crate::models::Catalog;
use crate::reconcile::persist_catalog;

#[derive(Default)]
struct SaverState {
    generation: u64,
    /// A save is scheduled and its task has not claimed it yet
    dirty: bool,
    handle: Option<JoinHandle<()>>,
    /// Tasks that claimed their save and may still be writing
    in_flight: Vec<JoinHandle<()>>,
}

impl SaverState {
    /// Move a claimed task out of the pending slot so it can still be awaited.
    fn retire_handle(&mut self) {
        self.in_flight.retain(|h| !h.is_finished());
        if let Some(handle) = self.handle.take() {
            if self.dirty {
                handle.abort();
            } else {
                self.in_flight.push(handle);
            }
        }
    }
}

/// Debounced write-back of the in-memory catalog.
///
/// Every [`schedule`](Self::schedule) restarts the quiet period; the catalog
/// is written once no edit has arrived for `delay`. A save that has started
/// writing is never aborted, and saves write one at a time in the order they
/// claimed the write gate.
pub struct CatalogSaver<S: KvStore> {
    store: S,
    catalog: Arc<RwLock<Catalog>>,
    delay: Duration,
    chunk_size: usize,
    state: Arc<Mutex<SaverState>>,
    gate: Arc<AsyncMutex<()>>,
}

impl<S: KvStore> CatalogSaver<S> {
    pub fn new(store: S, catalog: Arc<RwLock<Catalog>>, delay: Duration, chunk_size: usize) -> Self {
        Self {
            store,
            catalog,
            delay,
            chunk_size,
            state: Arc::default(),
            gate: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SaverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_pending(&self) -> bool {
        self.lock().dirty
    }

    pub fn schedule(&self) {
        let mut state = self.lock();
        state.retire_handle();
        state.generation += 1;
        state.dirty = true;

        let generation = state.generation;
        let shared = Arc::clone(&self.state);
        let gate = Arc::clone(&self.gate);
        let store = self.store.clone();
        let catalog = Arc::clone(&self.catalog);
        let delay = self.delay;
        let chunk_size = self.chunk_size;

        state.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _writing = gate.lock().await;
            {
                let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                if state.generation != generation {
                    return;
                }
                state.dirty = false;
            }
            if let Err(err) = save(&store, &catalog, chunk_size).await {
                tracing::error!("Debounced catalog save failed: {}", err);
            }
        }));
    }

    /// Take every task that may still write, aborting the unclaimed one.
    /// Returns whether a save was pending.
    fn settle(&self) -> (bool, Vec<JoinHandle<()>>) {
        let mut state = self.lock();
        let dirty = state.dirty;
        state.retire_handle();
        state.dirty = false;
        state.generation += 1;
        (dirty, state.in_flight.drain(..).collect())
    }

    async fn join(handles: Vec<JoinHandle<()>>) {
        for handle in handles {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    tracing::warn!("Catalog save task ended abnormally: {}", err);
                }
            }
        }
    }

    /// Write a pending save now, after any save already writing.
    pub async fn flush(&self) -> Result<(), AppError> {
        let (dirty, handles) = self.settle();
        Self::join(handles).await;
        if dirty {
            let _writing = self.gate.lock().await;
            return save(&self.store, &self.catalog, self.chunk_size).await;
        }
        Ok(())
    }

    /// Drop a pending save without writing it, and wait for any save that
    /// already started so nothing lands after the caller rewrites the store.
    pub async fn cancel(&self) {
        let (dirty, handles) = self.settle();
        if dirty {
            tracing::debug!("Discarded pending catalog save");
        }
        Self::join(handles).await;
    }
}

async fn save<S: KvStore>(
    store: &S,
    catalog: &RwLock<Catalog>,
    chunk_size: usize,
) -> Result<(), AppError> {
    let snapshot = catalog.read().await.clone();
    persist_catalog(store, &snapshot, None, chunk_size).await?;
    tracing::info!("Saved catalog ({} products)", snapshot.products.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, CHUNK_SIZE};
    use crate::db::MemoryKvStore;
    use crate::models::defaults::default_catalog;
    use crate::sanitize::sanitize_product;
    use serde_json::json;

    fn saver(store: &MemoryKvStore, delay_ms: u64) -> (CatalogSaver<MemoryKvStore>, Arc<RwLock<Catalog>>) {
        let catalog = Arc::new(RwLock::new(default_catalog()));
        let saver = CatalogSaver::new(
            store.clone(),
            Arc::clone(&catalog),
            Duration::from_millis(delay_ms),
            CHUNK_SIZE,
        );
        (saver, catalog)
    }

    #[tokio::test]
    async fn test_edits_coalesce_into_one_save() {
        let store = MemoryKvStore::new();
        let (saver, catalog) = saver(&store, 60);

        for i in 0..5 {
            catalog
                .write()
                .await
                .products
                .insert(0, sanitize_product(&json!({ "id": format!("p-{}", i) })));
            saver.schedule();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(saver.is_pending());
        assert_eq!(store.transaction_count(), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!saver.is_pending());
        assert_eq!(store.transaction_count(), 1);
        assert_eq!(codec::decode(&store).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_flush_writes_immediately() {
        let store = MemoryKvStore::new();
        let (saver, _catalog) = saver(&store, 10_000);

        saver.schedule();
        saver.flush().await.unwrap();
        assert_eq!(store.transaction_count(), 1);
        assert!(!saver.is_pending());

        // Nothing pending: flush is a no-op
        saver.flush().await.unwrap();
        assert_eq!(store.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_discards_pending_save() {
        let store = MemoryKvStore::new();
        let (saver, _catalog) = saver(&store, 30);

        saver.schedule();
        saver.cancel().await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.transaction_count(), 0);
    }

    async fn fill(catalog: &RwLock<Catalog>, prefix: &str, count: usize) {
        catalog.write().await.products = (0..count)
            .map(|i| sanitize_product(&json!({ "id": format!("{}-{}", prefix, i) })))
            .collect();
    }

    #[tokio::test]
    async fn test_cancel_waits_for_save_in_progress() {
        let store = MemoryKvStore::new();
        let (saver, catalog) = saver(&store, 10);
        fill(&catalog, "old", 15).await;

        store.set_write_delay(Duration::from_millis(200));
        saver.schedule();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!saver.is_pending());
        store.set_write_delay(Duration::ZERO);

        saver.cancel().await;
        assert_eq!(store.transaction_count(), 1);

        // A write made after cancel returns is not clobbered later
        codec::write_collection(&store, &[json!({ "id": "new-0" })], CHUNK_SIZE, Vec::new())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        let stored = codec::decode(&store).await.unwrap();
        assert_eq!(stored, vec![json!({ "id": "new-0" })]);
    }

    #[tokio::test]
    async fn test_overlapping_saves_land_in_order() {
        let store = MemoryKvStore::new();
        let (saver, catalog) = saver(&store, 10);
        fill(&catalog, "first", 15).await;

        store.set_write_delay(Duration::from_millis(200));
        saver.schedule();
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.set_write_delay(Duration::ZERO);

        fill(&catalog, "second", 2).await;
        saver.schedule();
        tokio::time::sleep(Duration::from_millis(300)).await;
        saver.flush().await.unwrap();

        assert_eq!(store.transaction_count(), 2);
        let stored = codec::decode(&store).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0]["id"], "second-0");
    }
}
