use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;

use super::{KvEntry, KvStore};
use crate::errors::AppError;

/// In-memory KvStore for testing and ephemeral runs.
#[derive(Clone, Debug, Default)]
pub struct MemoryKvStore {
    entries: Arc<Mutex<HashMap<String, Value>>>,
    fail_writes: Arc<AtomicBool>,
    write_delay_ms: Arc<AtomicU64>,
    transactions: Arc<AtomicUsize>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, as a quota-exhausted engine would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold every subsequent `set_many` for `delay` before it applies, as a
    /// slow disk would.
    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of successful `set_many` transactions so far.
    pub fn transaction_count(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }

    /// Sorted snapshot of the stored keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Storage("Storage quota exceeded".to_string()));
        }
        Ok(())
    }
}

impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), AppError> {
        self.check_writable()?;
        self.lock().insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn set_many(&self, entries: &[KvEntry]) -> Result<(), AppError> {
        self.check_writable()?;
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        {
            let mut map = self.lock();
            for entry in entries {
                map.insert(entry.key.clone(), entry.value.clone());
            }
        }
        self.transactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.check_writable()?;
        self.lock().remove(key);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), AppError> {
        self.check_writable()?;
        self.lock().clear();
        Ok(())
    }
}
