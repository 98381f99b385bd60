use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::db::{keys, KvStore};
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlagRecord {
    set_at: i64,
    expires_at: i64,
}

/// Short-lived marker telling the next load to skip the network.
///
/// Set after a restore so the reload that follows shows the restored data
/// instead of whatever the host publishes. The record carries its own expiry,
/// so a process started after the lifetime elapsed sees it as cleared even if
/// the expiry task never ran.
#[derive(Clone)]
pub struct ForceLocalFlag<S> {
    store: S,
    ttl: Duration,
}

impl<S: KvStore> ForceLocalFlag<S> {
    pub fn new(store: S, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn set(&self) -> Result<(), AppError> {
        let now = Utc::now().timestamp_millis();
        let record = FlagRecord {
            set_at: now,
            expires_at: now + self.ttl.as_millis() as i64,
        };
        self.store
            .set(keys::FORCE_LOCAL_LOAD, &serde_json::to_value(record)?)
            .await?;
        tracing::info!("Forced-local load enabled for {:?}", self.ttl);
        Ok(())
    }

    async fn record(&self) -> Option<FlagRecord> {
        let raw = self.store.get(keys::FORCE_LOCAL_LOAD).await?;
        serde_json::from_value(raw).ok()
    }

    /// Whether the flag is set and unexpired. An expired or unreadable flag is
    /// removed.
    pub async fn is_active(&self) -> bool {
        if let Some(record) = self.record().await {
            if record.expires_at > Utc::now().timestamp_millis() {
                return true;
            }
        } else if self.store.get(keys::FORCE_LOCAL_LOAD).await.is_none() {
            return false;
        }

        if let Err(err) = self.clear().await {
            tracing::warn!("Failed to clear expired forced-local flag: {}", err);
        }
        false
    }

    pub async fn clear(&self) -> Result<(), AppError> {
        self.store.delete(keys::FORCE_LOCAL_LOAD).await
    }

    /// Clear the flag once its lifetime has elapsed. A flag re-set in the
    /// meantime is left alone.
    pub fn schedule_expiry(&self) -> JoinHandle<()> {
        let flag = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(flag.ttl).await;
            let expired = match flag.record().await {
                Some(record) => record.expires_at <= Utc::now().timestamp_millis(),
                None => true,
            };
            if expired {
                match flag.clear().await {
                    Ok(()) => tracing::info!("Forced-local load expired"),
                    Err(err) => tracing::warn!("Failed to clear forced-local flag: {}", err),
                }
            }
        })
    }
}
