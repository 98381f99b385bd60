//! Bulk restore of a backup file into the local store.
//!
//! The pipeline parses and validates the whole file, asks for confirmation,
//! plans every write up front, checks the plan against the payload budget,
//! then writes in small transactions so no single transaction carries the
//! entire image payload. The catalog version is read back at the end; a
//! mismatch fails the restore. Batches already written are not rolled back.

mod parse;

use serde::Serialize;
use serde_json::Value;

use crate::codec;
use crate::config::Config;
use crate::db::{keys, KvEntry, KvStore};
use crate::errors::AppError;
use crate::models::{VersionToken, THEME_FIELDS};
use crate::reconcile::ForceLocalFlag;
use crate::sanitize::{normalize_cert_images, sanitize_categories, sanitize_products};

pub use parse::{parse_backup_text, BackupSchema, ValidatedBackup};

/// Backups above this size get a warning in the preview.
pub const LARGE_BACKUP_BYTES: u64 = 25 * 1024 * 1024;

/// What the operator is asked to confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestorePreview {
    pub version: VersionToken,
    pub product_count: usize,
    pub category_count: usize,
    pub source_bytes: u64,
    pub large_file: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreProgress {
    pub completed_ops: usize,
    pub total_ops: usize,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    pub version: VersionToken,
    pub products: usize,
    pub categories: usize,
    pub ops: usize,
    pub batches: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Declined,
    Restored(RestoreSummary),
}

#[derive(Debug, Clone, Copy)]
pub struct RestoreOptions {
    pub batch_size: usize,
    pub chunk_size: usize,
    pub max_payload_bytes: u64,
}

impl RestoreOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.restore_batch_size,
            chunk_size: codec::CHUNK_SIZE,
            max_payload_bytes: config.max_payload_bytes,
        }
    }
}

/// JavaScript-style truthiness, used to skip empty theme fields.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Ordered writes for a backup: both versions, every theme field, categories,
/// chunk metadata, then chunks. Theme fields absent from the backup are
/// written as null so nothing from the replaced snapshot survives.
pub fn plan_restore(backup: &ValidatedBackup, chunk_size: usize) -> Result<Vec<KvEntry>, AppError> {
    let version = Value::String(backup.version.to_string());
    let mut entries = vec![
        KvEntry::new(keys::DATA_VERSION, version.clone()),
        KvEntry::new(keys::CATALOG_VERSION, version),
    ];

    for (field, key) in THEME_FIELDS {
        let value = match backup.theme.get(field).filter(|v| is_present(v)) {
            Some(value) if key == keys::CERT_IMAGES => {
                serde_json::to_value(normalize_cert_images(value))?
            }
            Some(value) => value.clone(),
            None => Value::Null,
        };
        entries.push(KvEntry::new(key, value));
    }

    let categories = sanitize_categories(&backup.categories);
    entries.push(KvEntry::new(keys::CATEGORIES, serde_json::to_value(categories)?));

    let products = sanitize_products(&Value::Array(backup.products.clone()));
    entries.extend(codec::encode(&products, chunk_size)?);
    Ok(entries)
}

/// Reject a plan whose serialized size exceeds `limit`.
pub fn check_budget(entries: &[KvEntry], limit: u64) -> Result<u64, AppError> {
    let size: u64 = entries.iter().map(KvEntry::encoded_len).sum();
    if size > limit {
        return Err(AppError::PayloadTooLarge { size, limit });
    }
    Ok(size)
}

/// Write `entries` in transactions of `batch_size`, reporting after each.
/// Returns the number of batches written.
pub async fn execute_batches<S, F>(
    store: &S,
    entries: &[KvEntry],
    batch_size: usize,
    mut progress: F,
) -> Result<usize, AppError>
where
    S: KvStore,
    F: FnMut(RestoreProgress),
{
    let total_ops = entries.len();
    let mut completed_ops = 0;
    let mut batches = 0;

    for batch in entries.chunks(batch_size.max(1)) {
        store.set_many(batch).await?;
        completed_ops += batch.len();
        batches += 1;

        let percent = (completed_ops * 100 / total_ops.max(1)) as u8;
        tracing::debug!("Restore batch {} written ({}%)", batches, percent);
        progress(RestoreProgress {
            completed_ops,
            total_ops,
            percent,
        });

        tokio::task::yield_now().await;
    }
    Ok(batches)
}

/// Restores backups into one store.
pub struct RestorePipeline<S: KvStore> {
    store: S,
    flag: ForceLocalFlag<S>,
    options: RestoreOptions,
}

impl<S: KvStore> RestorePipeline<S> {
    pub fn new(store: S, flag: ForceLocalFlag<S>, options: RestoreOptions) -> Self {
        Self {
            store,
            flag,
            options,
        }
    }

    pub async fn run<C, P>(&self, text: &str, confirm: C, progress: P) -> Result<RestoreOutcome, AppError>
    where
        C: FnOnce(&RestorePreview) -> bool,
        P: FnMut(RestoreProgress),
    {
        let json = parse_backup_text(text)?;
        let backup = BackupSchema::decode(json).into_result()?;

        let source_bytes = text.len() as u64;
        let preview = RestorePreview {
            version: backup.version.clone(),
            product_count: backup.products.len(),
            category_count: backup.categories.as_array().map_or(0, Vec::len),
            source_bytes,
            large_file: source_bytes > LARGE_BACKUP_BYTES,
        };
        if preview.large_file {
            tracing::warn!("Large backup file ({} bytes)", source_bytes);
        }
        if !confirm(&preview) {
            tracing::info!("Restore declined");
            return Ok(RestoreOutcome::Declined);
        }

        let previous_meta = codec::read_meta(&self.store).await;
        let entries = plan_restore(&backup, self.options.chunk_size)?;
        let bytes = check_budget(&entries, self.options.max_payload_bytes)?;
        let new_chunks = codec::chunk_count(preview.product_count, self.options.chunk_size);

        tracing::info!(
            "Restoring {} products as {} writes ({} bytes)",
            preview.product_count,
            entries.len(),
            bytes
        );
        let batches =
            execute_batches(&self.store, &entries, self.options.batch_size, progress).await?;

        self.verify(&backup.version).await?;

        codec::remove_stale(&self.store, previous_meta.as_ref(), new_chunks).await?;
        self.flag.set().await?;

        tracing::info!("Restore of version {} verified", backup.version);
        Ok(RestoreOutcome::Restored(RestoreSummary {
            version: backup.version,
            products: preview.product_count,
            categories: preview.category_count,
            ops: entries.len(),
            batches,
            bytes,
        }))
    }

    async fn verify(&self, expected: &VersionToken) -> Result<(), AppError> {
        let found = self.store.get_string(keys::CATALOG_VERSION).await;
        if found.as_deref() == Some(expected.as_str()) {
            return Ok(());
        }
        tracing::error!(
            "Restore verification failed: expected {}, found {:?}",
            expected,
            found
        );
        Err(AppError::Verification {
            expected: expected.to_string(),
            found,
        })
    }
}
