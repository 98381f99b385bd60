//! Chunked storage for the product collection.
//!
//! A collection is stored as one metadata record under [`keys::CATALOG_META`]
//! plus `ceil(len / chunk_size)` chunk records. Collections written by older
//! builds live under the single [`keys::LEGACY_PRODUCTS`] key and are still
//! readable; they are removed the next time the collection is written.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{keys, KvEntry, KvStore};
use crate::errors::AppError;

/// Items per chunk record.
pub const CHUNK_SIZE: usize = 10;

/// Metadata record describing a chunked collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMeta {
    pub chunks: usize,
    pub total_items: usize,
}

/// Number of chunks needed for `len` items.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size.max(1))
}

/// Encode a collection into its metadata entry followed by its chunk entries.
pub fn encode<T: Serialize>(items: &[T], chunk_size: usize) -> Result<Vec<KvEntry>, AppError> {
    let chunk_size = chunk_size.max(1);
    let meta = ChunkMeta {
        chunks: chunk_count(items.len(), chunk_size),
        total_items: items.len(),
    };

    let mut entries = Vec::with_capacity(meta.chunks + 1);
    entries.push(KvEntry::new(keys::CATALOG_META, serde_json::to_value(meta)?));
    for (index, chunk) in items.chunks(chunk_size).enumerate() {
        entries.push(KvEntry::new(keys::chunk_key(index), serde_json::to_value(chunk)?));
    }
    Ok(entries)
}

/// Stored metadata, if present and well-formed.
pub async fn read_meta<S: KvStore>(store: &S) -> Option<ChunkMeta> {
    let raw = store.get(keys::CATALOG_META).await?;
    match serde_json::from_value(raw) {
        Ok(meta) => Some(meta),
        Err(err) => {
            tracing::warn!("Ignoring malformed chunk metadata: {}", err);
            None
        }
    }
}

/// Reassemble the stored collection.
///
/// Returns `None` when neither chunk metadata nor the legacy key is present.
/// A missing or non-array chunk contributes no items.
pub async fn decode<S: KvStore>(store: &S) -> Option<Vec<Value>> {
    let Some(meta) = read_meta(store).await else {
        return match store.get(keys::LEGACY_PRODUCTS).await {
            Some(Value::Array(items)) => {
                tracing::info!("Read {} products from the legacy single key", items.len());
                Some(items)
            }
            _ => None,
        };
    };

    let mut items = Vec::with_capacity(meta.total_items);
    for index in 0..meta.chunks {
        match store.get(&keys::chunk_key(index)).await {
            Some(Value::Array(chunk)) => items.extend(chunk),
            _ => tracing::warn!(
                "Chunk {} of {} is missing, continuing without it",
                index,
                meta.chunks
            ),
        }
    }

    if items.len() != meta.total_items {
        tracing::warn!(
            "Catalog metadata lists {} items, reassembled {}",
            meta.total_items,
            items.len()
        );
    }
    Some(items)
}

/// Chunk keys left over when a collection of `new_chunks` chunks replaces the
/// one described by `previous`.
pub fn stale_chunk_keys(previous: Option<&ChunkMeta>, new_chunks: usize) -> Vec<String> {
    let old_chunks = previous.map_or(0, |meta| meta.chunks);
    (new_chunks..old_chunks).map(keys::chunk_key).collect()
}

/// Remove chunks beyond `new_chunks` and the legacy single key.
pub async fn remove_stale<S: KvStore>(
    store: &S,
    previous: Option<&ChunkMeta>,
    new_chunks: usize,
) -> Result<(), AppError> {
    for key in stale_chunk_keys(previous, new_chunks) {
        store.delete(&key).await?;
    }
    store.delete(keys::LEGACY_PRODUCTS).await
}

/// Replace the stored collection.
///
/// `extra` entries (such as the catalog version and categories) are written in
/// the same transaction as the chunks. Stale chunks and the legacy key are
/// removed only after the new data is in place.
pub async fn write_collection<S: KvStore, T: Serialize>(
    store: &S,
    items: &[T],
    chunk_size: usize,
    extra: Vec<KvEntry>,
) -> Result<ChunkMeta, AppError> {
    let previous = read_meta(store).await;
    let encoded = encode(items, chunk_size)?;
    let meta = ChunkMeta {
        chunks: encoded.len() - 1,
        total_items: items.len(),
    };

    let mut entries = extra;
    entries.extend(encoded);
    store.set_many(&entries).await?;

    remove_stale(store, previous.as_ref(), meta.chunks).await?;
    Ok(meta)
}
