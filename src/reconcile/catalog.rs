use serde_json::Value;
use tokio::task::JoinHandle;

use super::{fetch_status, Fetched, ReconcilePath, ReconcileReport};
use crate::codec;
use crate::db::{keys, KvEntry, KvStore};
use crate::errors::AppError;
use crate::models::defaults::default_categories;
use crate::models::{Catalog, VersionToken};
use crate::remote::{fetch_document, RemoteSource, LEGACY_DOCUMENT, PRODUCTS_DOCUMENT};
use crate::sanitize::{sanitize_categories, sanitize_products};

const PROVIDER: &str = "catalog";

pub struct CatalogLoad {
    pub catalog: Catalog,
    pub report: ReconcileReport,
    /// Durable write of adopted remote data, still in flight
    pub background: Option<JoinHandle<()>>,
}

/// Catalog as stored locally. Products missing from storage load as empty,
/// categories as the built-in set.
pub async fn load_catalog_from_store<S: KvStore>(store: &S) -> Catalog {
    let products = codec::decode(store)
        .await
        .map(|items| sanitize_products(&Value::Array(items)))
        .unwrap_or_default();
    let categories = match store.get(keys::CATEGORIES).await {
        Some(raw) => sanitize_categories(&raw),
        None => default_categories(),
    };
    Catalog {
        products,
        categories,
    }
}

/// Write the whole catalog: categories, chunked products and, when given, the
/// catalog version.
pub async fn persist_catalog<S: KvStore>(
    store: &S,
    catalog: &Catalog,
    version: Option<&VersionToken>,
    chunk_size: usize,
) -> Result<(), AppError> {
    let mut extra = Vec::with_capacity(2);
    if let Some(version) = version {
        extra.push(KvEntry::new(
            keys::CATALOG_VERSION,
            Value::String(version.to_string()),
        ));
    }
    extra.push(KvEntry::new(
        keys::CATEGORIES,
        serde_json::to_value(&catalog.categories)?,
    ));

    let meta = codec::write_collection(store, &catalog.products, chunk_size, extra).await?;
    tracing::debug!(
        "Persisted {} products in {} chunks",
        meta.total_items,
        meta.chunks
    );
    Ok(())
}

async fn fetch_catalog_document<R: RemoteSource>(remote: &R) -> Fetched {
    match fetch_document(remote, PRODUCTS_DOCUMENT).await {
        Ok(doc) => Ok((doc, PRODUCTS_DOCUMENT)),
        Err(_) => fetch_document(remote, LEGACY_DOCUMENT)
            .await
            .map(|doc| (doc, LEGACY_DOCUMENT)),
    }
}

/// Decide between the stored catalog and the published one.
pub async fn reconcile_catalog<S: KvStore, R: RemoteSource>(
    store: &S,
    remote: &R,
    forced_local: bool,
    chunk_size: usize,
) -> CatalogLoad {
    let local = store
        .get_string(keys::CATALOG_VERSION)
        .await
        .map(VersionToken::new)
        .unwrap_or_else(VersionToken::unset);

    if forced_local {
        let report = ReconcileReport::forced_local(PROVIDER, local);
        report.log();
        return CatalogLoad {
            catalog: load_catalog_from_store(store).await,
            report,
            background: None,
        };
    }

    let fetched = fetch_catalog_document(remote).await;
    let mut report = ReconcileReport {
        provider: PROVIDER,
        path: ReconcilePath::Local,
        local_version: local.clone(),
        remote_version: None,
        source: None,
        fetch_status: fetch_status(&fetched),
    };

    if let Ok((doc, source)) = fetched {
        report.remote_version = Some(doc.version.clone());
        report.source = Some(source);

        let version = doc.version.clone();
        if super::should_overwrite(&local, &version) {
            if let Some((products, categories)) = doc.into_catalog_section() {
                let catalog = Catalog {
                    products: sanitize_products(&products),
                    categories: sanitize_categories(&categories),
                };
                let background = spawn_write(store, catalog.clone(), version, chunk_size);
                report.path = ReconcilePath::RemoteOverwrite;
                report.log();
                return CatalogLoad {
                    catalog,
                    report,
                    background: Some(background),
                };
            }
        }
    }

    report.log();
    CatalogLoad {
        catalog: load_catalog_from_store(store).await,
        report,
        background: None,
    }
}

fn spawn_write<S: KvStore>(
    store: &S,
    catalog: Catalog,
    version: VersionToken,
    chunk_size: usize,
) -> JoinHandle<()> {
    let store = store.clone();
    tokio::spawn(async move {
        match persist_catalog(&store, &catalog, Some(&version), chunk_size).await {
            Ok(()) => tracing::info!("Stored remote catalog ({} products)", catalog.products.len()),
            Err(err) => tracing::error!("Failed to store remote catalog: {}", err),
        }
    })
}
