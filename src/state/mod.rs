//! Application state: the in-memory theme and catalog, their lifecycle, and
//! the edits the operator makes to them.
//!
//! Theme edits are written to the store as soon as they are made. Catalog
//! edits go through a debounced [`CatalogSaver`] since a catalog write rewrites
//! every chunk.

mod debounce;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::codec::{self, CHUNK_SIZE};
use crate::config::Config;
use crate::db::{keys, KvStore};
use crate::errors::AppError;
use crate::export::{self, WrittenFile};
use crate::models::defaults::{default_catalog, default_theme};
use crate::models::{Catalog, Category, CertFile, Gallery, ImagePayload, Product, ThemeAssets, VersionToken};
use crate::reconcile::{reconcile_catalog, reconcile_theme, ForceLocalFlag, ReconcileReport};
use crate::remote::{probe_published, RemoteFileStatus, RemoteSource};
use crate::restore::{RestoreOptions, RestoreOutcome, RestorePipeline, RestorePreview, RestoreProgress};
use crate::sanitize::sanitize_product;

pub use debounce::CatalogSaver;

/// Shared application state.
pub struct AppState<S: KvStore, R: RemoteSource> {
    store: S,
    flags: S,
    flag: ForceLocalFlag<S>,
    remote: R,
    config: Arc<Config>,
    theme: RwLock<ThemeAssets>,
    catalog: Arc<RwLock<Catalog>>,
    saver: CatalogSaver<S>,
    loaded: AtomicBool,
    reports: RwLock<Vec<ReconcileReport>>,
    /// Durable writes of adopted remote data
    background: Mutex<Vec<JoinHandle<()>>>,
    flag_timer: Mutex<Option<JoinHandle<()>>>,
}

impl<S: KvStore, R: RemoteSource> AppState<S, R> {
    /// Build the state and run the first reconciliation.
    pub async fn init(store: S, flags: S, remote: R, config: Arc<Config>) -> Self {
        let catalog = Arc::new(RwLock::new(default_catalog()));
        let saver = CatalogSaver::new(
            store.clone(),
            Arc::clone(&catalog),
            config.save_debounce,
            CHUNK_SIZE,
        );
        let state = Self {
            flag: ForceLocalFlag::new(flags.clone(), config.force_local_ttl),
            store,
            flags,
            remote,
            config,
            theme: RwLock::new(default_theme()),
            catalog,
            saver,
            loaded: AtomicBool::new(false),
            reports: RwLock::new(Vec::new()),
            background: Mutex::new(Vec::new()),
            flag_timer: Mutex::new(None),
        };
        state.hydrate().await;
        state
    }

    async fn hydrate(&self) {
        self.loaded.store(false, Ordering::SeqCst);

        let forced = self.flag.is_active().await;
        if forced {
            tracing::info!("Forced-local load active, skipping network");
        }

        let (theme_load, catalog_load) = tokio::join!(
            reconcile_theme(&self.store, &self.remote, forced),
            reconcile_catalog(&self.store, &self.remote, forced, CHUNK_SIZE)
        );

        *self.theme.write().await = theme_load.theme;
        *self.catalog.write().await = catalog_load.catalog;
        *self.reports.write().await = vec![theme_load.report, catalog_load.report];

        let mut background = self.background.lock().await;
        background.extend(theme_load.background);
        background.extend(catalog_load.background);
        drop(background);

        if forced {
            let timer = self.flag.schedule_expiry();
            if let Some(previous) = self.flag_timer.lock().await.replace(timer) {
                previous.abort();
            }
        }

        self.loaded.store(true, Ordering::SeqCst);
    }

    /// Discard in-memory state and pending edits, then reconcile again.
    pub async fn reload(&self) {
        self.saver.cancel().await;
        self.wait_for_background().await;
        self.hydrate().await;
    }

    /// Flush the pending catalog save and settle background work.
    pub async fn shutdown(&self) -> Result<(), AppError> {
        self.saver.flush().await?;
        self.wait_for_background().await;
        if let Some(timer) = self.flag_timer.lock().await.take() {
            timer.abort();
        }
        Ok(())
    }

    /// Wait for durable writes of adopted remote data to finish.
    pub async fn wait_for_background(&self) {
        let handles: Vec<_> = self.background.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!("Background write task ended abnormally: {}", err);
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn theme(&self) -> ThemeAssets {
        self.theme.read().await.clone()
    }

    pub async fn catalog(&self) -> Catalog {
        self.catalog.read().await.clone()
    }

    /// Reports of the most recent reconciliation, theme first.
    pub async fn reports(&self) -> Vec<ReconcileReport> {
        self.reports.read().await.clone()
    }

    pub fn catalog_save_pending(&self) -> bool {
        self.saver.is_pending()
    }

    // --- Theme ---

    async fn persist_theme_field(&self, key: &str, value: Value) -> Result<(), AppError> {
        if self.is_loaded() {
            self.store.set(key, &value).await?;
        }
        Ok(())
    }

    fn optional_value(image: &Option<ImagePayload>) -> Value {
        image
            .as_ref()
            .map_or(Value::Null, |img| Value::String(img.as_str().to_string()))
    }

    pub async fn set_hero_image(&self, image: ImagePayload) -> Result<(), AppError> {
        let value = Value::String(image.as_str().to_string());
        self.theme.write().await.hero_image = image;
        self.persist_theme_field(keys::HERO_IMAGE, value).await
    }

    pub async fn set_logo_image(&self, image: Option<ImagePayload>) -> Result<(), AppError> {
        let value = Self::optional_value(&image);
        self.theme.write().await.logo_image = image;
        self.persist_theme_field(keys::LOGO_IMAGE, value).await
    }

    async fn update_certs<F>(&self, edit: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut ThemeAssets),
    {
        let value = {
            let mut theme = self.theme.write().await;
            edit(&mut *theme);
            serde_json::to_value(&theme.cert_images)?
        };
        self.persist_theme_field(keys::CERT_IMAGES, value).await
    }

    pub async fn add_cert_image(
        &self,
        slot: &str,
        url: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<(), AppError> {
        let file = CertFile::new(url, name);
        self.update_certs(|theme| {
            theme
                .cert_images
                .entry(slot.to_string())
                .or_default()
                .push(file)
        })
        .await
    }

    pub async fn add_batch_cert_images(&self, slot: &str, files: Vec<CertFile>) -> Result<(), AppError> {
        self.update_certs(|theme| {
            theme
                .cert_images
                .entry(slot.to_string())
                .or_default()
                .extend(files)
        })
        .await
    }

    /// Remove the certificate at `index` in `slot`. Out-of-range indexes
    /// leave the list as is.
    pub async fn remove_cert_image(&self, slot: &str, index: usize) -> Result<(), AppError> {
        self.update_certs(|theme| {
            let list = theme.cert_images.entry(slot.to_string()).or_default();
            if index < list.len() {
                list.remove(index);
            }
        })
        .await
    }

    pub async fn set_gallery(&self, gallery: Gallery, images: Vec<ImagePayload>) -> Result<(), AppError> {
        let value = serde_json::to_value(&images)?;
        *self.theme.write().await.gallery_mut(gallery) = images;
        self.persist_theme_field(gallery.key(), value).await
    }

    pub async fn set_about_certs_image(&self, image: Option<ImagePayload>) -> Result<(), AppError> {
        let value = Self::optional_value(&image);
        self.theme.write().await.about_certs_image = image;
        self.persist_theme_field(keys::ABOUT_CERTS_IMAGE, value).await
    }

    /// Restore the built-in theme and forget the stored one.
    pub async fn reset_theme(&self) -> Result<(), AppError> {
        *self.theme.write().await = default_theme();
        self.store.delete(keys::DATA_VERSION).await?;
        for key in keys::THEME_KEYS {
            self.store.delete(key).await?;
        }
        tracing::info!("Theme reset to defaults");
        Ok(())
    }

    // --- Catalog ---

    fn schedule_save(&self) {
        if self.is_loaded() {
            self.saver.schedule();
        }
    }

    /// Sanitize and prepend a product. Returns the stored shape.
    pub async fn add_product(&self, raw: &Value) -> Product {
        let product = sanitize_product(raw);
        self.catalog.write().await.products.insert(0, product.clone());
        self.schedule_save();
        product
    }

    pub async fn delete_product(&self, id: &str) -> bool {
        let removed = {
            let mut catalog = self.catalog.write().await;
            let before = catalog.products.len();
            catalog.products.retain(|p| p.id != id);
            catalog.products.len() != before
        };
        if removed {
            self.schedule_save();
        }
        removed
    }

    /// Add a category with the default subcategory. Existing names are left
    /// untouched.
    pub async fn add_category(&self, name: &str) -> bool {
        {
            let mut catalog = self.catalog.write().await;
            if catalog.has_category(name) {
                return false;
            }
            catalog.categories.push(Category::new(name));
        }
        self.schedule_save();
        true
    }

    pub async fn delete_category(&self, name: &str) -> bool {
        let removed = {
            let mut catalog = self.catalog.write().await;
            let before = catalog.categories.len();
            catalog.categories.retain(|c| c.name != name);
            catalog.categories.len() != before
        };
        if removed {
            self.schedule_save();
        }
        removed
    }

    /// Restore the built-in catalog and forget the stored one.
    pub async fn reset_catalog(&self) -> Result<(), AppError> {
        self.saver.cancel().await;
        *self.catalog.write().await = default_catalog();

        let meta = codec::read_meta(&self.store).await;
        for key in codec::stale_chunk_keys(meta.as_ref(), 0) {
            self.store.delete(&key).await?;
        }
        for key in [
            keys::CATEGORIES,
            keys::LEGACY_PRODUCTS,
            keys::CATALOG_META,
            keys::CATALOG_VERSION,
        ] {
            self.store.delete(key).await?;
        }
        tracing::info!("Catalog reset to defaults");
        Ok(())
    }

    // --- Whole-store operations ---

    /// Delete every stored record and local flag, then reload from the host.
    pub async fn hard_reset(&self) -> Result<(), AppError> {
        self.saver.cancel().await;
        self.store.clear_all().await?;
        self.flags.clear_all().await?;
        tracing::warn!("Hard reset: local data cleared");
        self.reload().await;
        Ok(())
    }

    pub async fn export_backup(&self, path: &Path) -> Result<WrittenFile, AppError> {
        let backup = export::build_backup(&*self.theme.read().await, &*self.catalog.read().await);
        export::write_backup(path, &backup).await
    }

    pub async fn publish_documents(&self, dir: &Path) -> Result<Vec<WrittenFile>, AppError> {
        let bundle = export::split_documents(
            &*self.theme.read().await,
            &*self.catalog.read().await,
            &VersionToken::now(),
        );
        export::write_publish_bundle(dir, &bundle).await
    }

    /// Restore a backup and, when it goes through, reload from the store.
    pub async fn restore_backup<C, P>(
        &self,
        text: &str,
        confirm: C,
        progress: P,
    ) -> Result<RestoreOutcome, AppError>
    where
        C: FnOnce(&RestorePreview) -> bool,
        P: FnMut(RestoreProgress),
    {
        self.saver.cancel().await;
        let pipeline = RestorePipeline::new(
            self.store.clone(),
            self.flag.clone(),
            RestoreOptions::from_config(&self.config),
        );
        let outcome = pipeline.run(text, confirm, progress).await?;
        if let RestoreOutcome::Restored(_) = &outcome {
            self.reload().await;
        }
        Ok(outcome)
    }

    pub async fn probe_remote(&self) -> Vec<RemoteFileStatus> {
        probe_published(&self.remote).await
    }
}
