//! Backup export and the split documents published to the static host.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::AppError;
use crate::models::{
    AboutDocument, AboutTheme, BackupDocument, Catalog, CoreDocument, CoreTheme, ProductsDocument,
    ThemeAssets, VersionToken,
};
use crate::remote::{ABOUT_DOCUMENT, CORE_DOCUMENT, PRODUCTS_DOCUMENT};

/// Published files above this size tend to be rejected by static hosts.
pub const LARGE_PUBLISH_BYTES: u64 = 20 * 1024 * 1024;

/// A file written by an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub bytes: u64,
    pub oversized: bool,
}

/// Full backup stamped with the current time.
pub fn build_backup(theme: &ThemeAssets, catalog: &Catalog) -> BackupDocument {
    BackupDocument {
        version: VersionToken::now(),
        theme: theme.clone(),
        products: catalog.products.clone(),
        categories: catalog.categories.clone(),
    }
}

/// The three published documents, sharing one version.
pub struct PublishBundle {
    pub core: CoreDocument,
    pub about: AboutDocument,
    pub products: ProductsDocument,
}

pub fn split_documents(theme: &ThemeAssets, catalog: &Catalog, version: &VersionToken) -> PublishBundle {
    PublishBundle {
        core: CoreDocument {
            version: version.clone(),
            theme: CoreTheme {
                hero_image: theme.hero_image.clone(),
                logo_image: theme.logo_image.clone(),
                cert_images: theme.cert_images.clone(),
            },
        },
        about: AboutDocument {
            version: version.clone(),
            theme: AboutTheme {
                factory_images: theme.factory_images.clone(),
                production_images: theme.production_images.clone(),
                rohs_images: theme.rohs_images.clone(),
                equipment_images: theme.equipment_images.clone(),
                about_certs_image: theme.about_certs_image.clone(),
            },
        },
        products: ProductsDocument {
            version: version.clone(),
            products: catalog.products.clone(),
            categories: catalog.categories.clone(),
        },
    }
}

async fn write_json<T: Serialize>(path: &Path, document: &T) -> Result<WrittenFile, AppError> {
    let text = serde_json::to_string_pretty(document)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &text).await?;

    let bytes = text.len() as u64;
    let oversized = bytes > LARGE_PUBLISH_BYTES;
    if oversized {
        tracing::warn!(
            "{} is {:.1} MB; static hosts may refuse files this large",
            path.display(),
            bytes as f64 / (1024.0 * 1024.0)
        );
    } else {
        tracing::info!("Wrote {} ({} bytes)", path.display(), bytes);
    }
    Ok(WrittenFile {
        path: path.to_path_buf(),
        bytes,
        oversized,
    })
}

pub async fn write_backup(path: &Path, backup: &BackupDocument) -> Result<WrittenFile, AppError> {
    write_json(path, backup).await
}

/// Write the split documents into `dir` under their published names.
pub async fn write_publish_bundle(dir: &Path, bundle: &PublishBundle) -> Result<Vec<WrittenFile>, AppError> {
    Ok(vec![
        write_json(&dir.join(CORE_DOCUMENT), &bundle.core).await?,
        write_json(&dir.join(ABOUT_DOCUMENT), &bundle.about).await?,
        write_json(&dir.join(PRODUCTS_DOCUMENT), &bundle.products).await?,
    ])
}
