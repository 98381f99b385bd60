use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use super::{fetch_status, Fetched, ReconcilePath, ReconcileReport};
use crate::db::{keys, KvEntry, KvStore};
use crate::errors::AppError;
use crate::models::{ThemeAssets, VersionToken, THEME_FIELDS};
use crate::remote::{fetch_document, RemoteSource, ABOUT_DOCUMENT, CORE_DOCUMENT, LEGACY_DOCUMENT};
use crate::sanitize::sanitize_theme;

const PROVIDER: &str = "theme";

pub struct ThemeLoad {
    pub theme: ThemeAssets,
    pub report: ReconcileReport,
    /// Durable write of adopted remote data, still in flight
    pub background: Option<JoinHandle<()>>,
}

/// Storage entries for a theme, version first.
pub fn theme_entries(theme: &ThemeAssets, version: &VersionToken) -> Result<Vec<KvEntry>, AppError> {
    let mut fields = match serde_json::to_value(theme)? {
        Value::Object(fields) => fields,
        _ => return Err(AppError::Internal("Theme did not serialize to an object".to_string())),
    };

    let mut entries = Vec::with_capacity(THEME_FIELDS.len() + 1);
    entries.push(KvEntry::new(keys::DATA_VERSION, Value::String(version.to_string())));
    for (field, key) in THEME_FIELDS {
        entries.push(KvEntry::new(key, fields.remove(field).unwrap_or(Value::Null)));
    }
    Ok(entries)
}

/// Theme as stored locally, with built-in defaults for anything missing.
pub async fn load_theme_from_store<S: KvStore>(store: &S) -> ThemeAssets {
    let mut fields = Map::new();
    for (field, key) in THEME_FIELDS {
        if let Some(value) = store.get(key).await {
            fields.insert(field.to_string(), value);
        }
    }
    sanitize_theme(&Value::Object(fields))
}

async fn local_version<S: KvStore>(store: &S) -> VersionToken {
    store
        .get_string(keys::DATA_VERSION)
        .await
        .map(VersionToken::new)
        .unwrap_or_else(VersionToken::unset)
}

/// Core and about documents combined, or the legacy single document when the
/// split pair is incomplete or out of step.
async fn fetch_theme_document<R: RemoteSource>(remote: &R) -> Fetched {
    let (core, about) = tokio::join!(
        fetch_document(remote, CORE_DOCUMENT),
        fetch_document(remote, ABOUT_DOCUMENT)
    );

    match (core, about) {
        (Ok(core), Ok(about)) if core.version == about.version => {
            return Ok((core.merge_theme(&about), CORE_DOCUMENT));
        }
        (Ok(core), Ok(about)) => tracing::warn!(
            "Split theme documents disagree ({} vs {}), trying {}",
            core.version,
            about.version,
            LEGACY_DOCUMENT
        ),
        _ => tracing::info!("Split theme documents unavailable, trying {}", LEGACY_DOCUMENT),
    }

    fetch_document(remote, LEGACY_DOCUMENT)
        .await
        .map(|doc| (doc, LEGACY_DOCUMENT))
}

/// Decide between the stored theme and the published one.
pub async fn reconcile_theme<S: KvStore, R: RemoteSource>(
    store: &S,
    remote: &R,
    forced_local: bool,
) -> ThemeLoad {
    let local = local_version(store).await;

    if forced_local {
        let report = ReconcileReport::forced_local(PROVIDER, local);
        report.log();
        return ThemeLoad {
            theme: load_theme_from_store(store).await,
            report,
            background: None,
        };
    }

    let fetched = fetch_theme_document(remote).await;
    let mut report = ReconcileReport {
        provider: PROVIDER,
        path: ReconcilePath::Local,
        local_version: local.clone(),
        remote_version: None,
        source: None,
        fetch_status: fetch_status(&fetched),
    };

    if let Ok((doc, source)) = &fetched {
        report.remote_version = Some(doc.version.clone());
        report.source = Some(*source);

        if let Some(raw) = doc.theme() {
            if super::should_overwrite(&local, &doc.version) {
                let theme = sanitize_theme(raw);
                let background = spawn_write(store, &theme, &doc.version);
                report.path = ReconcilePath::RemoteOverwrite;
                report.log();
                return ThemeLoad {
                    theme,
                    report,
                    background,
                };
            }
        }
    }

    report.log();
    ThemeLoad {
        theme: load_theme_from_store(store).await,
        report,
        background: None,
    }
}

fn spawn_write<S: KvStore>(
    store: &S,
    theme: &ThemeAssets,
    version: &VersionToken,
) -> Option<JoinHandle<()>> {
    let entries = match theme_entries(theme, version) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::error!("Failed to encode remote theme: {}", err);
            return None;
        }
    };
    let store = store.clone();
    Some(tokio::spawn(async move {
        match store.set_many(&entries).await {
            Ok(()) => tracing::info!("Stored remote theme"),
            Err(err) => tracing::error!("Failed to store remote theme: {}", err),
        }
    }))
}
