//! Startup reconciliation between the local store and the published documents.
//!
//! Each provider (theme assets and catalog) runs once per load. Unless the
//! forced-local flag is active it fetches the published documents, compares
//! versions with [`should_overwrite`], and either adopts the remote data or
//! loads what is stored locally.

mod catalog;
mod flag;
mod theme;

use serde::Serialize;

use crate::models::VersionToken;
use crate::remote::FetchFailure;

pub use catalog::{load_catalog_from_store, persist_catalog, reconcile_catalog, CatalogLoad};
pub use flag::ForceLocalFlag;
pub use theme::{load_theme_from_store, reconcile_theme, theme_entries, ThemeLoad};

/// Whether a remote version supersedes the local one.
///
/// Two backup tokens compare numerically. Any other non-empty remote token
/// that differs from local wins, unless local is a backup token: an imported
/// backup is never replaced by a plain release tag.
pub fn should_overwrite(local: &VersionToken, remote: &VersionToken) -> bool {
    if remote.is_empty() || remote == local {
        return false;
    }
    if local.is_unset() || !local.is_backup_shaped() {
        return true;
    }
    match (local.timestamp(), remote.timestamp()) {
        (Some(local), Some(remote)) => remote > local,
        _ => false,
    }
}

/// Which path a reconciliation run took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePath {
    /// Forced-local flag active; no network calls made
    ForcedLocal,
    RemoteOverwrite,
    Local,
}

/// Outcome of one reconciliation run, for logs and the status command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub provider: &'static str,
    pub path: ReconcilePath,
    pub local_version: VersionToken,
    pub remote_version: Option<VersionToken>,
    /// Document the remote data came from, if any was usable
    pub source: Option<&'static str>,
    pub fetch_status: String,
}

impl ReconcileReport {
    fn forced_local(provider: &'static str, local_version: VersionToken) -> Self {
        Self {
            provider,
            path: ReconcilePath::ForcedLocal,
            local_version,
            remote_version: None,
            source: None,
            fetch_status: "skipped".to_string(),
        }
    }

    fn log(&self) {
        tracing::info!(
            provider = self.provider,
            path = ?self.path,
            local = %self.local_version,
            remote = self.remote_version.as_ref().map(VersionToken::as_str).unwrap_or("-"),
            source = self.source.unwrap_or("-"),
            fetch = %self.fetch_status,
            "Reconciled"
        );
    }
}

/// Result of fetching a provider's documents, with the document it came from.
type Fetched = Result<(crate::models::RemoteDocument, &'static str), FetchFailure>;

fn fetch_status(fetched: &Fetched) -> String {
    match fetched {
        Ok(_) => "ok".to_string(),
        Err(failure) => failure.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide(local: &str, remote: &str) -> bool {
        should_overwrite(&VersionToken::from(local), &VersionToken::from(remote))
    }

    #[test]
    fn test_should_overwrite() {
        assert!(decide("1.3.1", "1700000000123"));
        assert!(decide("1700000000000", "1700000000999"));
        assert!(!decide("1700000000999", "1700000000000"));
        assert!(!decide("1700000000000", "1700000000000"));
        assert!(!decide("1.3.1", "1.3.1"));
        assert!(decide("0", "1.3.1"));
        assert!(decide("0", "1700000000000"));
        assert!(!decide("0", ""));
        assert!(!decide("1700000000000", "1.4.0"));
        assert!(decide("1.3.1", "1.3.0"));
    }
}
