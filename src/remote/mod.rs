//! Published JSON documents on the remote static host.
//!
//! A fetch either yields a parsed [`RemoteDocument`] or a [`FetchFailure`].
//! Failures are ordinary values here: the reconciler reacts to them by falling
//! back, never by aborting.

#[cfg(test)]
pub(crate) mod fixture;
mod http;
mod probe;

use std::future::Future;

use chrono::Utc;
use rand::Rng;

use crate::models::RemoteDocument;

pub use http::HttpRemote;
pub use probe::{probe, probe_published, RemoteFileStatus, SMALL_FILE_BYTES};

/// Core theme assets of a split deployment.
pub const CORE_DOCUMENT: &str = "data_core.json";
/// About-page galleries of a split deployment.
pub const ABOUT_DOCUMENT: &str = "data_about.json";
/// Catalog of a split deployment.
pub const PRODUCTS_DOCUMENT: &str = "data_products.json";
/// Single-file document published by older builds.
pub const LEGACY_DOCUMENT: &str = "data.json";

pub const PUBLISHED_DOCUMENTS: [&str; 4] =
    [CORE_DOCUMENT, ABOUT_DOCUMENT, PRODUCTS_DOCUMENT, LEGACY_DOCUMENT];

/// First bytes of a large-file-storage pointer served in place of the file.
pub const LARGE_FILE_POINTER_PREFIX: &str = "version https://git-lfs";

/// Why a remote document could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    Network(String),
    Status(u16),
    /// The host answered with something other than JSON, typically an HTML
    /// fallback page
    ContentType(String),
    LargeFilePointer,
    Parse(String),
}

impl FetchFailure {
    /// Short label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            FetchFailure::Network(_) => "network",
            FetchFailure::Status(_) => "status",
            FetchFailure::ContentType(_) => "content-type",
            FetchFailure::LargeFilePointer => "lfs-pointer",
            FetchFailure::Parse(_) => "parse",
        }
    }
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchFailure::Network(msg) => write!(f, "network error: {}", msg),
            FetchFailure::Status(code) => write!(f, "HTTP {}", code),
            FetchFailure::ContentType(ct) => write!(f, "unexpected content type {}", ct),
            FetchFailure::LargeFilePointer => write!(f, "large-file pointer instead of content"),
            FetchFailure::Parse(msg) => write!(f, "invalid JSON: {}", msg),
        }
    }
}

/// Undecoded HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_large_file_pointer(&self) -> bool {
        self.body.trim_start().starts_with(LARGE_FILE_POINTER_PREFIX)
    }
}

/// Source of published documents.
pub trait RemoteSource: Clone + Send + Sync + 'static {
    /// GET one document by file name, bypassing every cache layer.
    fn get(&self, document: &str) -> impl Future<Output = Result<RawResponse, FetchFailure>> + Send;
}

/// A missing content type is accepted; any declared type must mention JSON.
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type.map_or(true, |ct| ct.to_ascii_lowercase().contains("json"))
}

/// `t` and `r` query parameters that defeat intermediate caches.
pub fn cache_busting_query() -> [(&'static str, String); 2] {
    let nonce: u32 = rand::thread_rng().gen_range(0..1_000_000);
    [
        ("t", Utc::now().timestamp_millis().to_string()),
        ("r", nonce.to_string()),
    ]
}

/// Turn a raw response into a document, or say why it cannot be used.
pub fn interpret(response: RawResponse) -> Result<RemoteDocument, FetchFailure> {
    if !response.is_success() {
        return Err(FetchFailure::Status(response.status));
    }
    if !is_json_content_type(response.content_type.as_deref()) {
        return Err(FetchFailure::ContentType(
            response.content_type.unwrap_or_default(),
        ));
    }
    if response.is_large_file_pointer() {
        return Err(FetchFailure::LargeFilePointer);
    }
    serde_json::from_str(&response.body)
        .map(RemoteDocument::from_json)
        .map_err(|err| FetchFailure::Parse(err.to_string()))
}

/// Fetch and interpret one document.
pub async fn fetch_document<R: RemoteSource>(
    remote: &R,
    document: &str,
) -> Result<RemoteDocument, FetchFailure> {
    let result = match remote.get(document).await {
        Ok(response) => interpret(response),
        Err(failure) => Err(failure),
    };
    match &result {
        Ok(doc) => tracing::debug!("Fetched {} (version {})", document, doc.version),
        Err(failure) => tracing::warn!("Fetch of {} failed: {}", document, failure),
    }
    result
}
