//! Health readout for published documents.

use serde::Serialize;
use serde_json::Value;

use super::{RemoteSource, PUBLISHED_DOCUMENTS};
use crate::models::VersionToken;

/// Published documents smaller than this are probably truncated or empty.
pub const SMALL_FILE_BYTES: usize = 50_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteFileStatus {
    pub document: String,
    pub size_bytes: usize,
    pub version: String,
    pub status: String,
}

/// Fetch one document and describe what the host is serving.
pub async fn probe<R: RemoteSource>(remote: &R, document: &str) -> RemoteFileStatus {
    let mut report = RemoteFileStatus {
        document: document.to_string(),
        size_bytes: 0,
        version: "-".to_string(),
        status: String::new(),
    };

    let response = match remote.get(document).await {
        Ok(response) => response,
        Err(failure) => {
            report.status = format!("Error: {}", failure);
            return report;
        }
    };
    if !response.is_success() {
        report.version = "Not Found".to_string();
        report.status = format!("HTTP {}", response.status);
        return report;
    }

    report.size_bytes = response.body.len();
    if response.is_large_file_pointer() {
        report.version = "GIT LFS ERROR".to_string();
        report.status = "LFS Pointer detected".to_string();
        return report;
    }

    report.version = match serde_json::from_str::<Value>(&response.body) {
        Ok(body) => {
            let version = VersionToken::from_json(body.get("version"));
            if version.is_empty() {
                "No Ver".to_string()
            } else {
                version.to_string()
            }
        }
        Err(_) => "Invalid JSON".to_string(),
    };
    report.status = if report.size_bytes < SMALL_FILE_BYTES {
        "Small".to_string()
    } else {
        "Good".to_string()
    };
    report
}

/// Probe every document a deployment may publish.
pub async fn probe_published<R: RemoteSource>(remote: &R) -> Vec<RemoteFileStatus> {
    let mut reports = Vec::with_capacity(PUBLISHED_DOCUMENTS.len());
    for document in PUBLISHED_DOCUMENTS {
        reports.push(probe(remote, document).await);
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fixture::FixtureRemote;
    use serde_json::json;

    #[tokio::test]
    async fn test_probe_statuses() {
        let remote = FixtureRemote::new();
        remote.serve_json("data_core.json", &json!({ "version": "1700000000000" }));
        remote.serve(
            "data_about.json",
            200,
            Some("text/plain"),
            "version https://git-lfs.github.com/spec/v1\noid sha256:abc\n",
        );
        let big = json!({ "products": ["x".repeat(SMALL_FILE_BYTES)] });
        remote.serve_json("data_products.json", &big);

        let reports = probe_published(&remote).await;
        assert_eq!(reports.len(), 4);

        assert_eq!(reports[0].version, "1700000000000");
        assert_eq!(reports[0].status, "Small");

        assert_eq!(reports[1].version, "GIT LFS ERROR");
        assert_eq!(reports[1].status, "LFS Pointer detected");

        assert_eq!(reports[2].version, "No Ver");
        assert_eq!(reports[2].status, "Good");
        assert!(reports[2].size_bytes > SMALL_FILE_BYTES);

        assert_eq!(reports[3].version, "Not Found");
        assert_eq!(reports[3].status, "HTTP 404");
        assert_eq!(reports[3].size_bytes, 0);
    }
}
