use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::Client;

use super::{cache_busting_query, FetchFailure, RawResponse, RemoteSource};
use crate::errors::AppError;

/// Remote source over HTTP, rooted at the site's base URL.
#[derive(Clone)]
pub struct HttpRemote {
    base: String,
    client: Client,
}

impl HttpRemote {
    pub fn new(base: impl Into<String>, timeout: Option<Duration>) -> Result<Self, AppError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let base: String = base.into();
        Ok(HttpRemote {
            base: base.trim_end_matches('/').to_string(),
            client: builder.build()?,
        })
    }

    pub fn url(&self, document: &str) -> String {
        format!("{}/{}", self.base, document)
    }
}

impl RemoteSource for HttpRemote {
    async fn get(&self, document: &str) -> Result<RawResponse, FetchFailure> {
        let query = cache_busting_query();
        let resp = self
            .client
            .get(self.url(document))
            .query(&query)
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|err| FetchFailure::Network(err.to_string()))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .text()
            .await
            .map_err(|err| FetchFailure::Network(err.to_string()))?;

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}
