//! In-process remote used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use super::{FetchFailure, RawResponse, RemoteSource};

#[derive(Clone, Default)]
pub struct FixtureRemote {
    responses: Arc<Mutex<HashMap<String, RawResponse>>>,
    calls: Arc<AtomicUsize>,
}

impl FixtureRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, document: &str, status: u16, content_type: Option<&str>, body: &str) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                document.to_string(),
                RawResponse {
                    status,
                    content_type: content_type.map(str::to_string),
                    body: body.to_string(),
                },
            );
    }

    pub fn serve_json(&self, document: &str, body: &Value) {
        self.serve(document, 200, Some("application/json"), &body.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RemoteSource for FixtureRemote {
    async fn get(&self, document: &str) -> Result<RawResponse, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let found = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(document)
            .cloned();
        Ok(found.unwrap_or(RawResponse {
            status: 404,
            content_type: Some("text/html".to_string()),
            body: "<html>Not Found</html>".to_string(),
        }))
    }
}
