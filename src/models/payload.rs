//! Image payload handle.

use serde::{Deserialize, Serialize};

/// An image as stored: either an inline `data:` URI or an external URL.
///
/// The content is opaque to the sync layer; only its size matters, for
/// budgeting writes before they reach the storage engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImagePayload(String);

impl ImagePayload {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bytes this payload occupies once stored.
    pub fn byte_len(&self) -> u64 {
        self.0.len() as u64
    }

    pub fn is_data_uri(&self) -> bool {
        self.0.starts_with("data:")
    }
}

impl From<&str> for ImagePayload {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ImagePayload {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Total stored size of a list of payloads.
pub fn payload_bytes<'a>(images: impl IntoIterator<Item = &'a ImagePayload>) -> u64 {
    images.into_iter().map(ImagePayload::byte_len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_accounting() {
        let inline = ImagePayload::from("data:image/png;base64,AAAA");
        let external = ImagePayload::from("https://example.com/a.jpg");

        assert!(inline.is_data_uri());
        assert!(!external.is_data_uri());
        assert_eq!(payload_bytes([&inline, &external]), 26 + 25);
        assert_eq!(serde_json::to_string(&external).unwrap(), "\"https://example.com/a.jpg\"");
    }
}
