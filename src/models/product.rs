//! Product model matching the builder's catalog entry.

use serde::{Deserialize, Serialize};

use super::{payload_bytes, ImagePayload};

/// One row of the bilingual specification table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductParam {
    pub label_en: String,
    pub label_zh: String,
    pub value_en: String,
    pub value_zh: String,
}

/// A catalog entry. Every field is populated once it has passed through
/// [`crate::sanitize::sanitize_product`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub category: String,
    pub sub_category: String,
    pub name_en: String,
    pub name_zh: String,
    pub description_en: String,
    pub description_zh: String,
    pub features_en: Vec<String>,
    pub features_zh: Vec<String>,
    pub params: Vec<ProductParam>,
    pub images: Vec<ImagePayload>,
}

impl Product {
    /// Bytes held by the product's images.
    pub fn image_bytes(&self) -> u64 {
        payload_bytes(&self.images)
    }
}
