//! Document shapes exchanged with the remote host and backup files.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Category, CertImages, ImagePayload, Product, ThemeAssets, VersionToken};

/// A fetched remote document, still untrusted.
///
/// Only the version is lifted out eagerly; sections are handed to the
/// sanitizer as raw JSON.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteDocument {
    pub version: VersionToken,
    body: Value,
}

impl RemoteDocument {
    pub fn from_json(body: Value) -> Self {
        let version = VersionToken::from_json(body.get("version"));
        Self { version, body }
    }

    /// The `theme` section, if it is an object.
    pub fn theme(&self) -> Option<&Value> {
        self.body.get("theme").filter(|v| v.is_object())
    }

    /// Overlay another document's theme fields onto this one's, as when the
    /// core and about documents of a split deployment are combined.
    pub fn merge_theme(mut self, other: &RemoteDocument) -> Self {
        let Some(Value::Object(extra)) = other.body.get("theme") else {
            return self;
        };
        let Some(root) = self.body.as_object_mut() else {
            return self;
        };
        let theme = root
            .entry("theme")
            .or_insert_with(|| Value::Object(Default::default()));
        if !theme.is_object() {
            *theme = Value::Object(Default::default());
        }
        if let Value::Object(fields) = theme {
            for (key, value) in extra {
                fields.insert(key.clone(), value.clone());
            }
        }
        self
    }

    /// Raw `(products, categories)` when the document carries a product list,
    /// either at the top level or nested under the legacy `content` field.
    /// Missing categories come back as an empty list.
    pub fn into_catalog_section(mut self) -> Option<(Value, Value)> {
        let root = self.body.as_object_mut()?;

        let mut content = match root.remove("content") {
            Some(Value::Object(map)) => map,
            _ => Default::default(),
        };

        let products = match root.remove("products") {
            Some(list @ Value::Array(_)) => list,
            _ => match content.remove("products") {
                Some(list @ Value::Array(_)) => list,
                _ => return None,
            },
        };

        let categories = match root.remove("categories") {
            Some(list @ Value::Array(_)) => list,
            _ => content
                .remove("categories")
                .filter(Value::is_array)
                .unwrap_or_else(|| Value::Array(Vec::new())),
        };

        Some((products, categories))
    }
}

/// A full backup as exported by the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    pub version: VersionToken,
    pub theme: ThemeAssets,
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
}

/// `data_core.json`: small, frequently changed assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreDocument {
    pub version: VersionToken,
    pub theme: CoreTheme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreTheme {
    pub hero_image: ImagePayload,
    pub logo_image: Option<ImagePayload>,
    pub cert_images: CertImages,
}

/// `data_about.json`: the heavy gallery images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AboutDocument {
    pub version: VersionToken,
    pub theme: AboutTheme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutTheme {
    pub factory_images: Vec<ImagePayload>,
    pub production_images: Vec<ImagePayload>,
    pub rohs_images: Vec<ImagePayload>,
    pub equipment_images: Vec<ImagePayload>,
    pub about_certs_image: Option<ImagePayload>,
}

/// `data_products.json`: the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductsDocument {
    pub version: VersionToken,
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
}
