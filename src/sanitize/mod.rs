//! Normalization of untrusted JSON into the strict content shapes.
//!
//! Everything here is total: remote documents may be hand-edited and backups
//! may come from older builds, so any missing or mistyped field is replaced by
//! a default instead of failing.

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::defaults::{default_categories, default_theme};
use crate::models::{
    Category, CertFile, CertImages, Gallery, ImagePayload, Product, ProductParam, ThemeAssets,
};

const UNKNOWN_SKU: &str = "UNKNOWN";
const UNCATEGORIZED: &str = "Uncategorized";
const GENERAL: &str = "General";
const UNNAMED_EN: &str = "Unnamed Product";
const UNNAMED_ZH: &str = "未命名产品";
const UNKNOWN_CATEGORY: &str = "Unknown";
const UNKNOWN_CERT: &str = "Unknown";

/// Unique id for entries that arrived without one.
pub fn fallback_id() -> String {
    format!(
        "fallback-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

/// Placeholder for an entry that was not even an object.
fn invalid_product() -> Product {
    Product {
        id: fallback_id(),
        sku: "ERR".to_string(),
        category: UNCATEGORIZED.to_string(),
        sub_category: GENERAL.to_string(),
        name_en: "Invalid Product Data".to_string(),
        name_zh: "无效产品数据".to_string(),
        description_en: String::new(),
        description_zh: String::new(),
        features_en: Vec::new(),
        features_zh: Vec::new(),
        params: Vec::new(),
        images: Vec::new(),
    }
}

/// Non-empty string (or number, rendered) at `field`, else `default`.
fn text_or(obj: &Map<String, Value>, field: &str, default: &str) -> String {
    match obj.get(field) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default.to_string(),
    }
}

/// String items of an array value; non-strings are dropped.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn image_list(value: Option<&Value>) -> Vec<ImagePayload> {
    string_list(value).into_iter().map(ImagePayload::from).collect()
}

/// A single image, or `None` when missing or empty.
fn optional_image(value: Option<&Value>) -> Option<ImagePayload> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(ImagePayload::from(s.as_str())),
        _ => None,
    }
}

fn sanitize_params(value: Option<&Value>) -> Vec<ProductParam> {
    let Some(Value::Array(rows)) = value else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(Value::as_object)
        .map(|row| ProductParam {
            label_en: text_or(row, "labelEn", ""),
            label_zh: text_or(row, "labelZh", ""),
            value_en: text_or(row, "valueEn", ""),
            value_zh: text_or(row, "valueZh", ""),
        })
        .collect()
}

/// Normalize one catalog entry. Never fails.
pub fn sanitize_product(raw: &Value) -> Product {
    let Some(p) = raw.as_object() else {
        return invalid_product();
    };

    let id = match p.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => fallback_id(),
    };

    Product {
        id,
        sku: text_or(p, "sku", UNKNOWN_SKU),
        category: text_or(p, "category", UNCATEGORIZED),
        sub_category: text_or(p, "subCategory", GENERAL),
        name_en: text_or(p, "nameEn", UNNAMED_EN),
        name_zh: text_or(p, "nameZh", UNNAMED_ZH),
        description_en: text_or(p, "descriptionEn", ""),
        description_zh: text_or(p, "descriptionZh", ""),
        features_en: string_list(p.get("featuresEn")),
        features_zh: string_list(p.get("featuresZh")),
        params: sanitize_params(p.get("params")),
        images: image_list(p.get("images")),
    }
}

/// Normalize a product list. A non-array yields an empty list.
pub fn sanitize_products(raw: &Value) -> Vec<Product> {
    match raw {
        Value::Array(items) => items.iter().map(sanitize_product).collect(),
        _ => Vec::new(),
    }
}

/// Normalize a category list. A non-array yields the built-in categories.
pub fn sanitize_categories(raw: &Value) -> Vec<Category> {
    let Value::Array(items) = raw else {
        return default_categories();
    };
    items
        .iter()
        .map(|item| Category {
            name: item
                .get("name")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN_CATEGORY)
                .to_string(),
            subs: string_list(item.get("subs")),
        })
        .collect()
}

/// Shapes a certificate entry has been stored in over time.
enum CertEntry<'a> {
    /// Bare URL from builds that stored one file per slot
    Url(&'a str),
    File(&'a Map<String, Value>),
    Unrecognized,
}

impl<'a> CertEntry<'a> {
    fn classify(value: &'a Value) -> Self {
        match value {
            Value::String(url) => CertEntry::Url(url),
            Value::Object(fields) => CertEntry::File(fields),
            _ => CertEntry::Unrecognized,
        }
    }

    fn into_file(self, position: usize) -> CertFile {
        match self {
            CertEntry::Url(url) => CertFile::new(url, format!("Certificate {}.pdf", position + 1)),
            CertEntry::File(fields) => CertFile::new(
                fields.get("url").and_then(Value::as_str).unwrap_or(""),
                text_or(fields, "name", UNKNOWN_CERT),
            ),
            CertEntry::Unrecognized => CertFile::new("", UNKNOWN_CERT),
        }
    }
}

/// Normalize the slot-to-certificates map.
///
/// A slot holding a single string becomes one `Certificate.pdf` entry; slots
/// holding anything other than a list or a string are dropped.
pub fn normalize_cert_images(raw: &Value) -> CertImages {
    let mut certs = CertImages::new();
    let Value::Object(slots) = raw else {
        return certs;
    };
    for (slot, value) in slots {
        let files = match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| CertEntry::classify(item).into_file(i))
                .collect(),
            Value::String(url) => vec![CertFile::new(url.as_str(), "Certificate.pdf")],
            _ => continue,
        };
        certs.insert(slot.clone(), files);
    }
    certs
}

/// Normalize a theme section. A missing hero banner or certificate map falls
/// back to the built-in theme; other missing assets are empty.
pub fn sanitize_theme(raw: &Value) -> ThemeAssets {
    let defaults = default_theme();
    let Some(theme) = raw.as_object() else {
        return defaults;
    };

    let mut assets = ThemeAssets {
        hero_image: optional_image(theme.get("heroImage")).unwrap_or(defaults.hero_image),
        logo_image: optional_image(theme.get("logoImage")),
        cert_images: theme
            .get("certImages")
            .map(normalize_cert_images)
            .unwrap_or(defaults.cert_images),
        factory_images: Vec::new(),
        production_images: Vec::new(),
        rohs_images: Vec::new(),
        equipment_images: Vec::new(),
        about_certs_image: optional_image(theme.get("aboutCertsImage")),
    };
    for gallery in Gallery::ALL {
        *assets.gallery_mut(gallery) = image_list(theme.get(gallery.document_field()));
    }
    assets
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_shape(product: &Product) {
        assert!(!product.id.is_empty());
        assert!(!product.sku.is_empty());
        assert!(!product.category.is_empty());
        assert!(!product.sub_category.is_empty());
        assert!(!product.name_en.is_empty());
        assert!(!product.name_zh.is_empty());
    }

    #[test]
    fn test_sanitize_product_malformed_inputs() {
        let inputs = [
            json!(null),
            json!(42),
            json!("product"),
            json!([1, 2, 3]),
            json!({}),
            json!({ "id": null, "sku": 7, "images": "not-a-list" }),
            json!({ "featuresEn": [1, "ok", null], "params": [null, "x", {}] }),
            json!({ "images": ["a.jpg", 3, {"src": "b.jpg"}, "c.jpg"] }),
        ];

        for input in &inputs {
            let product = sanitize_product(input);
            assert_shape(&product);
        }

        let invalid = sanitize_product(&json!(null));
        assert_eq!(invalid.sku, "ERR");
        assert_eq!(invalid.name_en, "Invalid Product Data");
        assert!(invalid.id.starts_with("fallback-"));

        let numeric_sku = sanitize_product(&inputs[5]);
        assert_eq!(numeric_sku.sku, "7");
        assert!(numeric_sku.images.is_empty());

        let mixed = sanitize_product(&inputs[6]);
        assert_eq!(mixed.features_en, vec!["ok".to_string()]);
        assert_eq!(mixed.params, vec![ProductParam::default()]);

        let images = sanitize_product(&inputs[7]);
        assert_eq!(
            images.images,
            vec![ImagePayload::from("a.jpg"), ImagePayload::from("c.jpg")]
        );
    }

    #[test]
    fn test_sanitize_product_keeps_valid_fields() {
        let raw = json!({
            "id": "p-1",
            "sku": "XRT-001",
            "category": "Plugs",
            "subCategory": "Europe",
            "nameEn": "Schuko plug",
            "nameZh": "欧标插头",
            "descriptionEn": "16A",
            "descriptionZh": "16安",
            "featuresEn": ["VDE"],
            "featuresZh": ["VDE认证"],
            "params": [{ "labelEn": "Rating", "labelZh": "额定", "valueEn": "16A", "valueZh": "16安" }],
            "images": ["data:image/jpeg;base64,AAAA"]
        });

        let product = sanitize_product(&raw);
        assert_eq!(serde_json::to_value(&product).unwrap(), raw);
    }

    #[test]
    fn test_fallback_ids_are_unique() {
        let a = sanitize_product(&json!({}));
        let b = sanitize_product(&json!({}));
        assert_ne!(a.id, b.id);
        assert_eq!(a.name_en, UNNAMED_EN);
        assert_eq!(a.name_zh, UNNAMED_ZH);
    }

    #[test]
    fn test_sanitize_categories() {
        assert_eq!(sanitize_categories(&json!(null)), default_categories());
        assert_eq!(sanitize_categories(&json!({"name": "x"})), default_categories());
        assert!(sanitize_categories(&json!([])).is_empty());

        let cats = sanitize_categories(&json!([
            { "name": "Plugs", "subs": ["America", 3] },
            { "subs": "nope" },
            null
        ]));
        assert_eq!(cats.len(), 3);
        assert_eq!(cats[0].subs, vec!["America".to_string()]);
        assert_eq!(cats[1].name, "Unknown");
        assert!(cats[1].subs.is_empty());
        assert_eq!(cats[2].name, "Unknown");
    }

    #[test]
    fn test_normalize_cert_images() {
        let certs = normalize_cert_images(&json!({
            "china": ["data:application/pdf;base64,AA", { "url": "", "name": "CCC" }, 5],
            "europe": "https://example.com/ce.pdf",
            "usa": 12
        }));

        assert_eq!(
            certs["china"],
            vec![
                CertFile::new("data:application/pdf;base64,AA", "Certificate 1.pdf"),
                CertFile::new("", "CCC"),
                CertFile::new("", "Unknown"),
            ]
        );
        assert_eq!(
            certs["europe"],
            vec![CertFile::new("https://example.com/ce.pdf", "Certificate.pdf")]
        );
        assert!(!certs.contains_key("usa"));
        assert!(normalize_cert_images(&json!([])).is_empty());
    }

    #[test]
    fn test_sanitize_theme() {
        let theme = sanitize_theme(&json!({
            "heroImage": "",
            "logoImage": "logo.png",
            "productionImages": ["line.jpg", null],
            "rohsImages": "bad"
        }));

        assert_eq!(theme.hero_image, default_theme().hero_image);
        assert_eq!(theme.logo_image, Some(ImagePayload::from("logo.png")));
        assert_eq!(theme.production_images, vec![ImagePayload::from("line.jpg")]);
        assert!(theme.rohs_images.is_empty());
        assert_eq!(theme.cert_images, default_theme().cert_images);
        assert!(theme.about_certs_image.is_none());

        assert_eq!(sanitize_theme(&json!("garbage")), default_theme());
    }
}
