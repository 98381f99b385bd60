//! Persisted key namespace.

/// Version of the theme assets currently stored.
pub const DATA_VERSION: &str = "data_version";
/// Version of the catalog currently stored.
pub const CATALOG_VERSION: &str = "p_version";

pub const HERO_IMAGE: &str = "hero_image";
pub const LOGO_IMAGE: &str = "logo_image";
pub const CERT_IMAGES: &str = "cert_images";
pub const FACTORY_IMAGES: &str = "factory_images";
pub const PRODUCTION_IMAGES: &str = "prod_images";
pub const ROHS_IMAGES: &str = "rohs_images";
pub const EQUIPMENT_IMAGES: &str = "equip_images";
pub const ABOUT_CERTS_IMAGE: &str = "about_certs_image";

/// Every theme asset key, excluding the version.
pub const THEME_KEYS: [&str; 8] = [
    HERO_IMAGE,
    LOGO_IMAGE,
    CERT_IMAGES,
    FACTORY_IMAGES,
    PRODUCTION_IMAGES,
    ROHS_IMAGES,
    EQUIPMENT_IMAGES,
    ABOUT_CERTS_IMAGE,
];

pub const CATEGORIES: &str = "categories";
pub const CATALOG_META: &str = "p_meta";
/// Monolithic product list written by old builds. Read-only fallback.
pub const LEGACY_PRODUCTS: &str = "products";

const CHUNK_PREFIX: &str = "p_chunk_";

/// Key of the catalog chunk at `index`.
pub fn chunk_key(index: usize) -> String {
    format!("{CHUNK_PREFIX}{index}")
}

/// Forced-local marker, stored in the flags table.
pub const FORCE_LOCAL_LOAD: &str = "force_local_load";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_key() {
        assert_eq!(chunk_key(0), "p_chunk_0");
        assert_eq!(chunk_key(12), "p_chunk_12");
    }
}
