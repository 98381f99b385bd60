//! Built-in content used when neither the local store nor the remote host
//! has anything to offer.

use super::{Catalog, Category, CertFile, CertImages, ImagePayload, ThemeAssets, VersionToken};

/// Version stamped on the built-in content.
pub const DEFAULT_VERSION: &str = "1.3.1";

pub const DEFAULT_HERO_IMAGE: &str =
    "https://images.unsplash.com/photo-1550751827-4bd374c3f58b?auto=format&fit=crop&q=80&w=2000";

const DEFAULT_CHINA_CERTS: [&str; 6] = [
    "CCC二插证书-XRT-001/002/003/004/005（中文）",
    "CCC证书- 梅花尾组件",
    "CCC证书- 品字尾组件",
    "CCC证书-八字尾组件",
    "CCC证书-假接地XRT-305",
    "CCC证书-三插",
];

pub fn default_version() -> VersionToken {
    VersionToken::new(DEFAULT_VERSION)
}

pub fn default_cert_images() -> CertImages {
    let mut certs = CertImages::new();
    certs.insert(
        "china".to_string(),
        DEFAULT_CHINA_CERTS
            .iter()
            .map(|name| CertFile::new("", *name))
            .collect(),
    );
    certs
}

pub fn default_theme() -> ThemeAssets {
    ThemeAssets {
        hero_image: ImagePayload::from(DEFAULT_HERO_IMAGE),
        logo_image: None,
        cert_images: default_cert_images(),
        factory_images: Vec::new(),
        production_images: Vec::new(),
        rohs_images: Vec::new(),
        equipment_images: Vec::new(),
        about_certs_image: None,
    }
}

pub fn default_categories() -> Vec<Category> {
    let category = |name: &str, subs: &[&str]| Category {
        name: name.to_string(),
        subs: subs.iter().map(|s| s.to_string()).collect(),
    };
    vec![
        category("Plugs", &["America", "Europe", "Asia", "Others"]),
        category(
            "Power Cords",
            &["UL Standard", "VDE Standard", "IEC Standard", "JIS Standard"],
        ),
        category("Swivel Cords", &["General"]),
    ]
}

pub fn default_catalog() -> Catalog {
    Catalog {
        products: Vec::new(),
        categories: default_categories(),
    }
}
