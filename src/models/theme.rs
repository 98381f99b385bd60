//! Theme assets: banner, logo, certificates and image galleries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{payload_bytes, ImagePayload};
use crate::db::keys;

/// A certificate listed under a slot. An empty `url` means the certificate is
/// listed but its file has not been attached yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertFile {
    pub url: String,
    pub name: String,
}

impl CertFile {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }
}

/// Document field name and storage key of every theme asset.
pub const THEME_FIELDS: [(&str, &str); 8] = [
    ("heroImage", keys::HERO_IMAGE),
    ("logoImage", keys::LOGO_IMAGE),
    ("certImages", keys::CERT_IMAGES),
    ("factoryImages", keys::FACTORY_IMAGES),
    ("productionImages", keys::PRODUCTION_IMAGES),
    ("rohsImages", keys::ROHS_IMAGES),
    ("equipmentImages", keys::EQUIPMENT_IMAGES),
    ("aboutCertsImage", keys::ABOUT_CERTS_IMAGE),
];

/// Slot key to ordered certificate list.
pub type CertImages = BTreeMap<String, Vec<CertFile>>;

/// The named image lists shown on the about page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gallery {
    /// Superseded factory gallery, still published for older pages
    Factory,
    Production,
    Rohs,
    Equipment,
}

impl Gallery {
    pub const ALL: [Gallery; 4] = [
        Gallery::Factory,
        Gallery::Production,
        Gallery::Rohs,
        Gallery::Equipment,
    ];

    /// Storage key for this gallery.
    pub fn key(&self) -> &'static str {
        match self {
            Gallery::Factory => keys::FACTORY_IMAGES,
            Gallery::Production => keys::PRODUCTION_IMAGES,
            Gallery::Rohs => keys::ROHS_IMAGES,
            Gallery::Equipment => keys::EQUIPMENT_IMAGES,
        }
    }

    /// Field name in published and backup documents.
    pub fn document_field(&self) -> &'static str {
        match self {
            Gallery::Factory => "factoryImages",
            Gallery::Production => "productionImages",
            Gallery::Rohs => "rohsImages",
            Gallery::Equipment => "equipmentImages",
        }
    }
}

/// All visual assets the builder edits outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeAssets {
    pub hero_image: ImagePayload,
    pub logo_image: Option<ImagePayload>,
    pub cert_images: CertImages,
    pub factory_images: Vec<ImagePayload>,
    pub production_images: Vec<ImagePayload>,
    pub rohs_images: Vec<ImagePayload>,
    pub equipment_images: Vec<ImagePayload>,
    pub about_certs_image: Option<ImagePayload>,
}

impl ThemeAssets {
    pub fn gallery(&self, gallery: Gallery) -> &Vec<ImagePayload> {
        match gallery {
            Gallery::Factory => &self.factory_images,
            Gallery::Production => &self.production_images,
            Gallery::Rohs => &self.rohs_images,
            Gallery::Equipment => &self.equipment_images,
        }
    }

    pub fn gallery_mut(&mut self, gallery: Gallery) -> &mut Vec<ImagePayload> {
        match gallery {
            Gallery::Factory => &mut self.factory_images,
            Gallery::Production => &mut self.production_images,
            Gallery::Rohs => &mut self.rohs_images,
            Gallery::Equipment => &mut self.equipment_images,
        }
    }

    /// Bytes held by every image in the bundle, certificate files included.
    pub fn image_bytes(&self) -> u64 {
        let galleries: u64 = Gallery::ALL
            .iter()
            .map(|g| payload_bytes(self.gallery(*g)))
            .sum();
        let certs: u64 = self
            .cert_images
            .values()
            .flatten()
            .map(|c| c.url.len() as u64)
            .sum();
        self.hero_image.byte_len()
            + self.logo_image.as_ref().map_or(0, ImagePayload::byte_len)
            + self.about_certs_image.as_ref().map_or(0, ImagePayload::byte_len)
            + galleries
            + certs
    }
}
