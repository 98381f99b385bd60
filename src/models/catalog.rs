//! Category model and the in-memory catalog.

use serde::{Deserialize, Serialize};

use super::Product;

/// Subcategory given to categories created by the operator.
pub const DEFAULT_SUBCATEGORY: &str = "General";

/// A product category. `name` is unique within the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub subs: Vec<String>,
}

impl Category {
    /// A fresh category with the single default subcategory.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subs: vec![DEFAULT_SUBCATEGORY.to_string()],
        }
    }
}

/// The product catalog as held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
}

impl Catalog {
    pub fn has_category(&self, name: &str) -> bool {
        self.categories.iter().any(|c| c.name == name)
    }

    pub fn image_bytes(&self) -> u64 {
        self.products.iter().map(Product::image_bytes).sum()
    }
}
