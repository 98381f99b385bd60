//! Data models for the site content.
//!
//! Field names serialize in camelCase so stored records, published documents
//! and backup files all share the browser builder's JSON shape.

mod catalog;
pub mod defaults;
mod document;
mod payload;
mod product;
mod theme;
mod version;

pub use catalog::*;
pub use document::*;
pub use payload::*;
pub use product::*;
pub use theme::*;
pub use version::*;
