//! Sitekeeper
//!
//! Local-first persistence and sync for the catalog site builder: a SQLite
//! key-value store holding the site's theme assets and product catalog,
//! reconciled on every load against the JSON documents published on the
//! static host.

pub mod codec;
pub mod config;
pub mod db;
pub mod errors;
pub mod export;
pub mod models;
pub mod reconcile;
pub mod remote;
pub mod restore;
pub mod sanitize;
pub mod state;

pub use state::AppState;

#[cfg(test)]
mod tests;
