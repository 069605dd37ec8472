//! Domain types for gatehop: the target catalog, per-attempt credentials and
//! the on-disk configuration.

pub mod catalog;
pub mod config;
pub mod credentials;

pub use catalog::{Catalog, CatalogError, TargetDescriptor};
pub use credentials::SessionCredentials;
