//! Core types and shared functionality for satchel.
//!
//! This crate provides:
//! - Namespaced response store with SQLite backend
//! - Entry key derivation
//! - Precache manifest types
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod key;
pub mod manifest;
pub mod store;

pub use config::AppConfig;
pub use error::Error;
pub use manifest::{ManifestEntry, PrecacheManifest};
pub use store::{CacheStore, Entry};
