//! SQLite-backed persistent store for cached responses.
//!
//! This module provides the namespaced response store using SQLite with
//! async access via tokio-rusqlite. It supports:
//!
//! - Namespaced entries keyed by request identity
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Purge operations for age, entry-count, and generation bounds

pub mod connection;
pub mod entries;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheStore;
pub use entries::{Entry, EntryMeta, NamespaceStats};
