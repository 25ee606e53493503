//! SQLite-backed storage for the offline cache and local flags.
//!
//! This module provides persistent storage using SQLite with async access
//! via tokio-rusqlite. It supports:
//!
//! - Named, versioned cache generations holding responses keyed by URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - A small key/value table for browser-local style flags

pub mod connection;
pub mod hash;
pub mod local_storage;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use storage::StoredResponse;
