//! Core types and shared functionality for folio.
//!
//! This crate provides:
//! - SQLite-backed cache generations and local flags
//! - The active-section tracker, visibility observation and nav highlight
//! - Loading state gated by the first-visit flag
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod loading;
pub mod section;

pub use cache::{CacheDb, StoredResponse};
pub use config::AppConfig;
pub use context::PageContext;
pub use error::Error;
pub use loading::LoadingState;
