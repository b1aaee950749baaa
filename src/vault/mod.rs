//! Vault module: on-disk persistence.
//!
//! This module provides:
//! - Owner-only directories and atomic writes (`atomic`)
//! - The built-in backend's JSON document (`document`)
//! - The external backends' one-file-per-secret layout (`files`)

pub mod atomic;
pub mod document;
pub mod files;

pub use document::{read_document, write_document, StoreDocument};
pub use files::SecretFiles;
