//! Filesystem layer for the extension marketplace
//!
//! Provides locked atomic writes, locked reads, SHA-256 helpers and a
//! format-detecting configuration store.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;

pub use config::ConfigStore;
pub use error::{Error, Result};
