//! Shared test utilities for the extension marketplace workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`archive`]: in-memory tar.gz and zip builders
//! - [`transport`]: [`MemoryTransport`], a scriptable download transport
//! - [`market`]: [`TestMarket`], a sandboxed installer with registry and transport

pub mod archive;
pub mod market;
pub mod transport;

pub use archive::{tar_gz_archive, zip_archive};
pub use market::TestMarket;
pub use transport::{Failure, MemoryTransport};
