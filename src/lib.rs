//! jarforge - native executables from runnable JARs
//!
//! This library backs the `jarforge` binary: pack-file configuration, stub
//! directory discovery and CLI error types. The assembly engine itself lives
//! in the [`jarforge_pack`] crate.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │  jarforge CLI (pack, inspect, extract, targets) │
//! ├─────────────────────────────────────────────────┤
//! │  config: pack file + flags + stub discovery     │
//! ├─────────────────────────────────────────────────┤
//! │  jarforge-pack: stubs, manifest, trailer,       │
//! │  assembly, atomic output                        │
//! └─────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod config;
pub mod error;

pub use error::{Error, Result};

/// Version of jarforge.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
