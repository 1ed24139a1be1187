//! Executable assembly for jarforge.
//!
//! This crate turns a runnable JAR into a native executable by appending the
//! archive and a small trailer to a precompiled, platform-specific launcher
//! stub. The stub is never parsed or patched; it finds its payload at runtime
//! by reading the trailer from the end of its own file.
//!
//! # Binary Format
//!
//! ```text
//! +---------------------------+
//! | Stub Executable           |  opaque, per platform
//! +---------------------------+
//! | Payload                   |  the JAR, byte-for-byte
//! |                           |  (or one zstd frame, v2)
//! +---------------------------+
//! | Trailer (32 + n [+ m])    |
//! |  - magic: "JFRG"          |
//! |  - version, lengths       |
//! |  - entry point class      |
//! |  - launch block (v3)      |
//! |  - trailer length         |
//! +---------------------------+
//! ```
//!
//! See [`format`] for the exact trailer layout.
//!
//! # Example
//!
//! ```no_run
//! use jarforge_pack::{JarPayload, Packer, PlatformTarget, StubRegistry};
//!
//! let registry = StubRegistry::from_dir("/usr/share/jarforge/stubs");
//! let jar = JarPayload::read("app.jar").unwrap();
//! let target: PlatformTarget = "linux/x64".parse().unwrap();
//!
//! let packer = Packer::new(registry);
//! let artifact = packer.pack(&jar, target, "dist/app").unwrap();
//! println!("wrote {}", artifact.path.display());
//! ```

#![deny(missing_docs)]

pub mod extract;
pub mod format;
pub mod launch;
pub mod manifest;
pub mod output;
pub mod packer;
pub mod stubs;
pub mod target;
pub mod transform;

pub use format::{
    LaunchMetadata, PayloadEncoding, Trailer, FORMAT_VERSION, FORMAT_VERSION_LAUNCH,
    FORMAT_VERSION_ZSTD, MAGIC, MIN_TRAILER_SIZE,
};
pub use launch::LaunchOptions;
pub use manifest::{JarPayload, ManifestAttributes};
pub use output::{OutputArtifact, OutputFinalizer};
pub use packer::{AssembledExecutable, PackOutcome, PackReport, PackRequest, Packer};
pub use stubs::{DirectoryStubSource, MemoryStubSource, StubBinary, StubRegistry, StubSource};
pub use target::{Arch, Os, PlatformTarget};
pub use transform::{Identity, PayloadTransform, Zstd};

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during pack operations.
#[derive(Debug, Error)]
pub enum PackError {
    /// I/O error reading a stub or the JAR, or writing an output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No stub is bundled for the requested platform.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The input is not a well-formed JAR archive.
    #[error("invalid jar {}: {reason}", path.display())]
    InvalidJar {
        /// Path of the offending archive.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// The JAR declares no usable entry-point class.
    #[error("missing entry point in {}: {reason}", path.display())]
    MissingEntryPoint {
        /// Path of the offending archive.
        path: PathBuf,
        /// Why the entry point could not be used.
        reason: String,
    },

    /// The entry class needs a newer Java than the one a stub would install.
    #[error(
        "{} needs Java {required} but the preferred Java version is {preferred}",
        path.display()
    )]
    IncompatibleJava {
        /// Path of the offending archive.
        path: PathBuf,
        /// Java release the entry class was compiled for.
        required: u16,
        /// Release a stub offers to install.
        preferred: u16,
    },

    /// Launch settings contradict each other or exceed a field limit.
    #[error("invalid launch options: {0}")]
    InvalidLaunchOptions(String),

    /// The executable bit could not be set on an output.
    #[error("permission denied setting mode on {}: {source}", path.display())]
    PermissionDenied {
        /// Output path that was being finalized.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Destination exists and overwriting was not allowed.
    #[error("output already exists: {}", path.display())]
    AlreadyExists {
        /// The existing destination.
        path: PathBuf,
    },

    /// Invalid magic bytes in trailer.
    #[error("invalid magic: expected JFRG")]
    InvalidMagic,

    /// Unsupported format version.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u32),

    /// Trailer is truncated or internally inconsistent.
    #[error("malformed trailer: {0}")]
    MalformedTrailer(String),

    /// Compression error.
    #[error("compression error: {0}")]
    Compression(String),
}

impl PackError {
    /// Returns true for errors that concern one target only.
    ///
    /// Input errors (bad JAR, missing entry point, unusable launch settings)
    /// abort a whole run because every target shares them; everything else is
    /// isolated.
    pub fn is_per_target(&self) -> bool {
        !matches!(
            self,
            PackError::InvalidJar { .. }
                | PackError::MissingEntryPoint { .. }
                | PackError::IncompatibleJava { .. }
                | PackError::InvalidLaunchOptions(_)
        )
    }
}

/// Result type for pack operations.
pub type Result<T> = std::result::Result<T, PackError>;
