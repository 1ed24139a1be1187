//! Executable assembly.
//!
//! This module combines a launcher stub, the JAR payload and a trailer into
//! one executable, and drives multi-target runs.
//!
//! Output is a pure function of the stub bytes, the payload bytes, the entry
//! point, the launch settings and the format version: no timestamps, paths or
//! host details end up in the file, so rebuilding on another machine gives
//! identical bytes.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::format::{LaunchMetadata, PayloadEncoding, Trailer};
use crate::launch::LaunchOptions;
use crate::manifest::JarPayload;
use crate::output::{OutputArtifact, OutputFinalizer};
use crate::stubs::StubRegistry;
use crate::target::PlatformTarget;
use crate::transform::PayloadTransform;
use crate::{PackError, Result};

/// A fully assembled executable held in memory.
#[derive(Debug, Clone)]
pub struct AssembledExecutable {
    target: PlatformTarget,
    bytes: Vec<u8>,
    trailer: Trailer,
}

impl AssembledExecutable {
    /// Platform this executable runs on.
    pub fn target(&self) -> PlatformTarget {
        self.target
    }

    /// The whole file: stub, payload, trailer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume into the file bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Total length in bytes.
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Returns true if there are no bytes (never, for an assembled file).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The trailer written at the end.
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    /// The embedded payload region.
    pub fn payload(&self) -> &[u8] {
        let range = self.trailer.payload_range();
        &self.bytes[range.start as usize..range.end as usize]
    }
}

/// One target and where its executable should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackRequest {
    /// Platform to build for.
    pub target: PlatformTarget,
    /// Output path.
    pub destination: PathBuf,
}

impl PackRequest {
    /// Create a request.
    pub fn new(target: PlatformTarget, destination: impl Into<PathBuf>) -> Self {
        Self {
            target,
            destination: destination.into(),
        }
    }
}

/// Result of one target in a multi-target run.
#[derive(Debug)]
pub struct PackOutcome {
    /// Platform that was built.
    pub target: PlatformTarget,
    /// Requested output path.
    pub destination: PathBuf,
    /// Written artifact or the error for this target.
    pub result: Result<OutputArtifact>,
}

/// Per-target results of a run, in request order.
#[derive(Debug, Default)]
pub struct PackReport {
    /// One entry per request.
    pub outcomes: Vec<PackOutcome>,
}

impl PackReport {
    /// Artifacts that were written.
    pub fn successes(&self) -> impl Iterator<Item = &OutputArtifact> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Targets that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (PlatformTarget, &PackError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.target, e)))
    }

    /// Returns true if every target succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Payload bytes as they will be embedded, plus what the trailer says about
/// them. Shared by every target of a run.
struct EncodedPayload<'a> {
    bytes: Cow<'a, [u8]>,
    encoding: PayloadEncoding,
    launch: Option<LaunchMetadata>,
}

/// Assembles executables from a stub registry and a JAR.
pub struct Packer {
    registry: StubRegistry,
    transform: Option<Box<dyn PayloadTransform>>,
    launch: Option<LaunchOptions>,
    finalizer: OutputFinalizer,
}

impl Packer {
    /// Create a packer that embeds the JAR verbatim and never overwrites.
    pub fn new(registry: StubRegistry) -> Self {
        Self {
            registry,
            transform: None,
            launch: None,
            finalizer: OutputFinalizer::new(),
        }
    }

    /// Encode the payload with `transform` before embedding.
    pub fn with_transform(mut self, transform: impl PayloadTransform + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Embed launch metadata, writing format version 3 trailers.
    pub fn with_launch(mut self, launch: LaunchOptions) -> Self {
        self.launch = Some(launch);
        self
    }

    /// Allow replacing existing output files.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.finalizer = self.finalizer.overwrite(overwrite);
        self
    }

    /// The stub registry in use.
    pub fn registry(&self) -> &StubRegistry {
        &self.registry
    }

    /// Assemble the executable for one target without writing it.
    pub fn assemble(
        &self,
        jar: &JarPayload,
        target: PlatformTarget,
    ) -> Result<AssembledExecutable> {
        let payload = self.encode_payload(jar)?;
        self.assemble_encoded(jar, &payload, target)
    }

    /// Assemble and write the executable for one target.
    pub fn pack(
        &self,
        jar: &JarPayload,
        target: PlatformTarget,
        destination: impl AsRef<Path>,
    ) -> Result<OutputArtifact> {
        let payload = self.encode_payload(jar)?;
        self.pack_encoded(jar, &payload, target, destination.as_ref())
    }

    /// Assemble and write every request, in parallel.
    ///
    /// Returns `Err` only if the shared payload cannot be prepared; failures
    /// of individual targets are reported in the [`PackReport`] and do not
    /// stop the others.
    pub fn pack_all(&self, jar: &JarPayload, requests: &[PackRequest]) -> Result<PackReport> {
        let payload = self.encode_payload(jar)?;

        let outcomes = requests
            .par_iter()
            .map(|req| {
                let result = self.pack_encoded(jar, &payload, req.target, &req.destination);
                if let Err(e) = &result {
                    warn!(platform = %req.target, error = %e, "target failed");
                }
                PackOutcome {
                    target: req.target,
                    destination: req.destination.clone(),
                    result,
                }
            })
            .collect();

        Ok(PackReport { outcomes })
    }

    fn encode_payload<'a>(&self, jar: &'a JarPayload) -> Result<EncodedPayload<'a>> {
        // Resolved before any encoding work so bad settings fail fast
        let launch = self
            .launch
            .as_ref()
            .map(|options| options.resolve(jar))
            .transpose()?;

        let (bytes, encoding) = match &self.transform {
            None => (Cow::Borrowed(jar.bytes()), PayloadEncoding::Raw),
            Some(transform) => {
                let bytes = transform.compress(jar.bytes())?;
                debug!(
                    transform = transform.name(),
                    raw = jar.len(),
                    encoded = bytes.len(),
                    "encoded payload"
                );
                (Cow::Owned(bytes), transform.encoding())
            }
        };

        Ok(EncodedPayload {
            bytes,
            encoding,
            launch,
        })
    }

    fn assemble_encoded(
        &self,
        jar: &JarPayload,
        payload: &EncodedPayload<'_>,
        target: PlatformTarget,
    ) -> Result<AssembledExecutable> {
        let stub = self.registry.resolve(target)?;

        let payload_len = payload.bytes.len() as u64;
        let trailer = match &payload.launch {
            Some(launch) => Trailer::with_launch(
                payload.encoding,
                stub.len(),
                payload_len,
                jar.entry_point(),
                launch.clone(),
            )?,
            None => Trailer::new(
                payload.encoding.plain_format_version(),
                stub.len(),
                payload_len,
                jar.entry_point(),
            )?,
        };

        let mut bytes = Vec::with_capacity(trailer.file_length() as usize);
        bytes.extend_from_slice(stub.bytes());
        bytes.extend_from_slice(&payload.bytes);
        bytes.extend_from_slice(&trailer.to_bytes());
        debug_assert_eq!(bytes.len() as u64, trailer.file_length());

        debug!(
            platform = %target,
            stub_size = stub.len(),
            payload_size = payload.bytes.len(),
            total_size = bytes.len(),
            "assembled executable"
        );

        Ok(AssembledExecutable {
            target,
            bytes,
            trailer,
        })
    }

    fn pack_encoded(
        &self,
        jar: &JarPayload,
        payload: &EncodedPayload<'_>,
        target: PlatformTarget,
        destination: &Path,
    ) -> Result<OutputArtifact> {
        let executable = self.assemble_encoded(jar, payload, target)?;
        let artifact = self.finalizer.write(executable.as_bytes(), destination)?;
        info!(
            platform = %target,
            path = %artifact.path.display(),
            size = artifact.size,
            "packed executable"
        );
        Ok(artifact)
    }
}

impl std::fmt::Debug for Packer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packer")
            .field("registry", &self.registry)
            .field("transform", &self.transform.as_ref().map(|t| t.name()))
            .field("launch", &self.launch)
            .field("finalizer", &self.finalizer)
            .finish()
    }
}
