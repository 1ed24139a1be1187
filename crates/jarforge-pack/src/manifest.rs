//! JAR manifest reading.
//!
//! Loads the input archive once and pulls out what the launcher needs: the
//! entry-point class, the JVM flags implied by manifest attributes, and the
//! minimum Java version the entry class was compiled for. The archive bytes
//! are kept exactly as read; nothing here rewrites the JAR.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::format::MAX_ENTRY_POINT_LEN;
use crate::{PackError, Result};

/// Location of the manifest inside a JAR.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

const CLASS_MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

/// Class file major version of Java 5, the oldest accepted.
const MIN_CLASS_MAJOR: u16 = 49;

/// Bytes of a class file needed to read its major version.
const CLASS_HEADER_LEN: u64 = 8;

/// Main-section attributes of a JAR manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestAttributes {
    entries: Vec<(String, String)>,
}

impl ManifestAttributes {
    /// Parse the main section of a manifest.
    ///
    /// Follows the JAR manifest grammar: `Name: value` headers, continuation
    /// lines that start with a single space, CRLF, CR or LF line endings. The
    /// main section ends at the first blank line; per-entry sections are
    /// ignored.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut entries: Vec<(String, String)> = Vec::new();

        for (index, line) in manifest_lines(text).enumerate() {
            if line.is_empty() {
                break;
            }

            if let Some(rest) = line.strip_prefix(' ') {
                let (_, value) = entries.last_mut().ok_or_else(|| {
                    format!("continuation at line {} has no header to continue", index + 1)
                })?;
                value.push_str(rest);
                continue;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| format!("invalid header at line {} of manifest", index + 1))?;
            if name.is_empty() {
                return Err(format!("empty header name at line {} of manifest", index + 1));
            }
            entries.push((name.to_string(), value.trim_start().to_string()));
        }

        Ok(Self { entries })
    }

    /// Look up an attribute; names compare case-insensitively.
    ///
    /// If a name repeats, the last occurrence wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The declared `Main-Class`, if any.
    pub fn main_class(&self) -> Option<&str> {
        self.get("Main-Class").map(str::trim).filter(|s| !s.is_empty())
    }

    /// JVM flags the `java -jar` launcher would derive from this manifest.
    ///
    /// A stub starts the entry class directly, so these have to be passed
    /// explicitly: `Add-Opens` and `Add-Exports` list `module/package` pairs
    /// opened to the unnamed module, `Enable-Native-Access` is passed through.
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        for (attr, flag) in [("Add-Opens", "--add-opens"), ("Add-Exports", "--add-exports")] {
            if let Some(value) = self.get(attr) {
                for pkg in value.split_whitespace() {
                    args.push(flag.to_string());
                    args.push(format!("{}=ALL-UNNAMED", pkg));
                }
            }
        }

        if let Some(value) = self.get("Enable-Native-Access").map(str::trim) {
            if !value.is_empty() {
                args.push(format!("--enable-native-access={}", value));
            }
        }

        args
    }

    /// Number of main-section headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the main section has no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The input JAR, read once and shared by every target in a run.
#[derive(Debug, Clone)]
pub struct JarPayload {
    path: PathBuf,
    bytes: Vec<u8>,
    entry_point: String,
    manifest: ManifestAttributes,
    launch_args: Vec<String>,
    min_java_version: u16,
}

impl JarPayload {
    /// Read a JAR and take its entry point from the manifest.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        Self::read_with_entry_point(path, None)
    }

    /// Read a JAR, optionally overriding the manifest's `Main-Class`.
    ///
    /// The override only affects launch metadata; the archive is embedded
    /// unchanged.
    pub fn read_with_entry_point(
        path: impl AsRef<Path>,
        entry_point: Option<&str>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        Self::from_bytes(path, bytes, entry_point)
    }

    /// Build a payload from archive bytes already in memory.
    ///
    /// `path` is only used in error messages and reports.
    pub fn from_bytes(
        path: impl Into<PathBuf>,
        bytes: Vec<u8>,
        entry_point: Option<&str>,
    ) -> Result<Self> {
        let path = path.into();
        let invalid = |reason: String| PackError::InvalidJar {
            path: path.clone(),
            reason,
        };
        let missing = |reason: String| PackError::MissingEntryPoint {
            path: path.clone(),
            reason,
        };

        let mut archive =
            ZipArchive::new(Cursor::new(bytes.as_slice())).map_err(|e| invalid(e.to_string()))?;

        let manifest = match read_entry(&mut archive, MANIFEST_PATH, u64::MAX) {
            Ok(Some(raw)) => {
                let text = String::from_utf8(raw)
                    .map_err(|_| invalid("manifest is not valid UTF-8".to_string()))?;
                ManifestAttributes::parse(&text).map_err(invalid)?
            }
            Ok(None) => ManifestAttributes::default(),
            Err(e) => return Err(invalid(e.to_string())),
        };

        let entry_point = match entry_point.map(str::trim).filter(|s| !s.is_empty()) {
            Some(explicit) => explicit.to_string(),
            None => manifest
                .main_class()
                .map(str::to_string)
                .ok_or_else(|| missing("no Main-Class in manifest".to_string()))?,
        };
        if entry_point.len() > MAX_ENTRY_POINT_LEN {
            return Err(missing(format!(
                "entry point name is {} bytes, limit is {}",
                entry_point.len(),
                MAX_ENTRY_POINT_LEN
            )));
        }

        let class_path = format!("{}.class", entry_point.replace('.', "/"));
        let header = match read_entry(&mut archive, &class_path, CLASS_HEADER_LEN) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                return Err(missing(format!(
                    "class {} is not contained in the archive",
                    entry_point
                )))
            }
            Err(e) => return Err(invalid(e.to_string())),
        };
        let major = class_major_version(&header)
            .map_err(|reason| invalid(format!("entry class {}: {}", entry_point, reason)))?;
        let min_java_version = major - 44;

        let launch_args = manifest.launch_args();
        drop(archive);

        debug!(
            jar = %path.display(),
            size = bytes.len(),
            entry_point = %entry_point,
            min_java_version,
            "read jar payload"
        );

        Ok(Self {
            path,
            bytes,
            entry_point,
            manifest,
            launch_args,
            min_java_version,
        })
    }

    /// Path the archive was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archive bytes exactly as read.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Archive length in bytes.
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Returns true for a zero-length archive (never true for a parsed JAR).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Fully-qualified class to launch.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Main-section manifest attributes.
    pub fn manifest(&self) -> &ManifestAttributes {
        &self.manifest
    }

    /// JVM flags derived from the manifest.
    pub fn launch_args(&self) -> &[String] {
        &self.launch_args
    }

    /// Oldest Java release that can load the entry class.
    pub fn min_java_version(&self) -> u16 {
        self.min_java_version
    }

    /// Fail if the entry class needs a newer Java than `preferred`.
    ///
    /// A stub offers to install the preferred release when no suitable Java
    /// is found, so that release must be able to run the application.
    pub fn check_preferred_java(&self, preferred: u16) -> Result<()> {
        if self.min_java_version > preferred {
            return Err(PackError::IncompatibleJava {
                path: self.path.clone(),
                required: self.min_java_version,
                preferred,
            });
        }
        Ok(())
    }
}

/// Split on CRLF, CR or LF. A final line without a break is still yielded.
fn manifest_lines<'a>(text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    let mut rest = Some(text);
    std::iter::from_fn(move || {
        let current = rest?;
        match current.find(['\r', '\n']) {
            Some(at) => {
                let width = if current[at..].starts_with("\r\n") { 2 } else { 1 };
                rest = Some(&current[at + width..]);
                Some(&current[..at])
            }
            None => {
                rest = None;
                Some(current).filter(|line| !line.is_empty())
            }
        }
    })
}

/// Read at most `limit` bytes of an archive entry; `Ok(None)` if it does not
/// exist.
///
/// The buffer grows with what actually decompresses, not with the size the
/// entry header claims.
fn read_entry(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
    limit: u64,
) -> std::result::Result<Option<Vec<u8>>, ZipError> {
    let file = match archive.by_name(name) {
        Ok(f) => f,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut buf = Vec::new();
    file.take(limit).read_to_end(&mut buf)?;
    Ok(Some(buf))
}

/// Major version from a class file header.
fn class_major_version(header: &[u8]) -> std::result::Result<u16, String> {
    if header.len() < 8 {
        return Err("class file is truncated".to_string());
    }
    if header[0..4] != CLASS_MAGIC {
        return Err("class file has a corrupted header".to_string());
    }
    let major = u16::from_be_bytes([header[6], header[7]]);
    if major < MIN_CLASS_MAJOR {
        return Err(format!("unsupported class file major version {}", major));
    }
    Ok(major)
}
