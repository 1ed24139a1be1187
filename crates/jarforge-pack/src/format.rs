//! Binary format definitions for assembled executables.
//!
//! This module defines the trailer that follows the payload and tells a
//! launcher stub where its JAR lives, which class to start and, from format
//! version 3 on, how to launch it.

use std::ops::Range;

use crate::{PackError, Result};

/// Magic bytes identifying a jarforge trailer.
pub const MAGIC: &[u8; 4] = b"JFRG";

/// Format version for a raw JAR payload.
pub const FORMAT_VERSION: u32 = 1;

/// Format version for a payload stored as a single zstd frame.
pub const FORMAT_VERSION_ZSTD: u32 = 2;

/// Format version carrying a launch block after the entry point.
///
/// The payload encoding is recorded in the block instead of the version.
pub const FORMAT_VERSION_LAUNCH: u32 = 3;

/// Trailer size with an empty entry point: every fixed-width field.
pub const MIN_TRAILER_SIZE: usize = 32;

/// Longest entry-point name accepted, in UTF-8 bytes.
///
/// Class names live in the class file constant pool, which caps a single
/// UTF-8 entry at `u16::MAX` bytes.
pub const MAX_ENTRY_POINT_LEN: usize = u16::MAX as usize;

/// Longest string field of the launch block, in UTF-8 bytes.
pub const MAX_LAUNCH_FIELD_LEN: usize = u16::MAX as usize;

/// Most launch arguments the launch block can hold.
pub const MAX_LAUNCH_ARGS: usize = u16::MAX as usize;

/// Size of the trailing self-length field.
pub const TRAILER_LENGTH_FIELD: usize = 4;

const ENTRY_POINT_OFFSET: usize = 28;

/// How the payload bytes relate to the original JAR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadEncoding {
    /// The JAR, byte for byte.
    Raw,
    /// One zstd frame holding the JAR.
    Zstd,
}

impl PayloadEncoding {
    /// Tag stored in the launch block.
    pub fn tag(self) -> u8 {
        match self {
            PayloadEncoding::Raw => 0,
            PayloadEncoding::Zstd => 1,
        }
    }

    /// Decode a launch block tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(PayloadEncoding::Raw),
            1 => Ok(PayloadEncoding::Zstd),
            other => Err(PackError::MalformedTrailer(format!(
                "unknown payload encoding {}",
                other
            ))),
        }
    }

    /// Format version of a trailer without a launch block.
    pub fn plain_format_version(self) -> u32 {
        match self {
            PayloadEncoding::Raw => FORMAT_VERSION,
            PayloadEncoding::Zstd => FORMAT_VERSION_ZSTD,
        }
    }
}

/// What a stub needs to find and start a suitable JVM.
///
/// Stored in format version 3 trailers. Empty strings stand for "not set"
/// and let the stub fall back to its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchMetadata {
    /// Name shown in dialogs and console output.
    pub app_name: Option<String>,
    /// Oldest Java release the stub may start the application with.
    pub min_java_version: u16,
    /// Release offered for installation when none suitable is found.
    pub preferred_java_version: u16,
    /// Prompt shown before offering an install; `%d` is the minimum version.
    pub install_prompt: Option<String>,
    /// JVM flags placed before the entry class.
    pub launch_args: Vec<String>,
}

impl LaunchMetadata {
    /// Check every field fits its length prefix.
    pub fn validate(&self) -> Result<()> {
        let strings = [
            ("app name", self.app_name.as_deref().unwrap_or("")),
            ("install prompt", self.install_prompt.as_deref().unwrap_or("")),
        ];
        for (what, value) in strings {
            if value.len() > MAX_LAUNCH_FIELD_LEN {
                return Err(PackError::MalformedTrailer(format!(
                    "{} is {} bytes, limit is {}",
                    what,
                    value.len(),
                    MAX_LAUNCH_FIELD_LEN
                )));
            }
        }
        if self.launch_args.len() > MAX_LAUNCH_ARGS {
            return Err(PackError::MalformedTrailer(format!(
                "{} launch args, limit is {}",
                self.launch_args.len(),
                MAX_LAUNCH_ARGS
            )));
        }
        if let Some(arg) = self
            .launch_args
            .iter()
            .find(|a| a.len() > MAX_LAUNCH_FIELD_LEN)
        {
            return Err(PackError::MalformedTrailer(format!(
                "launch arg of {} bytes, limit is {}",
                arg.len(),
                MAX_LAUNCH_FIELD_LEN
            )));
        }
        Ok(())
    }

    /// Encoded size, excluding the payload encoding tag.
    fn encoded_len(&self) -> usize {
        let field = |s: &str| 2 + s.len();
        2 + 2
            + field(self.app_name.as_deref().unwrap_or(""))
            + field(self.install_prompt.as_deref().unwrap_or(""))
            + 2
            + self.launch_args.iter().map(|a| field(a.as_str())).sum::<usize>()
    }

    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.min_java_version.to_le_bytes());
        buf.extend_from_slice(&self.preferred_java_version.to_le_bytes());
        put_str(buf, self.app_name.as_deref().unwrap_or(""));
        put_str(buf, self.install_prompt.as_deref().unwrap_or(""));
        buf.extend_from_slice(&(self.launch_args.len() as u16).to_le_bytes());
        for arg in &self.launch_args {
            put_str(buf, arg);
        }
    }

    fn read(reader: &mut FieldReader<'_>) -> Result<Self> {
        let min_java_version = reader.u16()?;
        let preferred_java_version = reader.u16()?;
        let app_name = Some(reader.string()?).filter(|s| !s.is_empty());
        let install_prompt = Some(reader.string()?).filter(|s| !s.is_empty());
        let count = reader.u16()? as usize;
        let launch_args = (0..count)
            .map(|_| reader.string())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            app_name,
            min_java_version,
            preferred_java_version,
            install_prompt,
            launch_args,
        })
    }
}

/// Length-prefixed UTF-8; lengths are bounded by `LaunchMetadata::validate`.
fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u16).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// Launch metadata appended after the payload.
///
/// Layout (all integers little-endian):
/// ```text
/// Offset  Size  Field
/// 0       4     magic ("JFRG")
/// 4       4     format_version (u32)
/// 8       8     stub_length (u64) - bytes before the payload
/// 16      8     jar_length (u64) - payload bytes
/// 24      4     entry_point_length (u32) - n
/// 28      n     entry_point (UTF-8, no terminator)
/// 28+n    m     launch block, format version 3 only
/// 28+n+m  4     trailer_length (u32) - 32 + n + m, this field included
/// ```
///
/// The launch block is
/// ```text
/// 1     payload encoding (0 raw, 1 zstd)
/// 2     min_java_version (u16)
/// 2     preferred_java_version (u16)
/// 2+k   app_name (u16 length, UTF-8; empty if unset)
/// 2+k   install_prompt (u16 length, UTF-8; empty if unset)
/// 2     launch arg count (u16), then per arg: u16 length, UTF-8
/// ```
///
/// A stub reads the final four bytes of its own file, seeks back
/// `trailer_length` bytes and parses forward. The payload starts at
/// `stub_length`, so the jar offset is never stored separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    format_version: u32,
    encoding: PayloadEncoding,
    stub_length: u64,
    jar_length: u64,
    entry_point: String,
    launch: Option<LaunchMetadata>,
}

impl Trailer {
    /// Build a version 1 or 2 trailer, validating the entry point and lengths.
    pub fn new(
        format_version: u32,
        stub_length: u64,
        jar_length: u64,
        entry_point: impl Into<String>,
    ) -> Result<Self> {
        let encoding = match format_version {
            FORMAT_VERSION => PayloadEncoding::Raw,
            FORMAT_VERSION_ZSTD => PayloadEncoding::Zstd,
            FORMAT_VERSION_LAUNCH => {
                return Err(PackError::MalformedTrailer(
                    "format version 3 requires launch metadata".to_string(),
                ))
            }
            other => return Err(PackError::UnsupportedVersion(other)),
        };
        Self::build(format_version, encoding, stub_length, jar_length, entry_point.into(), None)
    }

    /// Build a version 3 trailer carrying launch metadata.
    pub fn with_launch(
        encoding: PayloadEncoding,
        stub_length: u64,
        jar_length: u64,
        entry_point: impl Into<String>,
        launch: LaunchMetadata,
    ) -> Result<Self> {
        launch.validate()?;
        Self::build(
            FORMAT_VERSION_LAUNCH,
            encoding,
            stub_length,
            jar_length,
            entry_point.into(),
            Some(launch),
        )
    }

    fn build(
        format_version: u32,
        encoding: PayloadEncoding,
        stub_length: u64,
        jar_length: u64,
        entry_point: String,
        launch: Option<LaunchMetadata>,
    ) -> Result<Self> {
        if entry_point.is_empty() {
            return Err(PackError::MalformedTrailer(
                "entry point is empty".to_string(),
            ));
        }
        if entry_point.len() > MAX_ENTRY_POINT_LEN {
            return Err(PackError::MalformedTrailer(format!(
                "entry point is {} bytes, limit is {}",
                entry_point.len(),
                MAX_ENTRY_POINT_LEN
            )));
        }

        let trailer = Self {
            format_version,
            encoding,
            stub_length,
            jar_length,
            entry_point,
            launch,
        };
        if u32::try_from(trailer.encoded_len()).is_err() {
            return Err(PackError::MalformedTrailer(format!(
                "trailer of {} bytes does not fit its length field",
                trailer.encoded_len()
            )));
        }
        if trailer.checked_file_length().is_none() {
            return Err(PackError::MalformedTrailer(format!(
                "stub {} + payload {} bytes overflows a file length",
                stub_length, jar_length
            )));
        }
        Ok(trailer)
    }

    /// Format version this trailer was written with.
    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// How the payload is stored.
    pub fn payload_encoding(&self) -> PayloadEncoding {
        self.encoding
    }

    /// Launch metadata, present in version 3 trailers.
    pub fn launch(&self) -> Option<&LaunchMetadata> {
        self.launch.as_ref()
    }

    /// Length of the launcher stub at the start of the file.
    pub fn stub_length(&self) -> u64 {
        self.stub_length
    }

    /// Length of the embedded payload.
    pub fn jar_length(&self) -> u64 {
        self.jar_length
    }

    /// Offset of the payload; always equal to the stub length.
    pub fn jar_offset(&self) -> u64 {
        self.stub_length
    }

    /// Fully-qualified class the launcher should start.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Byte range of the payload within the assembled file.
    pub fn payload_range(&self) -> Range<u64> {
        // stub + payload + trailer was checked not to overflow on construction
        self.jar_offset()..self.jar_offset() + self.jar_length
    }

    /// Size of this trailer once encoded.
    pub fn encoded_len(&self) -> usize {
        let launch = self.launch.as_ref().map_or(0, |l| 1 + l.encoded_len());
        MIN_TRAILER_SIZE + self.entry_point.len() + launch
    }

    /// Total size of a file carrying this trailer.
    pub fn file_length(&self) -> u64 {
        self.checked_file_length().unwrap_or(u64::MAX)
    }

    fn checked_file_length(&self) -> Option<u64> {
        self.stub_length
            .checked_add(self.jar_length)?
            .checked_add(self.encoded_len() as u64)
    }

    /// Serialize trailer to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let name = self.entry_point.as_bytes();
        let total = self.encoded_len();
        let mut buf = Vec::with_capacity(total);

        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&self.format_version.to_le_bytes());
        buf.extend_from_slice(&self.stub_length.to_le_bytes());
        buf.extend_from_slice(&self.jar_length.to_le_bytes());

        // Casts are bounded by MAX_ENTRY_POINT_LEN and the checks in build()
        buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
        buf.extend_from_slice(name);
        if let Some(launch) = &self.launch {
            buf.push(self.encoding.tag());
            launch.write(&mut buf);
        }
        buf.extend_from_slice(&(total as u32).to_le_bytes());

        debug_assert_eq!(buf.len(), total);
        buf
    }

    /// Deserialize a trailer from exactly its own bytes.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < MIN_TRAILER_SIZE {
            return Err(PackError::MalformedTrailer(format!(
                "{} bytes is shorter than the minimum of {}",
                buf.len(),
                MIN_TRAILER_SIZE
            )));
        }

        if &buf[0..4] != MAGIC {
            return Err(PackError::InvalidMagic);
        }

        let format_version = read_u32(buf, 4);
        if !matches!(
            format_version,
            FORMAT_VERSION | FORMAT_VERSION_ZSTD | FORMAT_VERSION_LAUNCH
        ) {
            return Err(PackError::UnsupportedVersion(format_version));
        }

        let declared = read_u32(buf, buf.len() - TRAILER_LENGTH_FIELD) as usize;
        if declared != buf.len() {
            return Err(PackError::MalformedTrailer(format!(
                "trailer length field says {}, got {} bytes",
                declared,
                buf.len()
            )));
        }

        let stub_length = read_u64(buf, 8);
        let jar_length = read_u64(buf, 16);
        let name_len = read_u32(buf, 24) as usize;

        let name_end = ENTRY_POINT_OFFSET
            .checked_add(name_len)
            .filter(|&end| end <= buf.len() - TRAILER_LENGTH_FIELD)
            .ok_or_else(|| {
                PackError::MalformedTrailer(format!(
                    "entry point length {} does not fit a {}-byte trailer",
                    name_len,
                    buf.len()
                ))
            })?;
        let entry_point = std::str::from_utf8(&buf[ENTRY_POINT_OFFSET..name_end])
            .map_err(|e| PackError::MalformedTrailer(format!("entry point is not UTF-8: {}", e)))?;

        let mut rest = FieldReader::new(&buf[name_end..buf.len() - TRAILER_LENGTH_FIELD]);
        let trailer = if format_version == FORMAT_VERSION_LAUNCH {
            let encoding = PayloadEncoding::from_tag(rest.u8()?)?;
            let launch = LaunchMetadata::read(&mut rest)?;
            Self::with_launch(encoding, stub_length, jar_length, entry_point, launch)?
        } else {
            Self::new(format_version, stub_length, jar_length, entry_point)?
        };

        if !rest.is_empty() {
            return Err(PackError::MalformedTrailer(format!(
                "{} unexpected bytes after the trailer fields",
                rest.remaining()
            )));
        }
        Ok(trailer)
    }

    /// Read the self-length field from the last four bytes of a file.
    pub fn length_from_tail(tail: [u8; TRAILER_LENGTH_FIELD]) -> usize {
        u32::from_le_bytes(tail) as usize
    }

    /// Locate and decode the trailer at the end of an in-memory executable.
    ///
    /// Also checks that the recorded lengths account for every byte of `file`.
    pub fn locate(file: &[u8]) -> Result<Self> {
        if file.len() < MIN_TRAILER_SIZE {
            return Err(PackError::MalformedTrailer(
                "file too small to contain trailer".to_string(),
            ));
        }

        let mut tail = [0u8; TRAILER_LENGTH_FIELD];
        tail.copy_from_slice(&file[file.len() - TRAILER_LENGTH_FIELD..]);
        let trailer_len = Self::length_from_tail(tail);
        if !(MIN_TRAILER_SIZE..=file.len()).contains(&trailer_len) {
            return Err(PackError::MalformedTrailer(format!(
                "trailer length {} out of range for a {}-byte file",
                trailer_len,
                file.len()
            )));
        }

        let trailer = Self::from_bytes(&file[file.len() - trailer_len..])?;
        trailer.check_file_length(file.len() as u64)?;
        Ok(trailer)
    }

    /// Verify that stub + payload + trailer add up to `actual` bytes.
    pub fn check_file_length(&self, actual: u64) -> Result<()> {
        if self.checked_file_length() != Some(actual) {
            return Err(PackError::MalformedTrailer(format!(
                "stub {} + payload {} + trailer {} != file length {}",
                self.stub_length,
                self.jar_length,
                self.encoded_len(),
                actual
            )));
        }
        Ok(())
    }
}

/// Bounds-checked cursor over the variable part of a trailer.
struct FieldReader<'a> {
    buf: &'a [u8],
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(PackError::MalformedTrailer(
                "launch block is truncated".to_string(),
            ));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| PackError::MalformedTrailer(format!("launch field is not UTF-8: {}", e)))
    }

    fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(b)
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(b)
}
