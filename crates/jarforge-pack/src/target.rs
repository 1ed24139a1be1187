//! Target platform identification.
//!
//! A [`PlatformTarget`] names exactly one launcher stub. Targets are parsed
//! from user input (`linux/x64`, `windows-x86_64`, `macos/aarch64`) or detected
//! from the running host.
//!
//! # Platform Support
//!
//! | OS | Arch | Extension |
//! |----|------|-----------|
//! | Linux | x64, arm64, x86 | none |
//! | macOS | x64, arm64, x86 | none |
//! | Windows | x64, arm64, x86 | `.exe` |
//!
//! Whether a stub actually exists for a pair is up to the stub source; the
//! table above is only what can be named.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{PackError, Result};

/// Target operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Os {
    /// Microsoft Windows
    Windows,
    /// Linux
    Linux,
    /// macOS (Darwin)
    MacOs,
}

impl Os {
    /// All known operating systems.
    pub const ALL: [Os; 3] = [Os::Windows, Os::Linux, Os::MacOs];

    /// Lowercase identifier used in target strings and stub file names.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Os::Windows => "windows",
            Os::Linux => "linux",
            Os::MacOs => "macos",
        }
    }

    /// Suffix an executable needs on this OS to be launchable.
    pub const fn exe_suffix(&self) -> &'static str {
        match self {
            Os::Windows => ".exe",
            Os::Linux | Os::MacOs => "",
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Os {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "windows" | "win" | "win32" => Ok(Os::Windows),
            "linux" => Ok(Os::Linux),
            "macos" | "darwin" | "osx" | "mac" => Ok(Os::MacOs),
            _ => Err(PackError::UnsupportedPlatform(format!(
                "unknown operating system: {}",
                s
            ))),
        }
    }
}

/// Target CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arch {
    /// x86 64-bit (amd64)
    X64,
    /// ARM 64-bit (aarch64)
    Arm64,
    /// x86 32-bit (i686)
    X86,
}

impl Arch {
    /// All known architectures.
    pub const ALL: [Arch; 3] = [Arch::X64, Arch::Arm64, Arch::X86];

    /// Lowercase identifier used in target strings and stub file names.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::Arm64 => "arm64",
            Arch::X86 => "x86",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x64" | "x86_64" | "amd64" => Ok(Arch::X64),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            "x86" | "i386" | "i686" => Ok(Arch::X86),
            _ => Err(PackError::UnsupportedPlatform(format!(
                "unknown architecture: {}",
                s
            ))),
        }
    }
}

/// Combined platform identifier (OS + architecture).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformTarget {
    /// Operating system
    pub os: Os,
    /// CPU architecture
    pub arch: Arch,
}

impl PlatformTarget {
    /// Create a target from its parts.
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Detect the platform this process is running on.
    pub fn host() -> Result<Self> {
        Ok(Self {
            os: std::env::consts::OS.parse()?,
            arch: std::env::consts::ARCH.parse()?,
        })
    }

    /// Every nameable os/arch pair.
    pub fn all() -> impl Iterator<Item = PlatformTarget> {
        Os::ALL
            .into_iter()
            .flat_map(|os| Arch::ALL.into_iter().map(move |arch| Self::new(os, arch)))
    }

    /// File name of this target's stub inside a stub directory.
    ///
    /// e.g. `jarforge-stub-linux-x64`, `jarforge-stub-windows-x64.exe`.
    pub fn stub_file_name(&self) -> String {
        format!(
            "jarforge-stub-{}-{}{}",
            self.os,
            self.arch,
            self.os.exe_suffix()
        )
    }

    /// Dash-separated form for use in output file names (`linux-x64`).
    pub fn slug(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }

    /// Apply this target's executable suffix to a base file name.
    pub fn executable_name(&self, base: &str) -> String {
        let suffix = self.os.exe_suffix();
        if suffix.is_empty() || base.to_ascii_lowercase().ends_with(suffix) {
            base.to_string()
        } else {
            format!("{}{}", base, suffix)
        }
    }
}

impl std::fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

impl FromStr for PlatformTarget {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (os, arch) = s.split_once(['/', '-']).ok_or_else(|| {
            PackError::UnsupportedPlatform(format!("expected OS/ARCH, got: {}", s))
        })?;
        Ok(Self {
            os: os.parse()?,
            arch: arch.parse()?,
        })
    }
}

impl TryFrom<String> for PlatformTarget {
    type Error = PackError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PlatformTarget> for String {
    fn from(target: PlatformTarget) -> Self {
        target.to_string()
    }
}
