//! Atomic, permission-correct output.
//!
//! Every artifact is written to a temporary file in its destination
//! directory, synced, given its final mode, and only then renamed into place.
//! A reader of the destination path sees either the old file, nothing, or the
//! complete new executable.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::{PackError, Result};

/// Mode for assembled executables on Unix hosts.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Mode for plain data files (extracted payloads).
pub const DATA_MODE: u32 = 0o644;

/// A file written by the finalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    /// Final path of the file.
    pub path: PathBuf,
    /// Mode bits applied, or `None` where the host has no mode bits.
    pub permission_bits: Option<u32>,
    /// Bytes written.
    pub size: u64,
}

/// Host operations that run once the temporary file exists.
trait FinalizeOps {
    /// Apply `mode`; `Ok(false)` where the host has no mode bits.
    fn set_mode(&self, file: &File, mode: u32) -> io::Result<bool>;

    /// Move `temp` to `destination`, replacing an existing file only if
    /// `overwrite`. On error the temporary file must be gone.
    fn rename(&self, temp: NamedTempFile, destination: &Path, overwrite: bool) -> io::Result<()>;
}

/// The real filesystem.
struct HostFs;

impl FinalizeOps for HostFs {
    #[cfg(unix)]
    fn set_mode(&self, file: &File, mode: u32) -> io::Result<bool> {
        use std::os::unix::fs::PermissionsExt;

        file.set_permissions(fs::Permissions::from_mode(mode))?;
        Ok(true)
    }

    /// Executability comes from the `.exe` extension here; nothing to set.
    #[cfg(not(unix))]
    fn set_mode(&self, _file: &File, _mode: u32) -> io::Result<bool> {
        Ok(false)
    }

    fn rename(&self, temp: NamedTempFile, destination: &Path, overwrite: bool) -> io::Result<()> {
        let persisted = if overwrite {
            temp.persist(destination)
        } else {
            temp.persist_noclobber(destination)
        };
        // Dropping the returned handle inside the error deletes the temp file
        persisted.map(drop).map_err(|e| e.error)
    }
}

/// Writes byte buffers to their destination atomically.
#[derive(Debug, Clone, Copy)]
pub struct OutputFinalizer {
    overwrite: bool,
    mode: u32,
}

impl Default for OutputFinalizer {
    fn default() -> Self {
        Self {
            overwrite: false,
            mode: EXECUTABLE_MODE,
        }
    }
}

impl OutputFinalizer {
    /// Finalizer for executables that refuses to replace existing files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow replacing an existing destination.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Use `mode` instead of [`EXECUTABLE_MODE`].
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Write `bytes` to `destination`.
    ///
    /// On any error the temporary file is removed and `destination` is left
    /// as it was.
    pub fn write(&self, bytes: &[u8], destination: impl AsRef<Path>) -> Result<OutputArtifact> {
        self.write_with(bytes, destination.as_ref(), &HostFs)
    }

    fn write_with(
        &self,
        bytes: &[u8],
        destination: &Path,
        ops: &dyn FinalizeOps,
    ) -> Result<OutputArtifact> {
        if !self.overwrite && fs::symlink_metadata(destination).is_ok() {
            return Err(PackError::AlreadyExists {
                path: destination.to_path_buf(),
            });
        }

        let dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let file_name = destination
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| {
                PackError::Io(std::io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("output path has no file name: {}", destination.display()),
                ))
            })?;

        // Dropping the temp file on any early return deletes it.
        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(".tmp")
            .tempfile_in(dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;

        let applied = ops
            .set_mode(temp.as_file(), self.mode)
            .map_err(|source| PackError::PermissionDenied {
                path: destination.to_path_buf(),
                source,
            })?;
        let permission_bits = applied.then_some(self.mode);

        ops.rename(temp, destination, self.overwrite)
            .map_err(|e| match e.kind() {
                // Lost a race with another writer
                ErrorKind::AlreadyExists if !self.overwrite => PackError::AlreadyExists {
                    path: destination.to_path_buf(),
                },
                _ => PackError::Io(e),
            })?;

        debug!(
            path = %destination.display(),
            size = bytes.len(),
            mode = ?permission_bits.map(|m| format!("{:o}", m)),
            "wrote output"
        );

        Ok(OutputArtifact {
            path: destination.to_path_buf(),
            permission_bits,
            size: bytes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_new_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("app");

        let artifact = OutputFinalizer::new().write(b"binary", &dest).unwrap();
        assert_eq!(artifact.path, dest);
        assert_eq!(artifact.size, 6);
        assert_eq!(fs::read(&dest).unwrap(), b"binary");
    }

    #[test]
    #[cfg(unix)]
    fn test_executable_bits_set() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("app");
        let artifact = OutputFinalizer::new().write(b"binary", &dest).unwrap();

        let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
        assert_eq!(artifact.permission_bits, Some(0o755));
    }

    #[test]
    #[cfg(unix)]
    fn test_custom_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("app.jar");
        OutputFinalizer::new().mode(DATA_MODE).write(b"PK", &dest).unwrap();

        let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_existing_file_untouched_without_overwrite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("app");
        fs::write(&dest, b"original").unwrap();

        let err = OutputFinalizer::new().write(b"replacement", &dest).unwrap_err();
        assert!(matches!(err, PackError::AlreadyExists { .. }));
        assert_eq!(fs::read(&dest).unwrap(), b"original");
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_overwrite_replaces() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("app");
        fs::write(&dest, b"original").unwrap();

        OutputFinalizer::new()
            .overwrite(true)
            .write(b"replacement", &dest)
            .unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"replacement");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp_dir = tempfile::tempdir().unwrap();
        OutputFinalizer::new()
            .write(b"x", temp_dir.path().join("a"))
            .unwrap();
        OutputFinalizer::new()
            .write(b"y", temp_dir.path().join("b"))
            .unwrap();

        assert_eq!(entries(temp_dir.path()), vec!["a", "b"]);
    }

    /// Refuses to set modes, otherwise behaves like the host.
    struct DenyMode;

    impl FinalizeOps for DenyMode {
        fn set_mode(&self, _file: &File, _mode: u32) -> io::Result<bool> {
            Err(io::Error::new(ErrorKind::PermissionDenied, "read-only mount"))
        }

        fn rename(&self, temp: NamedTempFile, dest: &Path, overwrite: bool) -> io::Result<()> {
            HostFs.rename(temp, dest, overwrite)
        }
    }

    /// Sets modes like the host, then fails the rename with `kind`.
    struct FailRename(ErrorKind);

    impl FinalizeOps for FailRename {
        fn set_mode(&self, file: &File, mode: u32) -> io::Result<bool> {
            HostFs.set_mode(file, mode)
        }

        fn rename(&self, temp: NamedTempFile, _dest: &Path, _overwrite: bool) -> io::Result<()> {
            drop(temp);
            Err(io::Error::new(self.0, "rename failed"))
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_mode_failure_is_permission_denied() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("app");

        let err = OutputFinalizer::new()
            .write_with(b"binary", &dest, &DenyMode)
            .unwrap_err();
        assert!(matches!(err, PackError::PermissionDenied { ref path, .. } if path == &dest));
        assert!(!dest.exists());
        assert!(entries(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_mode_failure_keeps_existing_destination() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("app");
        fs::write(&dest, b"original").unwrap();

        let err = OutputFinalizer::new()
            .overwrite(true)
            .write_with(b"replacement", &dest, &DenyMode)
            .unwrap_err();
        assert!(matches!(err, PackError::PermissionDenied { .. }));
        assert_eq!(fs::read(&dest).unwrap(), b"original");
        assert_eq!(entries(temp_dir.path()), vec!["app"]);
    }

    #[test]
    fn test_rename_failure_cleans_up() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("app");

        let err = OutputFinalizer::new()
            .write_with(b"binary", &dest, &FailRename(ErrorKind::Other))
            .unwrap_err();
        assert!(matches!(err, PackError::Io(_)));
        assert!(entries(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_rename_race_is_already_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("app");

        let err = OutputFinalizer::new()
            .write_with(b"binary", &dest, &FailRename(ErrorKind::AlreadyExists))
            .unwrap_err();
        assert!(matches!(err, PackError::AlreadyExists { .. }));
        assert!(entries(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_missing_directory_fails_cleanly() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dest = temp_dir.path().join("no/such/dir/app");

        let err = OutputFinalizer::new().write(b"x", &dest).unwrap_err();
        assert!(matches!(err, PackError::Io(_)));
        assert!(!dest.exists());
    }
}
