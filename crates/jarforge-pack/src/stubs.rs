//! Launcher stub lookup and caching.
//!
//! Stubs are precompiled native launchers, one per [`PlatformTarget`]. They
//! are opaque to this crate: only their bytes and length matter.
//!
//! A [`StubRegistry`] wraps a [`StubSource`] and memoizes each platform's
//! bytes for the registry's lifetime, so a multi-target run reads every stub
//! from storage at most once even when targets are assembled in parallel.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::debug;

use crate::target::PlatformTarget;
use crate::{PackError, Result};

/// A loaded launcher stub.
#[derive(Debug)]
pub struct StubBinary {
    platform: PlatformTarget,
    bytes: Vec<u8>,
}

impl StubBinary {
    /// Wrap stub bytes for a platform.
    pub fn new(platform: PlatformTarget, bytes: Vec<u8>) -> Self {
        Self { platform, bytes }
    }

    /// Platform this stub launches on.
    pub fn platform(&self) -> PlatformTarget {
        self.platform
    }

    /// Raw stub bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Stub length in bytes.
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Returns true if the stub has no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Backing storage for stubs.
pub trait StubSource: Send + Sync {
    /// Load the stub for `target`, or `None` if this source has none.
    fn load(&self, target: PlatformTarget) -> Result<Option<Vec<u8>>>;

    /// Targets this source can serve.
    fn available(&self) -> Result<Vec<PlatformTarget>>;

    /// Human-readable description for logs and error messages.
    fn describe(&self) -> String;
}

/// Stubs stored as files in one directory, named by
/// [`PlatformTarget::stub_file_name`].
#[derive(Debug, Clone)]
pub struct DirectoryStubSource {
    root: PathBuf,
}

impl DirectoryStubSource {
    /// Use `root` as the stub directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The stub directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the stub for `target` would have.
    pub fn path_for(&self, target: PlatformTarget) -> PathBuf {
        self.root.join(target.stub_file_name())
    }
}

impl StubSource for DirectoryStubSource {
    fn load(&self, target: PlatformTarget) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(target);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(stub = %path.display(), size = bytes.len(), "loaded stub");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PackError::Io(e)),
        }
    }

    fn available(&self) -> Result<Vec<PlatformTarget>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        Ok(PlatformTarget::all()
            .filter(|t| self.path_for(*t).is_file())
            .collect())
    }

    fn describe(&self) -> String {
        format!("stub directory {}", self.root.display())
    }
}

/// Stubs held in memory, e.g. from `include_bytes!`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStubSource {
    stubs: HashMap<PlatformTarget, Vec<u8>>,
}

impl MemoryStubSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the stub for `target`.
    pub fn with_stub(mut self, target: PlatformTarget, bytes: impl Into<Vec<u8>>) -> Self {
        self.stubs.insert(target, bytes.into());
        self
    }
}

impl StubSource for MemoryStubSource {
    fn load(&self, target: PlatformTarget) -> Result<Option<Vec<u8>>> {
        Ok(self.stubs.get(&target).cloned())
    }

    fn available(&self) -> Result<Vec<PlatformTarget>> {
        let mut targets: Vec<_> = self.stubs.keys().copied().collect();
        targets.sort();
        Ok(targets)
    }

    fn describe(&self) -> String {
        format!("{} in-memory stubs", self.stubs.len())
    }
}

type StubCell = Arc<OnceCell<Arc<StubBinary>>>;

/// Platform-to-stub lookup with a load-once cache.
pub struct StubRegistry {
    source: Box<dyn StubSource>,
    cache: Mutex<HashMap<PlatformTarget, StubCell>>,
}

impl StubRegistry {
    /// Create a registry over any stub source.
    pub fn new(source: impl StubSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Create a registry over a stub directory.
    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self::new(DirectoryStubSource::new(root))
    }

    /// Resolve the stub for `target`, loading it on first use.
    ///
    /// Concurrent first requests for the same platform load it once; the
    /// others wait for that load. A failed load is not cached.
    pub fn resolve(&self, target: PlatformTarget) -> Result<Arc<StubBinary>> {
        // Hold the map lock only long enough to fetch this platform's cell.
        let cell = {
            let mut cache = self.cache.lock();
            Arc::clone(cache.entry(target).or_default())
        };

        let stub = cell.get_or_try_init(|| match self.source.load(target)? {
            Some(bytes) => Ok(Arc::new(StubBinary::new(target, bytes))),
            None => Err(PackError::UnsupportedPlatform(format!(
                "no stub for {} in {}",
                target,
                self.source.describe()
            ))),
        })?;

        Ok(Arc::clone(stub))
    }

    /// Targets the underlying source can serve.
    pub fn available(&self) -> Result<Vec<PlatformTarget>> {
        self.source.available()
    }

    /// Description of the underlying source.
    pub fn describe(&self) -> String {
        self.source.describe()
    }
}

impl std::fmt::Debug for StubRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubRegistry")
            .field("source", &self.source.describe())
            .field("cached", &self.cache.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Arch, Os};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LINUX_X64: PlatformTarget = PlatformTarget::new(Os::Linux, Arch::X64);
    const WIN_X64: PlatformTarget = PlatformTarget::new(Os::Windows, Arch::X64);

    /// Source that counts how often each load happens.
    struct CountingSource {
        inner: MemoryStubSource,
        loads: Arc<AtomicUsize>,
    }

    impl StubSource for CountingSource {
        fn load(&self, target: PlatformTarget) -> Result<Option<Vec<u8>>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            // widen the race window for the concurrency test
            std::thread::sleep(std::time::Duration::from_millis(5));
            self.inner.load(target)
        }

        fn available(&self) -> Result<Vec<PlatformTarget>> {
            self.inner.available()
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn test_resolve_from_memory() {
        let stubs = MemoryStubSource::new().with_stub(LINUX_X64, b"ELF".to_vec());
        let registry = StubRegistry::new(stubs);
        let stub = registry.resolve(LINUX_X64).unwrap();
        assert_eq!(stub.bytes(), b"ELF");
        assert_eq!(stub.len(), 3);
        assert_eq!(stub.platform(), LINUX_X64);
    }

    #[test]
    fn test_unsupported_platform() {
        let stubs = MemoryStubSource::new().with_stub(LINUX_X64, b"ELF".to_vec());
        let registry = StubRegistry::new(stubs);
        let err = registry.resolve(WIN_X64).unwrap_err();
        assert!(matches!(err, PackError::UnsupportedPlatform(_)));
        assert!(err.to_string().contains("windows/x64"));
    }

    #[test]
    fn test_stub_cached_after_first_load() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = StubRegistry::new(CountingSource {
            inner: MemoryStubSource::new().with_stub(LINUX_X64, b"ELF".to_vec()),
            loads: Arc::clone(&loads),
        });

        let a = registry.resolve(LINUX_X64).unwrap();
        let b = registry.resolve(LINUX_X64).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_access_loads_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = StubRegistry::new(CountingSource {
            inner: MemoryStubSource::new().with_stub(LINUX_X64, vec![7u8; 1024]),
            loads: Arc::clone(&loads),
        });

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let stub = registry.resolve(LINUX_X64).unwrap();
                    assert_eq!(stub.len(), 1024);
                });
            }
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_stub_not_cached() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = StubRegistry::new(CountingSource {
            inner: MemoryStubSource::new(),
            loads: Arc::clone(&loads),
        });

        assert!(registry.resolve(LINUX_X64).is_err());
        assert!(registry.resolve(LINUX_X64).is_err());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_directory_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("jarforge-stub-linux-x64"), b"linux stub").unwrap();
        fs::write(temp_dir.path().join("jarforge-stub-windows-x64.exe"), b"MZ stub").unwrap();
        fs::write(temp_dir.path().join("unrelated.txt"), b"noise").unwrap();

        let source = DirectoryStubSource::new(temp_dir.path());
        let mut available = source.available().unwrap();
        available.sort();
        assert_eq!(available, vec![WIN_X64, LINUX_X64]);

        let registry = StubRegistry::from_dir(temp_dir.path());
        assert_eq!(registry.resolve(WIN_X64).unwrap().bytes(), b"MZ stub");
        assert!(matches!(
            registry.resolve(PlatformTarget::new(Os::MacOs, Arch::Arm64)),
            Err(PackError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn test_directory_source_missing_dir() {
        let source = DirectoryStubSource::new("/nonexistent/jarforge/stubs");
        assert!(source.available().unwrap().is_empty());
        assert!(source.load(LINUX_X64).unwrap().is_none());
    }
}
