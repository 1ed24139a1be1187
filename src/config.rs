//! Pack configuration: pack files, flag merging and stub discovery.
//!
//! A pack file is a TOML file describing a repeatable build. It is only
//! loaded when explicitly specified via `--config`/`-c`.
//!
//! Example pack file:
//! ```toml
//! name = "myapp"
//! targets = ["linux/x64", "linux/arm64", "macos/arm64", "windows/x64"]
//! output = "dist"
//! stub_dir = "/opt/jarforge/stubs"
//! main_class = "com.example.Main"
//! compress = false
//! overwrite = true
//!
//! app_name = "My App"
//! min_java = 11
//! preferred_java = 21
//! jvm_args = ["-Xmx1g"]
//! ```

use std::path::{Path, PathBuf};

use jarforge_pack::{LaunchOptions, PackRequest, PlatformTarget};
use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

/// Environment variable naming the stub directory.
pub const STUB_DIR_ENV: &str = "JARFORGE_STUB_DIR";

/// Parsed pack file.
#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PackFile {
    /// Platforms to build for.
    #[serde(default)]
    pub targets: Vec<PlatformTarget>,
    /// Output file (one target) or directory (several).
    pub output: Option<PathBuf>,
    /// Base name for generated executables.
    pub name: Option<String>,
    /// Directory holding launcher stubs.
    pub stub_dir: Option<PathBuf>,
    /// Entry point overriding the manifest's `Main-Class`.
    pub main_class: Option<String>,
    /// Embed the JAR as a zstd frame.
    pub compress: Option<bool>,
    /// Replace existing outputs.
    pub overwrite: Option<bool>,
    /// Name the stub shows in dialogs.
    pub app_name: Option<String>,
    /// Oldest Java release to accept.
    pub min_java: Option<u16>,
    /// Java release offered for installation.
    pub preferred_java: Option<u16>,
    /// Prompt shown before offering an install.
    pub install_prompt: Option<String>,
    /// Extra JVM flags.
    #[serde(default)]
    pub jvm_args: Vec<String>,
}

/// Load and parse a pack file from the given path.
pub fn load(path: &Path) -> Result<PackFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config("load pack file", format!("{}: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::config("parse pack file", format!("{}: {}", path.display(), e)))
}

/// Values given on the command line. `None`/empty means "not given".
#[derive(Debug, Default, Clone)]
pub struct PackFlags {
    /// `--target` values, in order.
    pub targets: Vec<PlatformTarget>,
    /// `--output`.
    pub output: Option<PathBuf>,
    /// `--name`.
    pub name: Option<String>,
    /// `--stub-dir`.
    pub stub_dir: Option<PathBuf>,
    /// `--main-class`.
    pub main_class: Option<String>,
    /// `--compress`.
    pub compress: bool,
    /// `--overwrite`.
    pub overwrite: bool,
    /// `--app-name`.
    pub app_name: Option<String>,
    /// `--min-java`.
    pub min_java: Option<u16>,
    /// `--preferred-java`.
    pub preferred_java: Option<u16>,
    /// `--install-prompt`.
    pub install_prompt: Option<String>,
    /// `--jvm-arg` values, in order.
    pub jvm_args: Vec<String>,
}

/// Fully resolved settings for one pack run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSettings {
    /// Platforms to build for, deduplicated, in request order.
    pub targets: Vec<PlatformTarget>,
    /// Output file or directory, if given.
    pub output: Option<PathBuf>,
    /// Base name for generated executables.
    pub name: String,
    /// Explicit stub directory (flag or pack file).
    pub stub_dir: Option<PathBuf>,
    /// Entry point override.
    pub main_class: Option<String>,
    /// Embed the JAR compressed.
    pub compress: bool,
    /// Replace existing outputs.
    pub overwrite: bool,
    /// Launch settings embedded in every executable.
    pub launch: LaunchOptions,
}

/// Merge CLI flags with an optional pack file.
///
/// Scalars given on the command line override the pack file. Targets given on
/// the command line replace the pack file's list rather than extending it;
/// JVM arguments given on the command line follow the pack file's. With no
/// targets anywhere, the host platform is used.
pub fn resolve(jar: &Path, flags: PackFlags, file: Option<PackFile>) -> Result<PackSettings> {
    let file = file.unwrap_or_default();

    let requested = if !flags.targets.is_empty() {
        flags.targets
    } else if !file.targets.is_empty() {
        file.targets
    } else {
        let host = PlatformTarget::host()?;
        debug!(platform = %host, "no targets given, using host");
        vec![host]
    };

    let mut targets = Vec::with_capacity(requested.len());
    for target in requested {
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    let name = match flags.name.or(file.name) {
        Some(name) => name,
        None => jar
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::config(
                    "derive output name",
                    format!("{} has no file name; use --name", jar.display()),
                )
            })?,
    };

    let mut launch = LaunchOptions::new().jvm_args(file.jvm_args).jvm_args(flags.jvm_args);
    if let Some(app_name) = flags.app_name.or(file.app_name) {
        launch = launch.app_name(app_name);
    }
    if let Some(version) = flags.min_java.or(file.min_java) {
        launch = launch.min_java_version(version);
    }
    if let Some(version) = flags.preferred_java.or(file.preferred_java) {
        launch = launch.preferred_java_version(version);
    }
    if let Some(prompt) = flags.install_prompt.or(file.install_prompt) {
        launch = launch.install_prompt(prompt);
    }
    launch.validate()?;

    Ok(PackSettings {
        targets,
        output: flags.output.or(file.output),
        name,
        stub_dir: flags.stub_dir.or(file.stub_dir),
        main_class: flags.main_class.or(file.main_class),
        compress: flags.compress || file.compress.unwrap_or(false),
        overwrite: flags.overwrite || file.overwrite.unwrap_or(false),
        launch,
    })
}

impl PackSettings {
    /// Whether outputs go into a directory rather than a single file.
    pub fn is_multi_target(&self) -> bool {
        self.targets.len() > 1
    }

    /// One request per target with its destination path.
    ///
    /// A single target writes to `output` itself, defaulting to
    /// `<name><ext>` in the working directory. Several targets write
    /// `<name>-<os>-<arch><ext>` into the `output` directory, defaulting to
    /// `dist`.
    pub fn requests(&self) -> Vec<PackRequest> {
        if let [target] = self.targets.as_slice() {
            let destination = match &self.output {
                Some(path) => path.clone(),
                None => PathBuf::from(target.executable_name(&self.name)),
            };
            return vec![PackRequest::new(*target, destination)];
        }

        let dir = self.output_dir();
        self.targets
            .iter()
            .map(|target| {
                let base = format!("{}-{}", self.name, target.slug());
                PackRequest::new(*target, dir.join(target.executable_name(&base)))
            })
            .collect()
    }

    /// Directory receiving outputs of a multi-target run.
    pub fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| PathBuf::from("dist"))
    }
}

/// Locate the stub directory.
///
/// Explicit locations (flag or pack file, then `JARFORGE_STUB_DIR`) are taken
/// as given. Otherwise the first existing directory among `<exe dir>/stubs`,
/// `<exe dir>/../share/jarforge/stubs` and `<data dir>/jarforge/stubs` wins.
pub fn find_stub_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let env = std::env::var_os(STUB_DIR_ENV).map(PathBuf::from);
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    find_stub_dir_in(explicit, env, exe_dir.as_deref(), dirs::data_dir())
}

fn find_stub_dir_in(
    explicit: Option<&Path>,
    env: Option<PathBuf>,
    exe_dir: Option<&Path>,
    data_dir: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = env.filter(|d| !d.as_os_str().is_empty()) {
        debug!(stub_dir = %dir.display(), "using {}", STUB_DIR_ENV);
        return Ok(dir);
    }

    let candidates = [
        // Distribution layout: stubs next to the binary
        exe_dir.map(|d| d.join("stubs")),
        // Installed under a prefix
        exe_dir.and_then(|d| d.parent()).map(|d| d.join("share/jarforge/stubs")),
        // User data dir
        data_dir.map(|d| d.join("jarforge/stubs")),
    ];

    for candidate in candidates.iter().flatten() {
        if candidate.is_dir() {
            debug!(stub_dir = %candidate.display(), "found stub directory");
            return Ok(candidate.clone());
        }
    }

    Err(Error::StubDirNotFound(format!(
        "no stubs found next to the executable or in the user data dir. \
         Use --stub-dir or set {} to specify the location.",
        STUB_DIR_ENV
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarforge_pack::{Arch, Os};

    const LINUX_X64: PlatformTarget = PlatformTarget::new(Os::Linux, Arch::X64);
    const WIN_X64: PlatformTarget = PlatformTarget::new(Os::Windows, Arch::X64);
    const MAC_ARM64: PlatformTarget = PlatformTarget::new(Os::MacOs, Arch::Arm64);

    fn parse(toml: &str) -> PackFile {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_parse_pack_file() {
        let file = parse(
            r#"
            name = "myapp"
            targets = ["linux/x64", "windows-amd64"]
            output = "out"
            compress = true
            "#,
        );
        assert_eq!(file.name.as_deref(), Some("myapp"));
        assert_eq!(file.targets, vec![LINUX_X64, WIN_X64]);
        assert_eq!(file.output, Some(PathBuf::from("out")));
        assert_eq!(file.compress, Some(true));
        assert_eq!(file.overwrite, None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<PackFile>("cpus = 2").is_err());
    }

    #[test]
    fn test_bad_target_rejected() {
        assert!(toml::from_str::<PackFile>(r#"targets = ["plan9/x64"]"#).is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("jarforge.toml");
        std::fs::write(&path, "overwrite = \"yes\"").unwrap();

        let err = load(&path).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("parse pack file"));
        assert!(msg.contains("jarforge.toml"));

        let err = load(&temp_dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("load pack file"));
    }

    #[test]
    fn test_flags_override_pack_file() {
        let file = parse(
            r#"
            name = "fromfile"
            targets = ["linux/x64", "macos/arm64"]
            main_class = "a.Main"
            stub_dir = "file-stubs"
            "#,
        );
        let flags = PackFlags {
            targets: vec![WIN_X64],
            name: Some("fromflag".to_string()),
            ..Default::default()
        };

        let settings = resolve(Path::new("app.jar"), flags, Some(file)).unwrap();
        assert_eq!(settings.targets, vec![WIN_X64]);
        assert_eq!(settings.name, "fromflag");
        assert_eq!(settings.main_class.as_deref(), Some("a.Main"));
        assert_eq!(settings.stub_dir, Some(PathBuf::from("file-stubs")));
        assert!(!settings.compress);
    }

    #[test]
    fn test_launch_settings_merge() {
        let file = parse(
            r#"
            app_name = "From File"
            min_java = 11
            preferred_java = 17
            jvm_args = ["-Xmx1g"]
            "#,
        );
        let flags = PackFlags {
            targets: vec![LINUX_X64],
            preferred_java: Some(21),
            jvm_args: vec!["-Dmode=cli".to_string()],
            ..Default::default()
        };

        let settings = resolve(Path::new("app.jar"), flags, Some(file)).unwrap();
        let expected = LaunchOptions::new()
            .app_name("From File")
            .min_java_version(11)
            .preferred_java_version(21)
            .jvm_args(["-Xmx1g", "-Dmode=cli"]);
        assert_eq!(settings.launch, expected);
    }

    #[test]
    fn test_launch_settings_default() {
        let flags = PackFlags {
            targets: vec![LINUX_X64],
            ..Default::default()
        };
        let settings = resolve(Path::new("app.jar"), flags, None).unwrap();
        assert_eq!(settings.launch, LaunchOptions::new());
    }

    #[test]
    fn test_contradictory_launch_settings_rejected() {
        let flags = PackFlags {
            targets: vec![LINUX_X64],
            min_java: Some(21),
            preferred_java: Some(17),
            ..Default::default()
        };
        let err = resolve(Path::new("app.jar"), flags, None).unwrap_err();
        assert!(err.to_string().contains("preferred Java version"));

        let flags = PackFlags {
            targets: vec![LINUX_X64],
            install_prompt: Some("Need Java %d, %d".to_string()),
            ..Default::default()
        };
        assert!(resolve(Path::new("app.jar"), flags, None).is_err());
    }

    #[test]
    fn test_name_defaults_to_jar_stem() {
        let flags = PackFlags {
            targets: vec![LINUX_X64],
            ..Default::default()
        };
        let settings = resolve(Path::new("build/libs/app-1.2.jar"), flags, None).unwrap();
        assert_eq!(settings.name, "app-1.2");
    }

    #[test]
    fn test_duplicate_targets_collapsed() {
        let flags = PackFlags {
            targets: vec![LINUX_X64, WIN_X64, LINUX_X64],
            ..Default::default()
        };
        let settings = resolve(Path::new("app.jar"), flags, None).unwrap();
        assert_eq!(settings.targets, vec![LINUX_X64, WIN_X64]);
    }

    #[test]
    fn test_single_target_requests() {
        let flags = PackFlags {
            targets: vec![WIN_X64],
            ..Default::default()
        };
        let settings = resolve(Path::new("app.jar"), flags, None).unwrap();
        let requests = settings.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].destination, PathBuf::from("app.exe"));

        let flags = PackFlags {
            targets: vec![LINUX_X64],
            output: Some(PathBuf::from("bin/tool")),
            ..Default::default()
        };
        let settings = resolve(Path::new("app.jar"), flags, None).unwrap();
        assert_eq!(settings.requests()[0].destination, PathBuf::from("bin/tool"));
    }

    #[test]
    fn test_multi_target_requests() {
        let flags = PackFlags {
            targets: vec![LINUX_X64, MAC_ARM64, WIN_X64],
            ..Default::default()
        };
        let settings = resolve(Path::new("app.jar"), flags, None).unwrap();
        assert!(settings.is_multi_target());

        let destinations: Vec<_> = settings
            .requests()
            .into_iter()
            .map(|r| r.destination)
            .collect();
        assert_eq!(
            destinations,
            vec![
                PathBuf::from("dist/app-linux-x64"),
                PathBuf::from("dist/app-macos-arm64"),
                PathBuf::from("dist/app-windows-x64.exe"),
            ]
        );
    }

    #[test]
    fn test_stub_dir_explicit_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let found = find_stub_dir_in(
            Some(Path::new("/flag/stubs")),
            Some(PathBuf::from("/env/stubs")),
            Some(temp_dir.path()),
            None,
        )
        .unwrap();
        assert_eq!(found, PathBuf::from("/flag/stubs"));

        let found =
            find_stub_dir_in(None, Some(PathBuf::from("/env/stubs")), None, None).unwrap();
        assert_eq!(found, PathBuf::from("/env/stubs"));
    }

    #[test]
    fn test_stub_dir_discovery_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let prefix = temp_dir.path();
        let exe_dir = prefix.join("bin");
        let share = prefix.join("share/jarforge/stubs");
        let data = prefix.join("data");
        std::fs::create_dir_all(&exe_dir).unwrap();
        std::fs::create_dir_all(&share).unwrap();
        std::fs::create_dir_all(data.join("jarforge/stubs")).unwrap();

        let found = find_stub_dir_in(None, None, Some(&exe_dir), Some(data.clone())).unwrap();
        assert_eq!(found, share);

        std::fs::create_dir_all(exe_dir.join("stubs")).unwrap();
        let found = find_stub_dir_in(None, None, Some(&exe_dir), Some(data)).unwrap();
        assert_eq!(found, exe_dir.join("stubs"));
    }

    #[test]
    fn test_stub_dir_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = find_stub_dir_in(
            None,
            None,
            Some(temp_dir.path()),
            Some(temp_dir.path().to_path_buf()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::StubDirNotFound(_)));
        assert!(err.to_string().contains(STUB_DIR_ENV));
    }
}
