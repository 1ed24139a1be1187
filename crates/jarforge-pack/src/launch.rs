//! Launch settings baked into version 3 trailers.
//!
//! A stub cannot ask anyone how to start the application, so everything it
//! needs beyond the entry point is fixed at pack time: which Java releases it
//! may use, which one to offer when none is installed, what to call the
//! application and which JVM flags to pass.

use tracing::debug;

use crate::format::{LaunchMetadata, MAX_LAUNCH_ARGS, MAX_LAUNCH_FIELD_LEN};
use crate::manifest::JarPayload;
use crate::{PackError, Result};

/// Minimum Java release when nothing newer is configured or required.
pub const DEFAULT_MIN_JAVA_VERSION: u16 = 8;

/// Java release offered for installation by default.
pub const DEFAULT_PREFERRED_JAVA_VERSION: u16 = 21;

/// Oldest Java release a stub can start (class file major 49).
pub const OLDEST_JAVA_VERSION: u16 = 5;

/// Prompt shown before offering to install Java; `%d` is the minimum version.
pub const DEFAULT_INSTALL_PROMPT: &str = "This application requires Java %d or greater, which \
could not be found. Install now? The download may take a few moments.";

/// Launch settings chosen by whoever runs the packer.
///
/// Combined with what the JAR itself requires by [`LaunchOptions::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    app_name: Option<String>,
    min_java_version: u16,
    preferred_java_version: u16,
    install_prompt: Option<String>,
    jvm_args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            app_name: None,
            min_java_version: DEFAULT_MIN_JAVA_VERSION,
            preferred_java_version: DEFAULT_PREFERRED_JAVA_VERSION,
            install_prompt: None,
            jvm_args: Vec::new(),
        }
    }
}

impl LaunchOptions {
    /// Defaults: Java 8 minimum, Java 21 preferred, stock prompt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name shown by the stub in dialogs and console output.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into()).filter(|n: &String| !n.is_empty());
        self
    }

    /// Oldest Java release to accept. Raised automatically if the entry
    /// class needs a newer one.
    pub fn min_java_version(mut self, version: u16) -> Self {
        self.min_java_version = version;
        self
    }

    /// Release the stub offers to install.
    pub fn preferred_java_version(mut self, version: u16) -> Self {
        self.preferred_java_version = version;
        self
    }

    /// Replace the install prompt.
    pub fn install_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.install_prompt = Some(prompt.into());
        self
    }

    /// Extra JVM flags, passed after the ones derived from the manifest.
    pub fn jvm_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.jvm_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Check the settings on their own, before any JAR is involved.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PackError::InvalidLaunchOptions(msg));

        if self.min_java_version < OLDEST_JAVA_VERSION {
            return invalid(format!(
                "minimum Java version {} is older than Java {}",
                self.min_java_version, OLDEST_JAVA_VERSION
            ));
        }
        if self.preferred_java_version < self.min_java_version {
            return invalid(format!(
                "preferred Java version {} is older than the minimum {}",
                self.preferred_java_version, self.min_java_version
            ));
        }
        if let Some(prompt) = &self.install_prompt {
            check_prompt(prompt).or_else(|msg| invalid(format!("install prompt: {}", msg)))?;
        }

        let mut strings = self
            .app_name
            .iter()
            .chain(self.install_prompt.iter())
            .chain(self.jvm_args.iter());
        if let Some(long) = strings.find(|s| s.len() > MAX_LAUNCH_FIELD_LEN) {
            return invalid(format!(
                "value of {} bytes exceeds the {}-byte limit",
                long.len(),
                MAX_LAUNCH_FIELD_LEN
            ));
        }
        if self.jvm_args.iter().any(String::is_empty) {
            return invalid("empty JVM argument".to_string());
        }
        Ok(())
    }

    /// Metadata to embed for `jar`.
    ///
    /// The minimum version is raised to what the entry class needs, which
    /// must not exceed the preferred version. Launch arguments are the
    /// manifest-derived flags followed by the configured ones.
    pub fn resolve(&self, jar: &JarPayload) -> Result<LaunchMetadata> {
        self.validate()?;
        jar.check_preferred_java(self.preferred_java_version)?;

        let min_java_version = self.min_java_version.max(jar.min_java_version());
        let launch_args: Vec<String> = jar
            .launch_args()
            .iter()
            .chain(self.jvm_args.iter())
            .cloned()
            .collect();
        if launch_args.len() > MAX_LAUNCH_ARGS {
            return Err(PackError::InvalidLaunchOptions(format!(
                "{} launch arguments, limit is {}",
                launch_args.len(),
                MAX_LAUNCH_ARGS
            )));
        }

        debug!(
            jar = %jar.path().display(),
            min_java_version,
            preferred_java_version = self.preferred_java_version,
            launch_args = launch_args.len(),
            "resolved launch metadata"
        );

        Ok(LaunchMetadata {
            app_name: self.app_name.clone(),
            min_java_version,
            preferred_java_version: self.preferred_java_version,
            install_prompt: Some(
                self.install_prompt
                    .clone()
                    .unwrap_or_else(|| DEFAULT_INSTALL_PROMPT.to_string()),
            ),
            launch_args,
        })
    }
}

/// `%d` may appear once; a literal percent is written `%%`.
fn check_prompt(prompt: &str) -> std::result::Result<(), String> {
    let mut templates = 0;
    let mut chars = prompt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        match chars.next() {
            Some('%') => {}
            Some('d') => {
                templates += 1;
                if templates > 1 {
                    return Err("only one %d is allowed".to_string());
                }
            }
            Some(other) => {
                return Err(format!("'%' must be followed by '%' or 'd', not {:?}", other))
            }
            None => return Err("ends with a lone '%'".to_string()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::tests::build_jar;

    const MF: &str = concat!(
        "Manifest-Version: 1.0\n",
        "Main-Class: demo.App\n",
        "Add-Opens: java.base/java.lang\n",
    );

    fn jar(major: u16) -> JarPayload {
        let bytes = build_jar(Some(MF), &[("demo/App.class", major)]);
        JarPayload::from_bytes("app.jar", bytes, None).unwrap()
    }

    #[test]
    fn test_defaults() {
        let meta = LaunchOptions::new().resolve(&jar(52)).unwrap();
        assert_eq!(meta.min_java_version, 8);
        assert_eq!(meta.preferred_java_version, 21);
        assert_eq!(meta.app_name, None);
        assert_eq!(meta.install_prompt.as_deref(), Some(DEFAULT_INSTALL_PROMPT));
        assert_eq!(
            meta.launch_args,
            vec!["--add-opens", "java.base/java.lang=ALL-UNNAMED"]
        );
    }

    #[test]
    fn test_min_version_follows_entry_class() {
        // Java 17 class raises the configured minimum
        let meta = LaunchOptions::new().resolve(&jar(61)).unwrap();
        assert_eq!(meta.min_java_version, 17);

        // but never lowers it
        let meta = LaunchOptions::new()
            .min_java_version(11)
            .resolve(&jar(52))
            .unwrap();
        assert_eq!(meta.min_java_version, 11);
    }

    #[test]
    fn test_entry_class_newer_than_preferred() {
        let err = LaunchOptions::new()
            .preferred_java_version(17)
            .resolve(&jar(65))
            .unwrap_err();
        assert!(matches!(
            err,
            PackError::IncompatibleJava {
                required: 21,
                preferred: 17,
                ..
            }
        ));
    }

    #[test]
    fn test_jvm_args_follow_manifest_args() {
        let meta = LaunchOptions::new()
            .app_name("Demo")
            .jvm_args(["-Xmx1g", "-Dapp.mode=cli"])
            .resolve(&jar(52))
            .unwrap();
        assert_eq!(meta.app_name.as_deref(), Some("Demo"));
        assert_eq!(
            meta.launch_args,
            vec![
                "--add-opens",
                "java.base/java.lang=ALL-UNNAMED",
                "-Xmx1g",
                "-Dapp.mode=cli"
            ]
        );
    }

    #[test]
    fn test_invalid_versions() {
        let opts = LaunchOptions::new().min_java_version(4);
        assert!(matches!(
            opts.validate(),
            Err(PackError::InvalidLaunchOptions(_))
        ));

        let opts = LaunchOptions::new()
            .min_java_version(17)
            .preferred_java_version(11);
        assert!(matches!(
            opts.resolve(&jar(52)),
            Err(PackError::InvalidLaunchOptions(_))
        ));
    }

    #[test]
    fn test_install_prompt_templates() {
        assert!(check_prompt(DEFAULT_INSTALL_PROMPT).is_ok());
        assert!(check_prompt("Needs 100%% Java %d").is_ok());
        assert!(check_prompt("no template").is_ok());
        assert!(check_prompt("%d and %d").is_err());
        assert!(check_prompt("50%").is_err());
        assert!(check_prompt("%s").is_err());

        let opts = LaunchOptions::new().install_prompt("Java %d+ %x");
        assert!(matches!(
            opts.validate(),
            Err(PackError::InvalidLaunchOptions(_))
        ));
    }

    #[test]
    fn test_empty_values() {
        let opts = LaunchOptions::new().app_name("");
        assert_eq!(opts.resolve(&jar(52)).unwrap().app_name, None);

        let opts = LaunchOptions::new().jvm_args([""]);
        assert!(opts.validate().is_err());
    }
}
