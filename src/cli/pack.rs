//! Pack command for turning a JAR into native executables.

use std::path::PathBuf;

use clap::Args;
use jarforge::config::{self, PackFlags};
use jarforge::Error;
use jarforge_pack::{JarPayload, Packer, PlatformTarget, StubRegistry, Zstd};
use tracing::{debug, info};

use super::format_size;

/// Package a runnable JAR as a native executable for one or more platforms.
///
/// Each executable is a prebuilt launcher stub with the JAR and a small
/// trailer appended. With one target, `--output` names the file; with
/// several, it names the directory receiving `<name>-<os>-<arch>` files.
/// The trailer also records which Java releases the stub may use and the
/// JVM flags it passes.
///
/// Examples:
///   jarforge pack app.jar
///   jarforge pack app.jar -t linux/x64 -o bin/app
///   jarforge pack app.jar --min-java 17 --jvm-arg=-Xmx1g
///   jarforge pack app.jar -t linux/x64 -t macos/arm64 -t windows/x64 -o dist
///   jarforge pack app.jar -c jarforge.toml --overwrite
#[derive(Args, Debug)]
pub struct PackCmd {
    /// Runnable JAR to package
    #[arg(value_name = "JAR")]
    pub jar: PathBuf,

    /// Target platform, repeatable (e.g., linux/x64, macos/arm64, windows/x64)
    ///
    /// Defaults to the pack file's targets, then to the host platform.
    #[arg(short = 't', long = "target", value_name = "OS/ARCH")]
    pub targets: Vec<PlatformTarget>,

    /// Output file (one target) or directory (several targets)
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Base name for generated executables (defaults to the JAR's file stem)
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Entry point class, overriding the manifest's Main-Class
    #[arg(long, value_name = "CLASS")]
    pub main_class: Option<String>,

    /// Directory containing jarforge-stub-<os>-<arch> launchers
    #[arg(long, value_name = "DIR")]
    pub stub_dir: Option<PathBuf>,

    /// Embed the JAR as a zstd frame (format version 2)
    #[arg(long)]
    pub compress: bool,

    /// Replace existing output files
    #[arg(long)]
    pub overwrite: bool,

    /// Application name shown by the launcher
    #[arg(long, value_name = "NAME")]
    pub app_name: Option<String>,

    /// Oldest Java release to accept (default 8, raised to what the JAR needs)
    #[arg(long, value_name = "VERSION")]
    pub min_java: Option<u16>,

    /// Java release offered for installation when none is found (default 21)
    #[arg(long, value_name = "VERSION")]
    pub preferred_java: Option<u16>,

    /// Prompt shown before installing Java; %d is the minimum version
    #[arg(long, value_name = "TEXT")]
    pub install_prompt: Option<String>,

    /// Extra JVM flag, repeatable (e.g., --jvm-arg=-Xmx1g)
    #[arg(long = "jvm-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub jvm_args: Vec<String>,

    /// Pack file with defaults for this build
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl PackCmd {
    pub fn run(self) -> jarforge::Result<()> {
        let file = match &self.config {
            Some(path) => Some(config::load(path)?),
            None => None,
        };
        let flags = PackFlags {
            targets: self.targets,
            output: self.output,
            name: self.name,
            stub_dir: self.stub_dir,
            main_class: self.main_class,
            compress: self.compress,
            overwrite: self.overwrite,
            app_name: self.app_name,
            min_java: self.min_java,
            preferred_java: self.preferred_java,
            install_prompt: self.install_prompt,
            jvm_args: self.jvm_args,
        };
        let settings = config::resolve(&self.jar, flags, file)?;
        debug!(settings = ?settings, "resolved pack settings");

        let stub_dir = config::find_stub_dir(settings.stub_dir.as_deref())?;
        let jar = JarPayload::read_with_entry_point(&self.jar, settings.main_class.as_deref())?;

        info!(
            jar = %self.jar.display(),
            entry_point = %jar.entry_point(),
            targets = settings.targets.len(),
            "packing jar"
        );
        println!(
            "Packing {} ({}, entry point {})",
            self.jar.display(),
            format_size(jar.len()),
            jar.entry_point(),
        );
        let launch = settings.launch.resolve(&jar)?;
        println!(
            "Java {}+ (offers Java {} when missing)",
            launch.min_java_version, launch.preferred_java_version
        );
        if !launch.launch_args.is_empty() {
            println!("Launch args: {}", launch.launch_args.join(" "));
        }

        if settings.is_multi_target() {
            let dir = settings.output_dir();
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::config("create output directory", format!("{}: {}", dir.display(), e))
            })?;
        }

        let mut packer = Packer::new(StubRegistry::from_dir(&stub_dir))
            .overwrite(settings.overwrite)
            .with_launch(settings.launch.clone());
        if settings.compress {
            packer = packer.with_transform(Zstd::default());
        }

        let requests = settings.requests();
        let report = packer.pack_all(&jar, &requests)?;

        for outcome in &report.outcomes {
            match &outcome.result {
                Ok(artifact) => println!(
                    "  {:<14} {} ({})",
                    outcome.target.to_string(),
                    artifact.path.display(),
                    format_size(artifact.size)
                ),
                Err(e) => println!("  {:<14} FAILED: {}", outcome.target.to_string(), e),
            }
        }

        let failed = report.failures().count();
        if failed > 0 {
            return Err(Error::targets_failed(failed, report.outcomes.len()));
        }
        Ok(())
    }
}
