//! Targets command for listing what the stub directory can build.

use std::path::PathBuf;

use clap::Args;
use jarforge::config;
use jarforge_pack::{PlatformTarget, StubRegistry};

/// List target platforms and whether a stub is available for each.
///
/// Examples:
///   jarforge targets
///   jarforge targets --stub-dir ./stubs
#[derive(Args, Debug)]
pub struct TargetsCmd {
    /// Directory containing jarforge-stub-<os>-<arch> launchers
    #[arg(long, value_name = "DIR")]
    pub stub_dir: Option<PathBuf>,

    /// Only show platforms with a stub
    #[arg(long)]
    pub available: bool,
}

impl TargetsCmd {
    pub fn run(self) -> jarforge::Result<()> {
        let stub_dir = config::find_stub_dir(self.stub_dir.as_deref())?;
        let registry = StubRegistry::from_dir(&stub_dir);
        let available = registry.available()?;
        let host = PlatformTarget::host().ok();

        println!("Stubs: {}", registry.describe());
        for target in PlatformTarget::all() {
            let has_stub = available.contains(&target);
            if self.available && !has_stub {
                continue;
            }
            println!(
                "  {:<14} {}{}",
                target.to_string(),
                if has_stub { "available" } else { "missing" },
                if host == Some(target) { " (host)" } else { "" }
            );
        }
        Ok(())
    }
}
