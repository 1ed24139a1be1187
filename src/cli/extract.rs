//! Extract command for recovering the embedded JAR.

use std::path::PathBuf;

use clap::Args;
use jarforge_pack::output::DATA_MODE;
use jarforge_pack::{extract, OutputFinalizer};
use tracing::info;

/// Write the JAR embedded in a packed executable back to disk.
///
/// Compressed payloads are decompressed, so the result is byte-identical to
/// the JAR that was packed.
///
/// Examples:
///   jarforge extract dist/app-linux-x64 -o app.jar
#[derive(Args, Debug)]
pub struct ExtractCmd {
    /// Executable produced by `jarforge pack`
    #[arg(value_name = "EXE")]
    pub exe: PathBuf,

    /// Where to write the JAR
    #[arg(short = 'o', long, value_name = "JAR")]
    pub output: PathBuf,

    /// Replace an existing output file
    #[arg(long)]
    pub overwrite: bool,
}

impl ExtractCmd {
    pub fn run(self) -> jarforge::Result<()> {
        let (trailer, jar) = extract::extract_jar(&self.exe)?;

        let artifact = OutputFinalizer::new()
            .mode(DATA_MODE)
            .overwrite(self.overwrite)
            .write(&jar, &self.output)?;

        info!(
            exe = %self.exe.display(),
            path = %artifact.path.display(),
            entry_point = %trailer.entry_point(),
            "extracted jar"
        );
        println!(
            "Extracted {} ({} bytes, entry point {})",
            artifact.path.display(),
            artifact.size,
            trailer.entry_point()
        );
        Ok(())
    }
}
