//! Inspect command for reading back an assembled executable.

use std::path::{Path, PathBuf};

use clap::Args;
use jarforge::Error;
use jarforge_pack::transform::for_encoding;
use jarforge_pack::{extract, JarPayload, PayloadEncoding};
use serde::Serialize;
use tracing::warn;

use super::format_size;

/// Show the layout and launch metadata of a packed executable.
///
/// Examples:
///   jarforge inspect dist/app-linux-x64
///   jarforge inspect app.exe --json
#[derive(Args, Debug)]
pub struct InspectCmd {
    /// Executable produced by `jarforge pack`
    #[arg(value_name = "EXE")]
    pub exe: PathBuf,

    /// Print a JSON document instead of text
    #[arg(long)]
    pub json: bool,
}

/// What `inspect` reports about one executable.
#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub path: PathBuf,
    pub file_size: u64,
    pub format_version: u32,
    pub compressed: bool,
    pub stub_length: u64,
    pub payload_offset: u64,
    pub payload_length: u64,
    pub payload_crc32: u32,
    pub trailer_length: usize,
    pub entry_point: String,
    pub jar_length: u64,
    /// Whether the launch settings came from the trailer rather than the
    /// embedded manifest.
    pub launch_embedded: bool,
    pub app_name: Option<String>,
    /// `None` when not embedded and the archive could not be read as a JAR.
    pub min_java_version: Option<u16>,
    pub preferred_java_version: Option<u16>,
    pub install_prompt: Option<String>,
    pub launch_args: Vec<String>,
}

impl InspectReport {
    /// Decode the trailer and payload of `path`.
    pub fn read(path: &Path) -> jarforge::Result<Self> {
        let file_size = std::fs::metadata(path)?.len();
        let (trailer, payload) = extract::read_payload(path)?;
        let payload_crc32 = crc32fast::hash(&payload);
        let jar = for_encoding(trailer.payload_encoding()).decompress(&payload)?;
        let jar_length = jar.len() as u64;

        let launch = trailer.launch().cloned();
        let (min_java_version, launch_args) = match &launch {
            Some(launch) => (Some(launch.min_java_version), launch.launch_args.clone()),
            // Older trailers: what the stub derives from the manifest
            None => match JarPayload::from_bytes(path, jar, Some(trailer.entry_point())) {
                Ok(jar) => (Some(jar.min_java_version()), jar.launch_args().to_vec()),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "embedded jar unreadable");
                    (None, Vec::new())
                }
            },
        };

        Ok(Self {
            path: path.to_path_buf(),
            file_size,
            format_version: trailer.format_version(),
            compressed: trailer.payload_encoding() == PayloadEncoding::Zstd,
            stub_length: trailer.stub_length(),
            payload_offset: trailer.jar_offset(),
            payload_length: trailer.jar_length(),
            payload_crc32,
            trailer_length: trailer.encoded_len(),
            entry_point: trailer.entry_point().to_string(),
            jar_length,
            launch_embedded: launch.is_some(),
            app_name: launch.as_ref().and_then(|l| l.app_name.clone()),
            min_java_version,
            preferred_java_version: launch.as_ref().map(|l| l.preferred_java_version),
            install_prompt: launch.and_then(|l| l.install_prompt),
            launch_args,
        })
    }

    fn print(&self) {
        println!("{}", self.path.display());
        println!("  File size:      {} ({} bytes)", format_size(self.file_size), self.file_size);
        println!(
            "  Format:         v{}{}",
            self.format_version,
            if self.compressed { " (zstd)" } else { "" }
        );
        println!("  Stub:           {} bytes", self.stub_length);
        println!(
            "  Payload:        {} bytes at offset {} (crc32 {:08x})",
            self.payload_length, self.payload_offset, self.payload_crc32
        );
        if self.compressed {
            println!("  JAR:            {} bytes uncompressed", self.jar_length);
        }
        println!("  Trailer:        {} bytes", self.trailer_length);
        println!("  Entry point:    {}", self.entry_point);
        if let Some(name) = &self.app_name {
            println!("  App name:       {}", name);
        }
        match self.min_java_version {
            Some(v) => println!("  Min Java:       {}", v),
            None => println!("  Min Java:       unknown (embedded jar unreadable)"),
        }
        if let Some(v) = self.preferred_java_version {
            println!("  Preferred Java: {}", v);
        }
        if let Some(prompt) = &self.install_prompt {
            println!("  Install prompt: {}", prompt);
        }
        if !self.launch_args.is_empty() {
            println!("  Launch args:    {}", self.launch_args.join(" "));
        }
    }
}

impl InspectCmd {
    pub fn run(self) -> jarforge::Result<()> {
        let report = InspectReport::read(&self.exe)?;

        if self.json {
            let json =
                serde_json::to_string_pretty(&report).map_err(|e| Error::Render(e.to_string()))?;
            println!("{}", json);
        } else {
            report.print();
        }
        Ok(())
    }
}
