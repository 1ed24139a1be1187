//! jarforge CLI entry point.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

/// jarforge - native executables from runnable JARs
#[derive(Parser, Debug)]
#[command(name = "jarforge")]
#[command(about = "Package a runnable JAR as a native executable per platform")]
#[command(
    long_about = "jarforge turns a runnable JAR into native executables for \
Windows, Linux and macOS.\n\n\
Each executable is a prebuilt launcher stub with the JAR and a small trailer \
appended. Nothing is compiled at pack time, so any host can build for any target.\n\n\
Quick start:\n  \
jarforge pack app.jar\n  \
jarforge pack app.jar -t linux/x64 -t windows/x64 -o dist\n  \
jarforge inspect dist/app-linux-x64"
)]
#[command(version)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Package a JAR into native executables
    Pack(cli::pack::PackCmd),

    /// Show the layout of a packed executable
    Inspect(cli::inspect::InspectCmd),

    /// Recover the JAR from a packed executable
    Extract(cli::extract::ExtractCmd),

    /// List target platforms and available stubs
    Targets(cli::targets::TargetsCmd),
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on RUST_LOG or default to warn
    init_logging(cli.verbose);

    tracing::debug!(version = jarforge::VERSION, "starting jarforge");

    let result = match cli.command {
        Commands::Pack(cmd) => cmd.run(),
        Commands::Inspect(cmd) => cmd.run(),
        Commands::Extract(cmd) => cmd.run(),
        Commands::Targets(cmd) => cmd.run(),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber.
fn init_logging(verbose: bool) {
    // Directive targets match by prefix, so this also covers jarforge_pack
    let default = if verbose { "jarforge=debug" } else { "jarforge=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
