//! CLI command implementations.

pub mod extract;
pub mod inspect;
pub mod pack;
pub mod targets;

/// Format a byte count for status lines (`48.2 KB`, `1.3 MB`).
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}
