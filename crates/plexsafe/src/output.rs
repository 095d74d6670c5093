//! Terminal output utilities

use console::{style, Term};
use plexsafe_archive::{BarProgress, LogProgress, ProgressReporter};
use plexsafe_core::utils::format_bytes;
use std::sync::Arc;
use std::time::Duration;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Byte count with its human-readable size
pub fn bytes(count: u64) -> String {
    format!("{} ({} bytes)", format_bytes(count), count)
}

pub fn duration(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}

/// Progress bars on an interactive terminal, log lines otherwise
pub fn progress_reporter(quiet: bool) -> Arc<dyn ProgressReporter> {
    if !quiet && Term::stderr().is_term() {
        Arc::new(BarProgress::new())
    } else {
        Arc::new(LogProgress::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_format() {
        assert_eq!(duration(Duration::from_millis(1300)), "1.3s");
        assert_eq!(duration(Duration::from_secs(90)), "90.0s");
    }

    #[test]
    fn test_bytes_format_keeps_exact_count() {
        assert!(bytes(2048).ends_with("(2048 bytes)"));
    }
}
