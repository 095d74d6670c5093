//! Shared utility functions for plexsafe crates

use anyhow::anyhow;
use std::path::PathBuf;
use std::process::Output;
use tracing::{debug, warn};

/// Get the user's home directory
///
/// Prefers the HOME environment variable over dirs::home_dir() so service
/// accounts with an overridden HOME resolve the same directory their shell does.
pub fn get_home_dir() -> anyhow::Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }

    dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))
}

/// Check if a command is available in PATH
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Run a command asynchronously and capture its output.
///
/// A non-zero exit is not an error here; callers inspect the status.
pub async fn run_command_async(cmd: &str, args: &[&str]) -> std::io::Result<Output> {
    debug!("Running async: {} {}", cmd, args.join(" "));

    let output = tokio::process::Command::new(cmd)
        .args(args)
        .output()
        .await?;

    if !output.status.success() {
        warn!(
            "Command exited with {:?}: {} {}\n{}",
            output.status.code(),
            cmd,
            args.join(" "),
            command_text(&output)
        );
    }

    Ok(output)
}

/// Combined, trimmed stdout and stderr of a finished command
pub fn command_text(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.trim(), stderr.trim()) {
        ("", err) => err.to_string(),
        (out, "") => out.to_string(),
        (out, err) => format!("{}\n{}", out, err),
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;
    const KB: u64 = 1024;

    if bytes >= GB {
        format!("{:.1}GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_home_dir_from_env() {
        if std::env::var("HOME").is_ok() {
            let home = get_home_dir().unwrap();
            assert!(!home.as_os_str().is_empty());
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.0KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0GB");
    }

    #[test]
    fn test_command_exists_rejects_nonsense() {
        assert!(!command_exists("plexsafe-no-such-binary-9f3c"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_async_captures_output() {
        let output = run_command_async("sh", &["-c", "echo out; echo err >&2; exit 3"])
            .await
            .unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(command_text(&output), "out\nerr");
    }
}
