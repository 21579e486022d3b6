//! External screenshot-capture runner.
//!
//! The capture tool is a black box behind a small contract: given an
//! extension root, an output directory, a size, and a count budget, it
//! either drops captured images under `<out-dir>/screenshots/` or exits
//! non-zero. This module discovers it on PATH, runs it with a bounded wait,
//! and distinguishes "not installed" from "ran and failed", since the two
//! get different remediations.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use storeforge_spec::asset_spec::has_image_suffix;
use storeforge_spec::StageError;

/// Default capture executable looked up on PATH.
pub const DEFAULT_CAPTURE_COMMAND: &str = "cws-capture";

/// Default bounded wait for a capture run (page loads can be slow behind
/// logins).
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(300);

/// One capture invocation.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capture executable name or path.
    pub command: String,
    pub extension_root: PathBuf,
    /// Store-assets root; captures land under `screenshots/` inside it.
    pub out_dir: PathBuf,
    pub size: (u32, u32),
    pub max: usize,
    /// Extra URLs to capture besides the extension surfaces.
    pub urls: Vec<String>,
    pub timeout: Duration,
}

impl CaptureConfig {
    pub fn new(extension_root: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: DEFAULT_CAPTURE_COMMAND.to_string(),
            extension_root: extension_root.into(),
            out_dir: out_dir.into(),
            size: storeforge_spec::DEFAULT_SCREENSHOT_SIZE,
            max: storeforge_spec::MAX_SCREENSHOTS,
            urls: Vec::new(),
            timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }
}

/// Files a successful capture produced.
#[derive(Debug)]
pub struct CaptureResult {
    pub captured: Vec<PathBuf>,
    pub duration: Duration,
}

/// Whether the capture tool resolves on PATH.
pub fn tool_available(command: &str) -> bool {
    which::which(command).is_ok()
}

/// Runs the capture tool and returns the captured image files.
pub fn run_capture(config: &CaptureConfig) -> Result<CaptureResult, StageError> {
    let executable =
        which::which(&config.command).map_err(|_| StageError::CaptureToolUnavailable {
            tool: config.command.clone(),
        })?;

    std::fs::create_dir_all(config.out_dir.join("screenshots"))?;

    let mut cmd = Command::new(executable);
    cmd.arg("--extension-root")
        .arg(&config.extension_root)
        .arg("--out-dir")
        .arg(&config.out_dir)
        .arg("--size")
        .arg(format!("{}x{}", config.size.0, config.size.1))
        .arg("--max")
        .arg(config.max.to_string());
    if !config.urls.is_empty() {
        cmd.arg("--urls");
        cmd.args(&config.urls);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let start = Instant::now();
    let child = cmd.spawn().map_err(|e| StageError::CaptureFailed {
        tool: config.command.clone(),
        detail: e.to_string(),
    })?;
    let output = wait_with_timeout(child, config.timeout, &config.command)?;
    let duration = start.elapsed();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(StageError::CaptureFailed {
            tool: config.command.clone(),
            detail: if detail.is_empty() {
                format!("exit status {}", output.status)
            } else {
                detail
            },
        });
    }

    Ok(CaptureResult {
        captured: collect_screenshots(&config.out_dir),
        duration,
    })
}

/// Image files currently under `<assets-root>/screenshots/`, sorted.
pub fn collect_screenshots(assets_root: &Path) -> Vec<PathBuf> {
    let dir = assets_root.join("screenshots");
    let mut files: Vec<PathBuf> = match std::fs::read_dir(&dir) {
        Ok(read) => read
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_image_suffix(path))
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

/// Waits for a child process, killing it after the timeout.
fn wait_with_timeout(
    mut child: std::process::Child,
    timeout: Duration,
    tool: &str,
) -> Result<std::process::Output, StageError> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = child
                    .stdout
                    .take()
                    .map(|mut s| {
                        let mut buf = Vec::new();
                        std::io::Read::read_to_end(&mut s, &mut buf).ok();
                        buf
                    })
                    .unwrap_or_default();
                let stderr = child
                    .stderr
                    .take()
                    .map(|mut s| {
                        let mut buf = Vec::new();
                        std::io::Read::read_to_end(&mut s, &mut buf).ok();
                        buf
                    })
                    .unwrap_or_default();
                return Ok(std::process::Output {
                    status,
                    stdout,
                    stderr,
                });
            }
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(StageError::CaptureTimeout {
                        tool: tool.to_string(),
                        seconds: timeout.as_secs(),
                    });
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                return Err(StageError::CaptureFailed {
                    tool: tool.to_string(),
                    detail: format!("failed to wait for process: {e}"),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tool_is_unavailable() {
        assert!(!tool_available("storeforge-test-no-such-capture-tool"));

        let config = CaptureConfig {
            command: "storeforge-test-no-such-capture-tool".to_string(),
            ..CaptureConfig::new("/tmp", "/tmp")
        };
        assert!(matches!(
            run_capture(&config),
            Err(StageError::CaptureToolUnavailable { .. })
        ));
    }

    #[test]
    fn test_collect_screenshots_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("screenshots");
        std::fs::create_dir_all(&shots).unwrap();
        std::fs::write(shots.join("b.png"), b"x").unwrap();
        std::fs::write(shots.join("a.jpg"), b"x").unwrap();
        std::fs::write(shots.join("notes.txt"), b"x").unwrap();

        let captured = collect_screenshots(dir.path());
        let names: Vec<String> = captured
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }
}
