//! Headless Chrome/Chromium as the page renderer.
//!
//! Runs the browser's `--print-to-pdf` mode as a child process, waits for it
//! with a deadline, and reads the PDF back from a temporary file.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::RenderConfig;
use crate::error::{ConvertError, Result};
use crate::render::{RenderRequest, Renderer};

/// Executable names tried, in order, when no browser path is configured.
const BROWSER_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
    "msedge",
];

/// How often the child process is polled while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Renderer backed by a local Chrome-family browser.
///
/// The command-line print mode fires once the page's load event has run,
/// by which point `body` is present. Other wait selectors, and turning
/// background printing off, cannot be expressed on the command line; such
/// requests are printed anyway with a warning.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    executable: PathBuf,
    extra_args: Vec<String>,
}

impl ChromeRenderer {
    /// Use the browser at `executable`.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            extra_args: Vec::new(),
        }
    }

    /// Build from configuration: an explicit `chrome_path`, else the first
    /// known browser found on `PATH`.
    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        let executable = match &config.chrome_path {
            Some(path) => path.clone(),
            None => find_browser().ok_or_else(|| {
                ConvertError::Render(format!(
                    "no browser found on PATH (tried {}); set render.chrome_path",
                    BROWSER_CANDIDATES.join(", ")
                ))
            })?,
        };
        info!(browser = %executable.display(), "Using browser");
        Ok(Self {
            executable,
            extra_args: config.extra_args.clone(),
        })
    }

    fn command(&self, request: &RenderRequest, output: &Path) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-pdf-header-footer")
            .arg("--run-all-compositor-stages-before-draw")
            .arg(format!("--user-agent={}", request.user_agent))
            .arg(format!("--print-to-pdf={}", output.display()))
            .args(&self.extra_args)
            .arg(&request.url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Renderer for ChromeRenderer {
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>> {
        for note in ignored_options(request) {
            warn!("{note}");
        }

        let output = tempfile::Builder::new()
            .prefix("mhtml2pdf-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| ConvertError::Render(format!("cannot create temporary file: {e}")))?;

        let start = Instant::now();
        let mut child = self.command(request, output.path()).spawn().map_err(|e| {
            ConvertError::Render(format!("cannot start {}: {e}", self.executable.display()))
        })?;

        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });

        let status = wait_with_deadline(&mut child, request.timeout)?;
        let stderr = stderr
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(ConvertError::Render(format!(
                "{} exited with {status}: {}",
                self.executable.display(),
                last_lines(&stderr, 5)
            )));
        }

        let pdf = std::fs::read(output.path())
            .map_err(|e| ConvertError::Render(format!("cannot read printed PDF: {e}")))?;
        if pdf.is_empty() {
            return Err(ConvertError::Render(format!(
                "browser produced no output: {}",
                last_lines(&stderr, 5)
            )));
        }

        debug!(
            url = %request.url,
            bytes = pdf.len(),
            secs = start.elapsed().as_secs_f64(),
            "Printed page"
        );
        Ok(pdf)
    }
}

/// Request options the command-line print mode cannot apply.
fn ignored_options(request: &RenderRequest) -> Vec<String> {
    let mut notes = Vec::new();
    if request.wait_selector != "body" {
        notes.push(format!(
            "Browser print mode cannot wait for selector {:?}; printing after load",
            request.wait_selector
        ));
    }
    if !request.print_background {
        notes.push(
            "Browser print mode cannot turn off background printing; using the browser default"
                .to_string(),
        );
    }
    notes
}

/// Wait for `child`, killing it if it outlives `timeout`.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<std::process::ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ConvertError::Render(format!(
                    "timed out after {}s",
                    timeout.as_secs()
                )));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(ConvertError::Render(format!("cannot wait for browser: {e}"))),
        }
    }
}

/// First browser from [`BROWSER_CANDIDATES`] found on `PATH`.
fn find_browser() -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    let dirs: Vec<PathBuf> = std::env::split_paths(&path).collect();
    BROWSER_CANDIDATES.iter().find_map(|name| {
        dirs.iter().find_map(|dir| {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
            let exe = candidate.with_extension("exe");
            exe.is_file().then_some(exe)
        })
    })
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(timeout: Duration) -> RenderRequest {
        RenderRequest {
            url: "file:///tmp/none.html".to_string(),
            wait_selector: "body".to_string(),
            user_agent: "WebScraper 1.0".to_string(),
            print_background: true,
            timeout,
        }
    }

    #[test]
    fn test_command_line() {
        let renderer = ChromeRenderer::new("/opt/chrome");
        let cmd = renderer.command(&request(Duration::from_secs(1)), Path::new("/tmp/out.pdf"));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--user-agent=WebScraper 1.0".to_string()));
        assert!(args.contains(&"--print-to-pdf=/tmp/out.pdf".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("file:///tmp/none.html"));
    }

    #[test]
    fn test_missing_executable_is_render_error() {
        let renderer = ChromeRenderer::new("/nonexistent/browser/binary");
        let err = renderer.render(&request(Duration::from_secs(5))).unwrap_err();
        assert!(matches!(err, ConvertError::Render(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let start = Instant::now();
        let err = wait_with_deadline(&mut child, Duration::from_millis(200)).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_browser_reports_exit() {
        // `false` ignores its arguments and exits 1.
        let renderer = ChromeRenderer::new("false");
        let err = renderer.render(&request(Duration::from_secs(5))).unwrap_err();
        assert!(err.to_string().contains("exited with"), "{err}");
    }

    #[test]
    fn test_ignored_options_are_reported() {
        assert!(ignored_options(&request(Duration::from_secs(1))).is_empty());

        let mut req = request(Duration::from_secs(1));
        req.print_background = false;
        req.wait_selector = "#content".to_string();
        let notes = ignored_options(&req);
        assert_eq!(notes.len(), 2);
        assert!(notes[0].contains("#content"));
        assert!(notes[1].contains("background"));
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\n\nb\nc\n", 2), "b | c");
        assert_eq!(last_lines("", 2), "");
    }
}
