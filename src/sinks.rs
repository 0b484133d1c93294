//! Where the engine reports to
//!
//! Both sinks are fire-and-forget: implementations swallow their own failures
//! so reporting can never break a run.

use crate::dom::Page;
use serde::Serialize;
use std::fmt;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Source location of the engine code that reported a failure
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CallerInfo {
    pub file: String,
    pub line: u32,
}

impl From<&Location<'_>> for CallerInfo {
    fn from(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
        }
    }
}

/// What the engine was doing when something failed
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ExceptionContext {
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<CallerInfo>,
    /// Saved screenshot, or why taking one failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<Screenshot>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Screenshot {
    Saved(PathBuf),
    Failed(String),
}

impl ExceptionContext {
    /// Context for `operation`, recording the caller's location
    #[track_caller]
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            caller: Some(Location::caller().into()),
            ..Default::default()
        }
    }

    /// Builder method: set the locator involved
    pub fn locator(mut self, locator: impl fmt::Display) -> Self {
        self.locator = Some(locator.to_string());
        self
    }

    /// Builder method: set the timeout involved
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Builder method: set the page URL
    pub fn page_url(mut self, url: Option<String>) -> Self {
        self.page_url = url;
        self
    }

    /// Builder method: attach a screenshot outcome
    pub fn screenshot(mut self, screenshot: Option<Screenshot>) -> Self {
        self.screenshot = screenshot;
        self
    }
}

/// Saves viewport screenshots for exception reports, at most one per
/// [`ScreenshotRecorder::MIN_INTERVAL`]
#[derive(Debug, Clone)]
pub struct ScreenshotRecorder {
    dir: PathBuf,
    last: Option<Instant>,
}

impl ScreenshotRecorder {
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1500);

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), last: None }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `None` when rate limited. A failed capture is reported, not raised.
    pub fn capture<P: Page + ?Sized>(&mut self, page: &P, reason: &str) -> Option<Screenshot> {
        let now = Instant::now();
        if self.last.is_some_and(|last| now.duration_since(last) < Self::MIN_INTERVAL) {
            return None;
        }
        self.last = Some(now);

        let name = format!(
            "page_{}_{}.png",
            chrono::Local::now().format("%Y%m%d_%H%M%S_%f"),
            file_stem(reason)
        );
        let path = self.dir.join(name);
        let saved = page.screenshot().and_then(|png| {
            std::fs::create_dir_all(&self.dir)?;
            std::fs::write(&path, png)?;
            Ok(())
        });
        Some(match saved {
            Ok(()) => Screenshot::Saved(path),
            Err(e) => {
                log::warn!("screenshot for {:?} failed: {}", reason, e);
                Screenshot::Failed(e.to_string())
            }
        })
    }
}

fn file_stem(reason: &str) -> String {
    let stem: String = reason
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .take(80)
        .collect();
    if stem.is_empty() { "error".to_string() } else { stem }
}

/// Receives failures worth keeping for later inspection
pub trait ExceptionSink {
    fn log_exception(&self, error: &dyn std::error::Error, context: &ExceptionContext);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Failure,
    Info,
}

/// Receives the end-of-run message
pub trait NotificationSink {
    fn notify(&self, title: &str, message: &str, kind: NotificationKind);
}

/// Writes exceptions to the `log` facade as one JSON line each
#[derive(Debug, Default, Clone, Copy)]
pub struct LogExceptionSink;

impl ExceptionSink for LogExceptionSink {
    fn log_exception(&self, error: &dyn std::error::Error, context: &ExceptionContext) {
        let context = serde_json::to_string(context).unwrap_or_else(|e| format!("<unserializable context: {}>", e));
        log::error!(target: "proposal_rpa::exceptions", "{} | context={}", error, context);
    }
}

/// Writes notifications to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, title: &str, message: &str, kind: NotificationKind) {
        match kind {
            NotificationKind::Failure => log::error!(target: "proposal_rpa::notify", "{}: {}", title, message),
            _ => log::info!(target: "proposal_rpa::notify", "{}: {}", title, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_records_caller() {
        let ctx = ExceptionContext::new("find element")
            .locator("css:.selected-tab")
            .timeout_ms(500)
            .page_url(Some("https://app.example/list".to_string()));

        let caller = ctx.caller.clone().unwrap();
        assert!(caller.file.ends_with("sinks.rs"));
        assert!(caller.line > 0);

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["operation"], "find element");
        assert_eq!(json["locator"], "css:.selected-tab");
        assert_eq!(json["timeout_ms"], 500);
        assert!(json.get("screenshot").is_none());
    }

    #[test]
    fn test_screenshot_rate_limited() {
        let dir = tempfile::tempdir().unwrap();
        let page = crate::dom::memory::MemoryPage::new();
        let mut recorder = ScreenshotRecorder::new(dir.path().join("shots"));

        let first = recorder.capture(&page, "click control/42").unwrap();
        let Screenshot::Saved(path) = first else {
            panic!("expected a saved screenshot, got {first:?}");
        };
        assert!(path.file_name().unwrap().to_string_lossy().ends_with("_click_control_42.png"));
        assert!(std::fs::read(&path).unwrap().starts_with(b"\x89PNG"));

        assert!(recorder.capture(&page, "scroll").is_none());
    }

    #[test]
    fn test_screenshot_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let page = crate::dom::memory::MemoryPage::new();
        page.disconnect();

        let shot = ScreenshotRecorder::new(dir.path()).capture(&page, "").unwrap();
        assert!(matches!(shot, Screenshot::Failed(_)));
        assert_eq!(file_stem("  "), "error");
    }

    #[test]
    fn test_log_sinks_never_panic() {
        let err = std::io::Error::other("boom");
        LogExceptionSink.log_exception(&err, &ExceptionContext::new("scroll"));
        LogNotifier.notify("done", "sent 0", NotificationKind::Info);
    }
}
