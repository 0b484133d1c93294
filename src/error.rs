use thiserror::Error;

/// Errors surfaced by the browser adapter and the engine plumbing
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("Element is no longer attached: {0}")]
    StaleElement(String),

    #[error("JavaScript evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Page disconnected: {0}")]
    Disconnected(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for browser operations
pub type Result<T> = std::result::Result<T, BrowserError>;

/// Message fragments that mean the page or the DevTools connection went away.
const DISCONNECT_MARKERS: &[&str] = &["disconnect", "context", "target closed", "connection closed"];

/// Message fragments that mean a node handle outlived its DOM node.
const STALE_MARKERS: &[&str] = &["no such", "could not find node", "no node with given id"];

/// Message fragments that mean the node has no clickable box.
const NOT_INTERACTABLE_MARKERS: &[&str] =
    &["norect", "no rect", "not interactable", "could not compute box model", "no quad"];

impl BrowserError {
    /// Classify a raw driver error message.
    ///
    /// The adapter gets opaque errors back from the DevTools client, so the
    /// message text is the only signal left. Anything that matches none of
    /// the marker sets becomes `fallback`.
    pub fn classify(operation: &str, message: impl AsRef<str>, fallback: fn(String) -> BrowserError) -> Self {
        let message = message.as_ref();
        let lower = message.to_lowercase();
        let detail = format!("{}: {}", operation, message);

        if DISCONNECT_MARKERS.iter().any(|m| lower.contains(m)) {
            BrowserError::Disconnected(detail)
        } else if STALE_MARKERS.iter().any(|m| lower.contains(m)) {
            BrowserError::StaleElement(detail)
        } else if NOT_INTERACTABLE_MARKERS.iter().any(|m| lower.contains(m)) {
            BrowserError::NotInteractable(detail)
        } else {
            fallback(detail)
        }
    }

    /// True when the failure means the session itself is unstable and should
    /// count towards a reconnect.
    pub fn is_transient(&self) -> bool {
        matches!(self, BrowserError::Disconnected(_) | BrowserError::StaleElement(_))
    }

    pub fn is_not_interactable(&self) -> bool {
        matches!(self, BrowserError::NotInteractable(_))
    }
}
