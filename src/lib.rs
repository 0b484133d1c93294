//! # proposal-rpa
//!
//! Browser automation for batch-sending proposals over the Chrome DevTools
//! Protocol (CDP).
//!
//! The engine walks a lazily loaded list of "Send Proposal" controls in an
//! operator's logged-in browser tab. For each control it opens the proposal
//! modal, picks the template term and the due date, inserts the comment,
//! submits, and acknowledges the disclaimer. It scrolls for more controls
//! until the target count is reached or the scroll budget runs out, and
//! reconnects to the browser when the session goes unstable.
//!
//! ## Running it
//!
//! ```bash
//! # Start Chrome with remote debugging, log in, open the list, then:
//! cargo run -- --ws-endpoint ws://127.0.0.1:9222/devtools/browser/<id> --max-count 20
//!
//! # Or let the tool launch a visible browser with a persistent profile
//! cargo run -- --user-data-dir ./profile --url https://app.example/partners
//! ```
//!
//! ## Library usage
//!
//! ```rust,no_run
//! use proposal_rpa::{AutomationEngine, ChromeProvider, ConnectionOptions, EngineConfig, Endpoint};
//!
//! let provider = ChromeProvider::new(Endpoint::Connect(ConnectionOptions::new(
//!     "ws://127.0.0.1:9222/devtools/browser/abc",
//! )))
//! .tab_hint("impact");
//!
//! let config = EngineConfig::new().max_count(5).template_text("Looking forward to working with you");
//! let report = AutomationEngine::new(provider, config).start();
//! println!("{:?}: {} sent", report.status, report.clicked);
//! ```
//!
//! ## Module Overview
//!
//! - [`browser`]: Chrome launch/attach, tab selection and the CDP page adapter
//! - [`dom`]: the `Page` trait, locators, fallback resolution and DOM markers
//! - [`engine`]: scanner, modal workflow, connection supervisor and the run loop
//! - [`config`]: settings, selector catalog and comment templates
//! - [`sinks`]: exception and notification reporting
//! - [`error`]: error types and result aliases

pub mod browser;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod sinks;

pub use browser::{BrowserSession, ChromePage, ChromeProvider, ConnectionOptions, Endpoint, LaunchOptions};
pub use config::{EngineConfig, SelectorCatalog, TemplateBook};
pub use dom::{ElementHandle, Locator, LocatorKind, Marker, Page, Scope, SelectorResolver};
pub use engine::{AmbiguityPolicy, AutomationEngine, CancelFlag, RunReport, RunStatus};
pub use error::{BrowserError, Result};
pub use sinks::{ExceptionSink, LogExceptionSink, LogNotifier, NotificationKind, NotificationSink};
