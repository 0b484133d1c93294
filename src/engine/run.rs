use crate::config::EngineConfig;
use crate::dom::{ElementHandle, Locator, Marker, Page, Scope, SelectorResolver};
use crate::engine::scanner::ButtonScanner;
use crate::engine::session::{Session, SessionProvider};
use crate::engine::supervisor::{ConnectionSupervisor, ReconnectPolicy};
use crate::engine::terms::{AmbiguityPolicy, Disambiguator};
use crate::engine::workflow::{ModalWorkflow, WorkflowContext};
use crate::error::Result;
use crate::sinks::{
    ExceptionContext, ExceptionSink, LogExceptionSink, LogNotifier, NotificationKind, NotificationSink,
    ScreenshotRecorder,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Cooperative stop request shared with the host
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Target count reached
    Completed,
    /// Scroll budget used up
    Exhausted,
    Cancelled,
    Failed { reason: String },
}

/// Counters of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    pub clicked: usize,
    /// Items given up on: unclickable controls and failed modals
    pub skipped: usize,
    pub scrolls: usize,
    /// Controls counted but not yet clicked in this batch
    pub pending: usize,
    scroll_due: bool,
}

impl RunState {
    pub fn record_detected(&mut self, count: usize) {
        self.pending += count;
    }

    /// A control was clicked. Clearing the last pending one makes a scroll due.
    pub fn record_click(&mut self) {
        self.clicked += 1;
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 {
            self.scroll_due = true;
        }
    }

    /// A counted control was given up on without a click. It leaves the
    /// batch the same way a clicked one does.
    pub fn record_skip(&mut self) {
        self.skipped += 1;
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 {
            self.scroll_due = true;
        }
    }

    pub fn scroll_due(&self) -> bool {
        self.scroll_due
    }

    /// Counted controls disappeared before they were clicked
    pub fn reset_pending(&mut self) {
        self.pending = 0;
    }

    fn take_scroll_due(&mut self) -> bool {
        std::mem::take(&mut self.scroll_due)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub status: RunStatus,
    pub clicked: usize,
    pub skipped: usize,
    pub scrolls: usize,
    /// Controls discovered across the run
    pub detected: usize,
    pub reconnects: usize,
}

enum Batch {
    Done,
    /// A transient failure cut the batch short
    Interrupted,
    Stop(RunStatus),
}

/// Scans, clicks, fills modals, and scrolls until the target count is reached
/// or the list runs dry
pub struct AutomationEngine<S: SessionProvider> {
    provider: S,
    config: EngineConfig,
    disambiguator: Box<dyn Disambiguator + Send>,
    exceptions: Box<dyn ExceptionSink + Send>,
    notifier: Box<dyn NotificationSink + Send>,
    screenshots: Option<ScreenshotRecorder>,
    cancel: CancelFlag,
}

impl<S: SessionProvider> AutomationEngine<S> {
    pub fn new(provider: S, config: EngineConfig) -> Self {
        let screenshots = config
            .screenshot_on_error
            .then(|| ScreenshotRecorder::new(config.screenshot_dir.clone()));
        Self {
            provider,
            config,
            disambiguator: Box::new(AmbiguityPolicy::default()),
            exceptions: Box::new(LogExceptionSink),
            notifier: Box::new(LogNotifier),
            screenshots,
            cancel: CancelFlag::new(),
        }
    }

    /// Builder method: set the ambiguous-term policy
    pub fn disambiguator(mut self, disambiguator: impl Disambiguator + Send + 'static) -> Self {
        self.disambiguator = Box::new(disambiguator);
        self
    }

    /// Builder method: set where failures are reported
    pub fn exception_sink(mut self, sink: impl ExceptionSink + Send + 'static) -> Self {
        self.exceptions = Box::new(sink);
        self
    }

    /// Builder method: set where the end-of-run message goes
    pub fn notifier(mut self, notifier: impl NotificationSink + Send + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    /// Builder method: share a cancel flag with the host
    pub fn cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that stops the run at the next checkpoint
    pub fn canceller(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open a session through the provider and run on it
    pub fn start(&mut self) -> RunReport {
        match Session::open(&self.provider) {
            Ok(session) => self.run(session),
            Err(e) => {
                self.exceptions
                    .log_exception(&e, &ExceptionContext::new("connect to browser"));
                self.finish(RunStatus::Failed { reason: e.to_string() }, &RunState::default(), 0, 0)
            }
        }
    }

    /// Run to completion on `session`. Sends exactly one notification.
    pub fn run(&mut self, mut session: Session<S::Handle, S::Page>) -> RunReport {
        let max_count = self.config.max_count;
        log::info!(
            "Starting run: target {} proposals, at most {} scrolls",
            max_count,
            self.config.max_scrolls
        );

        let mut supervisor = ConnectionSupervisor::new(ReconnectPolicy {
            max_consecutive_errors: self.config.max_consecutive_errors,
            attempts: self.config.reconnect_attempts,
            delay: self.config.reconnect_delay(),
        });
        let catalog = &self.config.catalog;
        let mut scanner = ButtonScanner::new(catalog.control.clone(), &self.config.control_text, catalog.marker.clone());
        let mut state = RunState::default();

        if let Err(e) = session.page.wait_document_loaded(PAGE_LOAD_TIMEOUT) {
            log::warn!("Page did not report loaded: {}", e);
        }

        let status = loop {
            if self.cancel.is_cancelled() {
                break RunStatus::Cancelled;
            }

            if supervisor.should_reconnect() {
                match supervisor.reconnect(&self.provider) {
                    Ok(fresh) => session = fresh,
                    Err(e) => {
                        self.report(&session.page, "reconnect to browser", &e, None);
                        break RunStatus::Failed { reason: e.to_string() };
                    }
                }
            }

            if state.clicked >= max_count {
                break RunStatus::Completed;
            }
            if state.scrolls >= self.config.max_scrolls {
                break RunStatus::Exhausted;
            }

            let scan = match scanner.scan(&session.page, &Scope::Page) {
                Ok(scan) => scan,
                Err(e) => {
                    let control = self.config.catalog.control.clone();
                    self.report(&session.page, "scan for controls", &e, Some(&control));
                    if e.is_transient() {
                        supervisor.record_failure();
                        continue;
                    }
                    Default::default()
                }
            };
            state.record_detected(scan.newly_marked);
            if scan.newly_marked > 0 {
                log::info!(
                    "Detected {} new controls, {} pending in this batch ({} total)",
                    scan.newly_marked,
                    state.pending,
                    scanner.total_detected()
                );
            }

            if scan.eligible.is_empty() {
                if state.pending > 0 {
                    log::debug!("{} counted controls vanished, resetting the batch", state.pending);
                    state.reset_pending();
                    continue;
                }
                self.scroll(&session.page, &mut state, &mut supervisor);
                continue;
            }

            supervisor.record_success();
            match self.click_batch(&session.page, &scan.eligible, &scanner, &mut state, &mut supervisor) {
                Batch::Stop(status) => break status,
                Batch::Interrupted => continue,
                Batch::Done => {}
            }

            if state.clicked >= max_count {
                continue;
            }
            if state.take_scroll_due() || state.pending == 0 {
                self.scroll(&session.page, &mut state, &mut supervisor);
            }
        };

        self.finish(status, &state, scanner.total_detected(), supervisor.reconnects())
    }

    fn click_batch(
        &mut self,
        page: &S::Page,
        eligible: &[ElementHandle],
        scanner: &ButtonScanner,
        state: &mut RunState,
        supervisor: &mut ConnectionSupervisor,
    ) -> Batch {
        let ctx = WorkflowContext {
            category: None,
            template_term: self.config.template_term.clone(),
            template_text: self.config.template_text.clone(),
        };

        for control in eligible {
            if self.cancel.is_cancelled() {
                return Batch::Stop(RunStatus::Cancelled);
            }
            if state.clicked >= self.config.max_count {
                log::info!("Reached the target of {} proposals", self.config.max_count);
                return Batch::Done;
            }

            let category = match self.category_of(page, control) {
                Ok(category) => category,
                Err(e) => {
                    let indicator = self.config.catalog.category_indicator.clone();
                    self.report(page, "read row category", &e, Some(&indicator));
                    if e.is_transient() {
                        supervisor.record_failure();
                        return Batch::Interrupted;
                    }
                    None
                }
            };
            let control_locator = self.config.catalog.control.clone();

            match self.click_control(page, control) {
                Ok(true) => {}
                Ok(false) => {
                    log::error!("Could not click control {:?}, skipping it", control);
                    give_up(page, control, scanner, state);
                    continue;
                }
                Err(e) if e.is_transient() => {
                    log::warn!("Page changed under the click: {}", e);
                    self.report(page, "click control", &e, Some(&control_locator));
                    supervisor.record_failure();
                    return Batch::Interrupted;
                }
                Err(e) => {
                    self.report(page, "click control", &e, Some(&control_locator));
                    give_up(page, control, scanner, state);
                    continue;
                }
            }

            state.record_click();
            log::info!(
                "[{}/{}] Clicked control (category: {})",
                state.clicked,
                self.config.max_count,
                category.as_deref().unwrap_or("-")
            );
            page.pause(self.config.click_delay());
            if let Err(e) = scanner.markers().advance(page, control, Marker::Clicked) {
                log::warn!("Could not mark control {:?} as clicked: {}", control, e);
            }

            let ctx = WorkflowContext { category, ..ctx.clone() };
            let outcome = ModalWorkflow::new(&self.config, self.disambiguator.as_ref()).run(page, &ctx);
            match outcome {
                Ok(report) => {
                    supervisor.record_success();
                    for note in &report.notes {
                        log::warn!("Submitted with gaps: {}", note);
                    }
                    log::info!("Proposal sent with term {:?}", report.term);
                }
                Err(e) if e.is_transient() => {
                    log::warn!("Page disconnected during the modal: {}", e);
                    self.report(page, "handle proposal modal", &e, None);
                    supervisor.record_failure();
                    return Batch::Interrupted;
                }
                Err(e) => {
                    log::error!("Modal failed: {}", e);
                    self.report(page, "handle proposal modal", &e, None);
                    state.skipped += 1;
                }
            }
        }
        Batch::Done
    }

    /// Text of the nearest "selected category" indicator above the control,
    /// falling back to the first one on the page
    fn category_of(&self, page: &S::Page, control: &ElementHandle) -> Result<Option<String>> {
        let catalog = &self.config.catalog;
        let resolver = SelectorResolver::new(page);

        let mut found = None;
        let mut ancestor = page.parent(control)?;
        for _ in 0..self.config.max_category_depth {
            let Some(current) = ancestor else { break };
            found = resolver.resolve(&Scope::Element(current), std::slice::from_ref(&catalog.category_indicator))?;
            if found.is_some() {
                break;
            }
            ancestor = page.parent(&current)?;
        }
        if found.is_none() {
            found = resolver.resolve(&Scope::Page, &catalog.category_page_fallback)?;
        }

        let Some(indicator) = found else {
            return Ok(None);
        };
        let text = page.text(&indicator)?.trim().to_string();
        Ok((!text.is_empty()).then_some(text))
    }

    /// Click through successive ancestors. `Ok(false)` once the ascent budget
    /// is spent or the document root is reached.
    fn click_control(&self, page: &S::Page, control: &ElementHandle) -> Result<bool> {
        let mut ancestor = page.parent(control)?;
        for ascent in 0..self.config.max_parent_ascents {
            let Some(current) = ancestor else {
                return Ok(false);
            };
            match self.click_via(page, control, &current) {
                Ok(()) => return Ok(true),
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => log::debug!("click attempt {} on {:?} failed: {}", ascent + 1, control, e),
            }
            ancestor = page.parent(&current)?;
        }
        Ok(false)
    }

    fn click_via(&self, page: &S::Page, control: &ElementHandle, ancestor: &ElementHandle) -> Result<()> {
        if let Err(e) = page.scroll_into_view(ancestor) {
            if e.is_transient() {
                return Err(e);
            }
            log::debug!("could not scroll {:?} into view: {}", ancestor, e);
        }
        page.pause(Duration::from_millis(200));
        page.hover(ancestor)?;
        page.pause(Duration::from_millis(300));

        match page.click(control, true) {
            Err(e) if e.is_not_interactable() => {
                log::debug!("control {:?} not interactable, retrying: {}", control, e);
                page.scroll_into_view(control)?;
                page.pause(Duration::from_millis(300));
                match page.click(control, true) {
                    Err(e) if e.is_not_interactable() => page.click(ancestor, true),
                    other => other,
                }
            }
            other => other,
        }
    }

    fn scroll(&mut self, page: &S::Page, state: &mut RunState, supervisor: &mut ConnectionSupervisor) {
        if self.cancel.is_cancelled() {
            return;
        }
        match page.scroll_page(self.config.scroll_pixels) {
            Ok(()) => {
                state.scrolls += 1;
                log::info!(
                    "Scrolled {}/{} times, sent {}/{}",
                    state.scrolls,
                    self.config.max_scrolls,
                    state.clicked,
                    self.config.max_count
                );
                page.pause(self.config.scroll_delay());
            }
            Err(e) => {
                self.report(page, "scroll page", &e, None);
                supervisor.record_failure();
            }
        }
    }

    #[track_caller]
    fn report(&mut self, page: &S::Page, operation: &str, error: &dyn std::error::Error, locator: Option<&Locator>) {
        let mut context = ExceptionContext::new(operation).page_url(page.url());
        if let Some(locator) = locator {
            context = context.locator(locator).timeout_ms(locator.timeout_ms);
        }
        if let Some(recorder) = self.screenshots.as_mut() {
            context = context.screenshot(recorder.capture(page, operation));
        }
        self.exceptions.log_exception(error, &context);
    }

    fn finish(&self, status: RunStatus, state: &RunState, detected: usize, reconnects: usize) -> RunReport {
        let (title, message, kind) = match &status {
            RunStatus::Completed => (
                "Proposal run complete",
                format!("Sent {} proposals", state.clicked),
                NotificationKind::Success,
            ),
            RunStatus::Exhausted => (
                "Proposal run complete",
                format!("Sent {} proposals, no more controls after {} scrolls", state.clicked, state.scrolls),
                NotificationKind::Success,
            ),
            RunStatus::Cancelled => (
                "Proposal run cancelled",
                format!("Sent {} proposals before cancellation", state.clicked),
                NotificationKind::Info,
            ),
            RunStatus::Failed { reason } => (
                "Proposal run failed",
                format!("Sent {} proposals before failing: {}", state.clicked, reason),
                NotificationKind::Failure,
            ),
        };
        log::info!("{}: {}", title, message);
        self.notifier.notify(title, &message, kind);

        RunReport {
            status,
            clicked: state.clicked,
            skipped: state.skipped,
            scrolls: state.scrolls,
            detected,
            reconnects,
        }
    }
}

/// Retire a control that could not be clicked so later scans pass over it
fn give_up<P: Page + ?Sized>(page: &P, control: &ElementHandle, scanner: &ButtonScanner, state: &mut RunState) {
    match scanner.markers().advance(page, control, Marker::Skipped) {
        Ok(true) => {}
        Ok(false) => log::warn!("Could not mark control {:?} as skipped", control),
        Err(e) => log::warn!("Could not mark control {:?} as skipped: {}", control, e),
    }
    state.record_skip();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_gating() {
        let mut state = RunState::default();
        state.record_detected(3);

        state.record_click();
        state.record_click();
        assert_eq!(state.pending, 1);
        assert!(!state.scroll_due());

        state.record_click();
        assert_eq!(state.pending, 0);
        assert!(state.scroll_due());
        assert!(state.take_scroll_due());
        assert!(!state.scroll_due());
    }

    #[test]
    fn test_skip_leaves_batch() {
        let mut state = RunState::default();
        state.record_detected(2);

        state.record_skip();
        assert_eq!(state.skipped, 1);
        assert_eq!(state.pending, 1);
        assert!(!state.scroll_due());

        state.record_click();
        assert_eq!(state.pending, 0);
        assert!(state.scroll_due());

        state.record_skip();
        assert_eq!(state.pending, 0);
        assert_eq!(state.skipped, 2);
    }

    #[test]
    fn test_pending_never_negative() {
        let mut state = RunState::default();
        state.record_click();
        assert_eq!(state.pending, 0);
        assert_eq!(state.clicked, 1);

        state.record_detected(2);
        state.reset_pending();
        assert_eq!(state.pending, 0);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let host = flag.clone();
        assert!(!flag.is_cancelled());
        host.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_report_json() {
        let report = RunReport {
            status: RunStatus::Failed {
                reason: "reconnect".to_string(),
            },
            clicked: 1,
            skipped: 0,
            scrolls: 2,
            detected: 3,
            reconnects: 0,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "reconnect");
        assert_eq!(json["scrolls"], 2);
    }
}
