//! The modal form opened by each target control
//!
//! [`ModalWorkflow::run`] drives the fixed step sequence inside the modal
//! frame: pick the template term, optionally the category tag, tomorrow's
//! date, the comment, then submit and acknowledge the disclaimer. Hard
//! failures abort the item with an [`ItemError`]. Soft failures are written
//! to [`ModalReport::notes`] and the form is submitted anyway.

use crate::config::{EngineConfig, SelectorCatalog};
use crate::dom::{ElementHandle, Locator, Page, Scope, SelectorResolver};
use crate::engine::terms::{category_key, match_terms, Disambiguator, TermMatch};
use crate::error::BrowserError;
use chrono::{Datelike, Local, NaiveDate};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Ancestors of the term label searched for a dropdown trigger
const TERM_TRIGGER_ASCENTS: usize = 5;
const DROPDOWN_WAIT_MS: u64 = 2000;
const SETTLE: Duration = Duration::from_millis(300);

/// Why one item was abandoned
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("modal surface did not appear within {0:?}")]
    SurfaceTimeout(Duration),

    #[error("template term {desired:?} not found (options: {available:?})")]
    TermNotFound { desired: String, available: Vec<String> },

    #[error("template term {desired:?} matches several options: {candidates:?}")]
    TermAmbiguous { desired: String, candidates: Vec<String> },

    #[error("category tag input not found")]
    CategoryInputMissing,

    #[error("category {typed:?} does not match first suggestion {suggested:?}")]
    CategoryMismatch { typed: String, suggested: Option<String> },

    #[error("submit button not found")]
    SubmitNotFound,

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl ItemError {
    /// Connection-level failure that should count toward a reconnect
    pub fn is_transient(&self) -> bool {
        matches!(self, ItemError::Browser(e) if e.is_transient())
    }
}

/// Inputs for one modal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowContext {
    /// Category of the row the control came from
    pub category: Option<String>,
    pub template_term: String,
    pub template_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    AwaitSurface,
    SelectTerm,
    SelectCategoryTag,
    SelectDate,
    FillComment,
    Submit,
    AcknowledgeDisclaimer,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::AwaitSurface => "await surface",
            Step::SelectTerm => "select term",
            Step::SelectCategoryTag => "select category tag",
            Step::SelectDate => "select date",
            Step::FillComment => "fill comment",
            Step::Submit => "submit",
            Step::AcknowledgeDisclaimer => "acknowledge disclaimer",
        };
        f.write_str(name)
    }
}

/// What a submitted modal looked like
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModalReport {
    /// Label of the term option that was picked
    pub term: String,
    pub category: Option<String>,
    pub date_selected: bool,
    pub comment_filled: bool,
    pub disclaimer_acknowledged: bool,
    /// Soft failures, one line per step that was skipped
    pub notes: Vec<String>,
}

impl ModalReport {
    fn note(&mut self, step: Step, message: impl fmt::Display) {
        log::warn!("{}: {}", step, message);
        self.notes.push(format!("{}: {}", step, message));
    }
}

/// Soft steps swallow everything but connection failures
fn soft<T>(result: Result<T, ItemError>, step: Step, report: &mut ModalReport) -> Result<Option<T>, ItemError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_transient() => Err(e),
        Err(e) => {
            report.note(step, e);
            Ok(None)
        }
    }
}

pub struct ModalWorkflow<'a> {
    catalog: &'a SelectorCatalog,
    disambiguator: &'a dyn Disambiguator,
    modal_wait: Duration,
    poll_interval: Duration,
    target_date: Option<NaiveDate>,
}

impl<'a> ModalWorkflow<'a> {
    pub fn new(config: &'a EngineConfig, disambiguator: &'a dyn Disambiguator) -> Self {
        Self {
            catalog: &config.catalog,
            disambiguator,
            modal_wait: config.modal_wait(),
            poll_interval: config.modal_poll_interval(),
            target_date: None,
        }
    }

    /// Pick this date instead of tomorrow
    pub fn target_date(mut self, date: NaiveDate) -> Self {
        self.target_date = Some(date);
        self
    }

    /// Fill in and submit the modal that the last click opened
    pub fn run<P: Page + ?Sized>(&self, page: &P, ctx: &WorkflowContext) -> Result<ModalReport, ItemError> {
        let surface = Scope::Element(self.await_surface(page)?);
        let mut report = ModalReport {
            term: self.select_term(page, &surface, &ctx.template_term)?,
            ..Default::default()
        };

        if let Some(category) = ctx.category.as_deref().filter(|c| !c.trim().is_empty()) {
            self.select_category(page, &surface, category)?;
            report.category = Some(category.to_string());
        }

        match soft(self.select_date(page, &surface), Step::SelectDate, &mut report)? {
            Some(Some(date)) => {
                log::info!("selected date {}", date);
                report.date_selected = true;
            }
            Some(None) => report.note(Step::SelectDate, "no cell for the due date"),
            None => {}
        }

        if ctx.template_text.is_empty() {
            report.note(Step::FillComment, "template text is empty");
        } else {
            match soft(self.fill_comment(page, &surface, &ctx.template_text), Step::FillComment, &mut report)? {
                Some(true) => report.comment_filled = true,
                Some(false) => report.note(Step::FillComment, "comment field not found"),
                None => {}
            }
        }

        self.submit(page, &surface)?;

        match soft(self.acknowledge_disclaimer(page, &surface), Step::AcknowledgeDisclaimer, &mut report)? {
            Some(true) => report.disclaimer_acknowledged = true,
            Some(false) => log::info!("no disclaimer shown"),
            None => {}
        }

        Ok(report)
    }

    fn await_surface<P: Page + ?Sized>(&self, page: &P) -> Result<ElementHandle, ItemError> {
        let locator = &self.catalog.modal_surface;
        let mut waited = Duration::ZERO;
        loop {
            if let Some(frame) = page.locate(&Scope::Page, locator.kind, &locator.value, locator.timeout())? {
                return Ok(frame);
            }
            waited += locator.timeout();
            if waited >= self.modal_wait {
                return Err(ItemError::SurfaceTimeout(self.modal_wait));
            }
            page.pause(self.poll_interval);
            waited += self.poll_interval;
        }
    }

    /// Returns the label of the option that was picked
    fn select_term<P: Page + ?Sized>(&self, page: &P, surface: &Scope, desired: &str) -> Result<String, ItemError> {
        let resolver = SelectorResolver::new(page);
        let desired = desired.trim();

        if let Some(select) = resolver.resolve(surface, &self.catalog.term_select)? {
            if page.select_by_label(&select, desired)? {
                log::info!("selected template term {:?}", desired);
                page.pause(SETTLE);
                return Ok(desired.to_string());
            }
            log::warn!("native term select has no option {:?}, trying the custom dropdown", desired);
        }

        if !self.open_term_dropdown(page, surface)? {
            log::warn!("term dropdown did not open");
        }
        page.pause(SETTLE);

        let mut available = Vec::new();
        let open_now = self.catalog.term_dropdown.clone().timeout_ms(0);
        let dropdowns = resolver.resolve_all(surface, std::slice::from_ref(&open_now))?;
        if let Some(dropdown) = dropdowns.last() {
            let options = resolver.resolve_all(&Scope::Element(*dropdown), &self.catalog.term_options)?;
            let labels = self.texts(page, &options)?;
            if let Some(picked) = self.choose_term(page, desired, &options, &labels)? {
                return Ok(picked);
            }
            available = labels;
        }

        let exact = Locator::exact_text(desired).timeout_ms(DROPDOWN_WAIT_MS);
        if let Some(option) = resolver.resolve(surface, std::slice::from_ref(&exact))? {
            return self.pick_term(page, option, desired);
        }

        let scanned = resolver.resolve_all(surface, std::slice::from_ref(&self.catalog.term_option_scan))?;
        let labels = self.texts(page, &scanned)?;
        if let Some(picked) = self.choose_term(page, desired, &scanned, &labels)? {
            return Ok(picked);
        }

        Err(ItemError::TermNotFound {
            desired: desired.to_string(),
            available,
        })
    }

    /// Click a trigger near the term label, or one of the surface-wide
    /// fallbacks, until the dropdown shows up
    fn open_term_dropdown<P: Page + ?Sized>(&self, page: &P, surface: &Scope) -> Result<bool, ItemError> {
        let resolver = SelectorResolver::new(page);

        if let Some(label) = resolver.resolve(surface, &self.catalog.term_section)? {
            let mut ancestor = page.parent(&label)?;
            for _ in 0..TERM_TRIGGER_ASCENTS {
                let Some(current) = ancestor else { break };
                if let Some(trigger) = resolver.resolve(&Scope::Element(current), &self.catalog.term_triggers)? {
                    page.click(&trigger, true)?;
                    if self.dropdown_open(page, surface)? {
                        return Ok(true);
                    }
                    page.pause(Duration::from_millis(200));
                }
                ancestor = page.parent(&current)?;
            }
        }

        for fallback in &self.catalog.term_trigger_fallbacks {
            if let Some(trigger) = resolver.resolve(surface, std::slice::from_ref(fallback))? {
                page.click(&trigger, true)?;
                if self.dropdown_open(page, surface)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn dropdown_open<P: Page + ?Sized>(&self, page: &P, surface: &Scope) -> Result<bool, ItemError> {
        let dropdown = self.catalog.term_dropdown.clone().timeout_ms(DROPDOWN_WAIT_MS);
        Ok(SelectorResolver::new(page)
            .resolve(surface, std::slice::from_ref(&dropdown))?
            .is_some())
    }

    /// Click the option matching `desired`. Several matches go to the
    /// disambiguator; `Ok(None)` when nothing matched.
    fn choose_term<P: Page + ?Sized>(
        &self,
        page: &P,
        desired: &str,
        options: &[ElementHandle],
        labels: &[String],
    ) -> Result<Option<String>, ItemError> {
        match match_terms(desired, labels) {
            TermMatch::None => Ok(None),
            TermMatch::Unique(i) => self.pick_term(page, options[i], &labels[i]).map(Some),
            TermMatch::Ambiguous(hits) => {
                let candidates: Vec<String> = hits.iter().map(|&i| labels[i].clone()).collect();
                match self.disambiguator.choose(desired, &candidates) {
                    Some(choice) if choice < hits.len() => {
                        let i = hits[choice];
                        self.pick_term(page, options[i], &labels[i]).map(Some)
                    }
                    _ => Err(ItemError::TermAmbiguous {
                        desired: desired.to_string(),
                        candidates,
                    }),
                }
            }
        }
    }

    fn pick_term<P: Page + ?Sized>(&self, page: &P, option: ElementHandle, label: &str) -> Result<String, ItemError> {
        page.click(&option, true)?;
        log::info!("selected template term {:?}", label.trim());
        page.pause(SETTLE);
        Ok(label.trim().to_string())
    }

    /// Texts of `elements`; detached ones read as empty
    fn texts<P: Page + ?Sized>(&self, page: &P, elements: &[ElementHandle]) -> Result<Vec<String>, ItemError> {
        let mut out = Vec::with_capacity(elements.len());
        for element in elements {
            match page.text(element) {
                Ok(text) => out.push(text),
                Err(BrowserError::StaleElement(_)) => out.push(String::new()),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(out)
    }

    fn select_category<P: Page + ?Sized>(&self, page: &P, surface: &Scope, category: &str) -> Result<(), ItemError> {
        let resolver = SelectorResolver::new(page);
        let typed: String = category.chars().filter(|c| !c.is_whitespace()).collect();

        let input = resolver
            .resolve(surface, &self.catalog.tag_input)?
            .ok_or(ItemError::CategoryInputMissing)?;
        page.click(&input, true)?;
        page.pause(SETTLE);
        page.type_text(&input, &typed)?;
        page.pause(Duration::from_millis(500));

        let mismatch = |suggested: Option<String>| ItemError::CategoryMismatch {
            typed: typed.clone(),
            suggested,
        };
        let dropdown = resolver
            .resolve(surface, &self.catalog.tag_dropdown)?
            .ok_or_else(|| mismatch(None))?;
        let first = resolver
            .resolve(&Scope::Element(dropdown), &self.catalog.tag_options)?
            .ok_or_else(|| mismatch(None))?;

        let suggested = page.text(&first)?.trim().to_string();
        if category_key(&suggested) != typed.to_lowercase() {
            return Err(mismatch(Some(suggested)));
        }
        page.click(&first, true)?;
        log::info!("selected category tag {:?}", suggested);
        page.pause(SETTLE);
        Ok(())
    }

    /// The date picked, `None` when no cell carries its day number
    fn select_date<P: Page + ?Sized>(&self, page: &P, surface: &Scope) -> Result<Option<NaiveDate>, ItemError> {
        let resolver = SelectorResolver::new(page);
        let Some(date) = self.target_date.or_else(|| Local::now().date_naive().succ_opt()) else {
            return Ok(None);
        };
        let day = date.day().to_string();

        let Some(trigger) = resolver.resolve(surface, &self.catalog.date_trigger)? else {
            return Err(BrowserError::ElementNotFound("date input".to_string()).into());
        };
        page.click(&trigger, true)?;
        page.pause(Duration::from_millis(500));

        let cells = resolver.resolve_all(surface, &self.catalog.date_cells)?;
        for (cell, text) in cells.iter().zip(self.texts(page, &cells)?) {
            if text.trim() == day {
                page.click(cell, true)?;
                page.pause(SETTLE);
                return Ok(Some(date));
            }
        }

        let by_text = Locator::exact_text(day).timeout_ms(DROPDOWN_WAIT_MS);
        if let Some(cell) = resolver.resolve(surface, std::slice::from_ref(&by_text))? {
            page.click(&cell, true)?;
            page.pause(SETTLE);
            return Ok(Some(date));
        }
        Ok(None)
    }

    fn fill_comment<P: Page + ?Sized>(&self, page: &P, surface: &Scope, text: &str) -> Result<bool, ItemError> {
        let Some(field) = SelectorResolver::new(page).resolve(surface, &self.catalog.comment_field)? else {
            return Ok(false);
        };
        page.click(&field, true)?;
        page.pause(Duration::from_millis(200));
        page.clear(&field)?;
        page.type_text(&field, text)?;
        log::info!("filled comment ({} chars)", text.chars().count());
        page.pause(SETTLE);
        Ok(true)
    }

    fn submit<P: Page + ?Sized>(&self, page: &P, surface: &Scope) -> Result<(), ItemError> {
        let button = find_button(page, surface, &self.catalog.submit)?.ok_or(ItemError::SubmitNotFound)?;
        page.click(&button, true)?;
        log::info!("submitted proposal");
        page.pause(Duration::from_secs(1));
        Ok(())
    }

    fn acknowledge_disclaimer<P: Page + ?Sized>(&self, page: &P, surface: &Scope) -> Result<bool, ItemError> {
        page.pause(Duration::from_millis(500));
        let in_surface = match find_button(page, surface, &self.catalog.disclaimer) {
            Ok(found) => found,
            // Submitting usually closes the frame
            Err(ItemError::Browser(BrowserError::StaleElement(_))) => None,
            Err(e) => return Err(e),
        };
        let button = match in_surface {
            Some(button) => Some(button),
            None => find_button(page, &Scope::Page, &self.catalog.disclaimer)?,
        };
        let Some(button) = button else {
            return Ok(false);
        };
        page.click(&button, true)?;
        log::info!("acknowledged disclaimer");
        page.pause(Duration::from_millis(500));
        Ok(true)
    }
}

/// First `<button>` matched by any strategy in `chain`. Text strategies land
/// on the innermost element, so a label inside a button resolves to the
/// button.
fn find_button<P: Page + ?Sized>(page: &P, scope: &Scope, chain: &[Locator]) -> Result<Option<ElementHandle>, ItemError> {
    let resolver = SelectorResolver::new(page);
    for locator in chain {
        for found in resolver.resolve_all(scope, std::slice::from_ref(locator))? {
            let mut current = Some(found);
            for _ in 0..2 {
                let Some(element) = current else { break };
                if page.tag_name(&element)? == "button" {
                    return Ok(Some(element));
                }
                current = page.parent(&element)?;
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::{Event, MemoryPage, NodeSpec};
    use crate::engine::terms::{PreferExact, RejectAmbiguous};

    const FRAME: &str = r#"iframe[data-testid="uicl-modal-iframe-content"]"#;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn context() -> WorkflowContext {
        WorkflowContext {
            category: None,
            template_term: "Public Terms".to_string(),
            template_text: "Hello there".to_string(),
        }
    }

    /// A modal with a custom term dropdown that opens on click
    fn modal(page: &MemoryPage, terms: &[&'static str]) -> ElementHandle {
        let frame = page.append(page.body(), NodeSpec::new("iframe").attr("data-testid", "uicl-modal-iframe-content"));
        let field = page.append(frame, NodeSpec::new("div").class("field"));
        page.append(field, NodeSpec::new("label").text("Template Term"));
        let control = page.append(field, NodeSpec::new("div").class("control"));
        page.append(
            control,
            NodeSpec::new("button").attr("data-testid", "uicl-multi-select-input-button"),
        );

        page.append(frame, NodeSpec::new("button").attr("data-testid", "uicl-date-input").text("Date"));
        let calendar = page.append(frame, NodeSpec::new("table"));
        for day in ["13", "14", "15"] {
            page.append(calendar, NodeSpec::new("td").text(day));
        }
        page.append(frame, NodeSpec::new("textarea").attr("data-testid", "uicl-textarea"));
        let submit = page.append(frame, NodeSpec::new("button").attr("data-testid", "uicl-button"));
        page.append(submit, NodeSpec::new("span").text("Send Proposal"));

        let terms: Vec<&'static str> = terms.to_vec();
        page.on_click(r#"button[data-testid="uicl-multi-select-input-button"]"#, move |dom, _| {
            let list = dom.append(frame, NodeSpec::new("div").attr("data-testid", "uicl-dropdown"));
            for term in &terms {
                dom.append(list, NodeSpec::new("li").attr("role", "option").text(*term));
            }
        });
        frame
    }

    fn clicked_text(page: &MemoryPage) -> Vec<String> {
        page.clicks()
            .into_iter()
            .map(|c| page.with_dom(|dom| dom.text_of(c)))
            .collect()
    }

    #[test]
    fn test_full_modal() {
        let page = MemoryPage::new();
        modal(&page, &["Public Terms (12)", "Ulanzi Terms (3)"]);
        let config = EngineConfig::default();
        let workflow = ModalWorkflow::new(&config, &RejectAmbiguous).target_date(date());

        let report = workflow.run(&page, &context()).unwrap();

        assert_eq!(report.term, "Public Terms (12)");
        assert!(report.date_selected);
        assert!(report.comment_filled);
        assert!(!report.disclaimer_acknowledged);
        assert!(report.notes.is_empty());
        let clicked = clicked_text(&page);
        assert!(clicked.contains(&"Public Terms (12)".to_string()));
        assert!(clicked.contains(&"14".to_string()));
        assert_eq!(clicked.last().unwrap(), "Send Proposal");
        assert!(page.events().iter().any(|e| matches!(e, Event::Typed { text, .. } if text == "Hello there")));
    }

    #[test]
    fn test_surface_timeout() {
        let page = MemoryPage::new();
        let config = EngineConfig {
            modal_wait_secs: 2.0,
            ..Default::default()
        };
        let err = ModalWorkflow::new(&config, &RejectAmbiguous)
            .run(&page, &context())
            .unwrap_err();
        assert!(matches!(err, ItemError::SurfaceTimeout(_)));
        assert!(!err.is_transient());
        assert!(page.paused() >= Duration::from_secs(2));
    }

    #[test]
    fn test_native_select() {
        let page = MemoryPage::new();
        let frame = modal(&page, &[]);
        let select = page.append(frame, NodeSpec::new("select").attr("data-testid", "uicl-select"));
        page.append(select, NodeSpec::new("option").text("Public Terms"));
        let config = EngineConfig::default();

        let report = ModalWorkflow::new(&config, &RejectAmbiguous)
            .target_date(date())
            .run(&page, &context())
            .unwrap();
        assert_eq!(report.term, "Public Terms");
        assert!(page.events().contains(&Event::Selected {
            element: select,
            label: "Public Terms".to_string()
        }));
    }

    #[test]
    fn test_ambiguous_term() {
        let page = MemoryPage::new();
        modal(&page, &["Public Terms (12)", "Ulanzi Terms (3)"]);
        let config = EngineConfig::default();
        let ctx = WorkflowContext {
            template_term: "Terms".to_string(),
            ..context()
        };

        let err = ModalWorkflow::new(&config, &RejectAmbiguous).run(&page, &ctx).unwrap_err();
        match err {
            ItemError::TermAmbiguous { candidates, .. } => assert_eq!(candidates.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!clicked_text(&page).contains(&"Send Proposal".to_string()));
    }

    /// A modal whose term options are plain divs and no dropdown ever opens
    fn scan_only_modal(page: &MemoryPage, terms: &[&str]) {
        let frame = page.append(page.body(), NodeSpec::new("iframe").attr("data-testid", "uicl-modal-iframe-content"));
        for term in terms {
            page.append(frame, NodeSpec::new("div").class("text-ellipsis").text(*term));
        }
        let submit = page.append(frame, NodeSpec::new("button").attr("data-testid", "uicl-button"));
        page.append(submit, NodeSpec::new("span").text("Send Proposal"));
    }

    #[test]
    fn test_option_scan_reports_ambiguity() {
        let page = MemoryPage::new();
        scan_only_modal(&page, &["Public Terms (12)", "Ulanzi Terms (3)"]);
        let config = EngineConfig::default();
        let ctx = WorkflowContext {
            template_term: "Terms".to_string(),
            ..context()
        };

        let err = ModalWorkflow::new(&config, &RejectAmbiguous).run(&page, &ctx).unwrap_err();
        match err {
            ItemError::TermAmbiguous { desired, candidates } => {
                assert_eq!(desired, "Terms");
                assert_eq!(candidates, vec!["Public Terms (12)".to_string(), "Ulanzi Terms (3)".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(page.clicks().is_empty());
    }

    #[test]
    fn test_option_scan_unique_match() {
        let page = MemoryPage::new();
        scan_only_modal(&page, &["Public Terms (12)", "Ulanzi Terms (3)"]);
        let config = EngineConfig::default();

        let report = ModalWorkflow::new(&config, &RejectAmbiguous)
            .target_date(date())
            .run(&page, &context())
            .unwrap();
        assert_eq!(report.term, "Public Terms (12)");
        assert_eq!(clicked_text(&page)[0], "Public Terms (12)");
    }

    #[test]
    fn test_prefer_exact_resolves_ambiguity() {
        let page = MemoryPage::new();
        modal(&page, &["Public Terms (12)", "Public Terms Extended (3)"]);
        let config = EngineConfig::default();

        let report = ModalWorkflow::new(&config, &PreferExact)
            .target_date(date())
            .run(&page, &context())
            .unwrap();
        assert_eq!(report.term, "Public Terms (12)");
    }

    #[test]
    fn test_term_not_found() {
        let page = MemoryPage::new();
        modal(&page, &["Ulanzi Terms (3)"]);
        let config = EngineConfig::default();

        let err = ModalWorkflow::new(&config, &RejectAmbiguous)
            .run(&page, &context())
            .unwrap_err();
        match err {
            ItemError::TermNotFound { desired, available } => {
                assert_eq!(desired, "Public Terms");
                assert_eq!(available, vec!["Ulanzi Terms (3)".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_category_tag() {
        let page = MemoryPage::new();
        let frame = modal(&page, &["Public Terms (12)"]);
        page.append(frame, NodeSpec::new("input").attr("data-testid", "uicl-tag-input-text-input"));
        page.on_type(r#"input[data-testid="uicl-tag-input-text-input"]"#, move |dom, _, typed| {
            let list = dom.append(frame, NodeSpec::new("div").attr("data-testid", "uicl-tag-input-dropdown"));
            let label = if typed == "Home&Garden" { "Home & Garden (27)" } else { "Toys (3)" };
            dom.append(list, NodeSpec::new("li").text(label));
        });
        let config = EngineConfig::default();
        let workflow = ModalWorkflow::new(&config, &RejectAmbiguous).target_date(date());

        let ctx = WorkflowContext {
            category: Some("Home & Garden".to_string()),
            ..context()
        };
        let report = workflow.run(&page, &ctx).unwrap();
        assert_eq!(report.category.as_deref(), Some("Home & Garden"));
        assert!(clicked_text(&page).contains(&"Home & Garden (27)".to_string()));
    }

    #[test]
    fn test_category_mismatch() {
        let page = MemoryPage::new();
        let frame = modal(&page, &["Public Terms (12)"]);
        page.append(frame, NodeSpec::new("input").attr("data-testid", "uicl-tag-input-text-input"));
        page.on_type(r#"input[data-testid="uicl-tag-input-text-input"]"#, move |dom, _, _| {
            let list = dom.append(frame, NodeSpec::new("div").attr("data-testid", "uicl-tag-input-dropdown"));
            dom.append(list, NodeSpec::new("li").text("Toys (3)"));
        });
        let config = EngineConfig::default();

        let ctx = WorkflowContext {
            category: Some("Home & Garden".to_string()),
            ..context()
        };
        let err = ModalWorkflow::new(&config, &RejectAmbiguous).run(&page, &ctx).unwrap_err();
        match err {
            ItemError::CategoryMismatch { typed, suggested } => {
                assert_eq!(typed, "Home&Garden");
                assert_eq!(suggested.as_deref(), Some("Toys (3)"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_date_and_comment_are_soft() {
        let page = MemoryPage::new();
        modal(&page, &["Public Terms (12)"]);
        let config = EngineConfig::default();
        let ctx = WorkflowContext {
            template_text: String::new(),
            ..context()
        };

        let report = ModalWorkflow::new(&config, &RejectAmbiguous)
            .target_date(NaiveDate::from_ymd_opt(2026, 3, 28).unwrap())
            .run(&page, &ctx)
            .unwrap();
        assert!(!report.date_selected);
        assert!(!report.comment_filled);
        assert_eq!(report.notes.len(), 2);
        assert!(report.notes[0].starts_with("select date"));
        assert!(report.notes[1].starts_with("fill comment"));
    }

    #[test]
    fn test_submit_not_found() {
        let page = MemoryPage::new();
        let frame = page.append(page.body(), NodeSpec::new("iframe").attr("data-testid", "uicl-modal-iframe-content"));
        let select = page.append(frame, NodeSpec::new("select").attr("data-testid", "uicl-select"));
        page.append(select, NodeSpec::new("option").text("Public Terms"));
        let config = EngineConfig::default();

        let err = ModalWorkflow::new(&config, &RejectAmbiguous)
            .target_date(date())
            .run(&page, &context())
            .unwrap_err();
        assert!(matches!(err, ItemError::SubmitNotFound));
    }

    #[test]
    fn test_disclaimer_in_parent_page() {
        let page = MemoryPage::new();
        modal(&page, &["Public Terms (12)"]);
        let body = page.body();
        page.on_click(format!("{} button", FRAME), move |dom, clicked| {
            if dom.text_of(clicked) == "Send Proposal" {
                let button = dom.append(body, NodeSpec::new("button").attr("data-testid", "uicl-button"));
                dom.append(button, NodeSpec::new("span").text("I understand"));
            }
        });
        let config = EngineConfig::default();

        let report = ModalWorkflow::new(&config, &RejectAmbiguous)
            .target_date(date())
            .run(&page, &context())
            .unwrap();
        assert!(report.disclaimer_acknowledged);
        assert_eq!(clicked_text(&page).last().unwrap(), "I understand");
    }

    #[test]
    fn test_frame_closed_by_submit() {
        let page = MemoryPage::new();
        let frame = modal(&page, &["Public Terms (12)"]);
        page.on_click(format!("{} button", FRAME), move |dom, clicked| {
            if dom.text_of(clicked) == "Send Proposal" {
                dom.remove(frame);
                let body = dom.body();
                dom.append(body, NodeSpec::new("button").text("I understand"));
            }
        });
        let config = EngineConfig::default();

        let report = ModalWorkflow::new(&config, &RejectAmbiguous)
            .target_date(date())
            .run(&page, &context())
            .unwrap();
        assert!(report.disclaimer_acknowledged);
        assert!(report.notes.is_empty());
    }

    #[test]
    fn test_disconnect_is_transient() {
        let page = MemoryPage::new();
        modal(&page, &["Public Terms (12)"]);
        page.fail_queries(1);
        let config = EngineConfig::default();

        let err = ModalWorkflow::new(&config, &RejectAmbiguous)
            .run(&page, &context())
            .unwrap_err();
        assert!(err.is_transient());
    }
}
