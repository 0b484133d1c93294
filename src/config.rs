//! Engine configuration
//!
//! Everything the engine reads but never writes: run bounds, pacing, the
//! template term and comment text, and the site's selector catalog. All of it
//! deserializes from a JSON settings file where every key is optional.

use crate::dom::{Locator, MarkerAttributes};
use crate::error::{BrowserError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Locators for every control the engine touches, as data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectorCatalog {
    /// Target controls in the scrolling list
    pub control: Locator,
    pub marker: MarkerAttributes,

    /// "Selected category" indicator searched for in each ancestor of a control
    pub category_indicator: Locator,
    /// Used when no ancestor holds the indicator
    pub category_page_fallback: Vec<Locator>,

    /// Frame hosting the modal form
    pub modal_surface: Locator,

    pub term_select: Vec<Locator>,
    pub term_section: Vec<Locator>,
    /// Dropdown triggers tried in each ancestor of the term section
    pub term_triggers: Vec<Locator>,
    /// Dropdown triggers tried against the whole surface
    pub term_trigger_fallbacks: Vec<Locator>,
    pub term_dropdown: Locator,
    pub term_options: Vec<Locator>,
    /// Surface-wide option scan, the last resort
    pub term_option_scan: Locator,

    pub tag_input: Vec<Locator>,
    pub tag_dropdown: Vec<Locator>,
    pub tag_options: Vec<Locator>,

    pub date_trigger: Vec<Locator>,
    pub date_cells: Vec<Locator>,

    pub comment_field: Vec<Locator>,
    pub submit: Vec<Locator>,
    pub disclaimer: Vec<Locator>,
}

impl Default for SelectorCatalog {
    fn default() -> Self {
        Self {
            control: Locator::css(r#"button[data-testid="uicl-button"]"#).timeout_ms(3000),
            marker: MarkerAttributes::default(),
            category_indicator: Locator::css(".selected-tab").timeout_ms(100),
            category_page_fallback: vec![Locator::css(".selected-tab").timeout_ms(500)],
            modal_surface: Locator::css(r#"iframe[data-testid="uicl-modal-iframe-content"]"#).timeout_ms(500),
            term_select: vec![Locator::css(r#"select[data-testid="uicl-select"]"#)],
            term_section: vec![Locator::text("Template Term")],
            term_triggers: vec![
                Locator::css(r#"button[data-testid="uicl-multi-select-input-button"]"#).timeout_ms(200),
                Locator::css(
                    r#"button.iui-multi-select-input-button, button[aria-haspopup="listbox"], button[role="button"]"#,
                )
                .timeout_ms(200),
                Locator::css(r#"button, [class*="select"], [class*="dropdown"]"#).timeout_ms(200),
            ],
            term_trigger_fallbacks: vec![
                Locator::css(r#"button[data-testid="uicl-multi-select-input-button"]"#).timeout_ms(500),
                Locator::css(".iui-multi-select-input-button").timeout_ms(500),
                Locator::css("span.please-select").timeout_ms(500),
            ],
            term_dropdown: Locator::css(r#"div[data-testid="uicl-dropdown"]"#),
            term_options: vec![
                Locator::css(r#"li[role="option"]"#).timeout_ms(0),
                Locator::css("div.text-ellipsis").timeout_ms(0),
            ],
            term_option_scan: Locator::css("div.text-ellipsis").timeout_ms(0),
            tag_input: vec![Locator::css(r#"input[data-testid="uicl-tag-input-text-input"]"#).timeout_ms(3000)],
            tag_dropdown: vec![Locator::css(r#"[data-testid="uicl-tag-input-dropdown"]"#).timeout_ms(3000)],
            tag_options: vec![Locator::css("div._4-15-1_Baf2T"), Locator::css("li").timeout_ms(0)],
            date_trigger: vec![Locator::css(r#"button[data-testid="uicl-date-input"]"#).timeout_ms(3000)],
            date_cells: vec![Locator::css(r#"td, .day, [class*="day"], [class*="date"]"#).timeout_ms(0)],
            comment_field: vec![
                Locator::css(r#"textarea[data-testid="uicl-textarea"]"#).timeout_ms(3000),
                Locator::css(r#"textarea[name="comment"]"#),
            ],
            submit: vec![
                Locator::css(r#"button[data-testid="uicl-button"]"#)
                    .timeout_ms(3000)
                    .containing("Send Proposal"),
                Locator::exact_text("Send Proposal"),
                Locator::css("button").timeout_ms(0).containing("Send Proposal"),
            ],
            disclaimer: vec![
                Locator::text("I understand").timeout_ms(3000),
                Locator::css(r#"button[data-testid="uicl-button"]"#)
                    .timeout_ms(0)
                    .containing("I understand"),
            ],
        }
    }
}

/// Settings for one engine run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Stop after this many controls were clicked
    pub max_count: usize,
    /// Stop after this many scrolls
    pub max_scrolls: usize,
    /// Back-to-back transient failures before reconnecting
    pub max_consecutive_errors: usize,

    pub scroll_pixels: i64,
    pub scroll_delay_secs: f64,
    /// Settle time after a successful click
    pub click_delay_secs: f64,
    pub modal_wait_secs: f64,
    pub modal_poll_interval_secs: f64,

    /// Label of the template term option to pick in the modal
    pub template_term: String,
    /// Comment inserted into the modal's free-text field
    pub template_text: String,
    /// Visible text identifying target controls
    pub control_text: String,

    pub max_parent_ascents: usize,
    pub max_category_depth: usize,

    pub reconnect_attempts: usize,
    pub reconnect_delay_secs: f64,

    pub screenshot_on_error: bool,
    pub screenshot_dir: PathBuf,

    pub catalog: SelectorCatalog,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_count: 10,
            max_scrolls: 100,
            max_consecutive_errors: 3,
            scroll_pixels: 500,
            scroll_delay_secs: 1.0,
            click_delay_secs: 0.5,
            modal_wait_secs: 20.0,
            modal_poll_interval_secs: 0.2,
            template_term: "Commission Tier Terms".to_string(),
            template_text: String::new(),
            control_text: "Send Proposal".to_string(),
            max_parent_ascents: 10,
            max_category_depth: 20,
            reconnect_attempts: 3,
            reconnect_delay_secs: 1.0,
            screenshot_on_error: true,
            screenshot_dir: PathBuf::from("logs/screenshots"),
            catalog: SelectorCatalog::default(),
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings JSON; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
            .map_err(|e| BrowserError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("scroll_delay_secs", self.scroll_delay_secs),
            ("click_delay_secs", self.click_delay_secs),
            ("modal_wait_secs", self.modal_wait_secs),
            ("modal_poll_interval_secs", self.modal_poll_interval_secs),
            ("reconnect_delay_secs", self.reconnect_delay_secs),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(BrowserError::InvalidConfig(format!("{} must be a non-negative number, got {}", name, value)));
            }
        }
        if self.modal_poll_interval_secs == 0.0 {
            return Err(BrowserError::InvalidConfig("modal_poll_interval_secs must be positive".to_string()));
        }
        if self.template_term.trim().is_empty() {
            return Err(BrowserError::InvalidConfig("template_term must not be empty".to_string()));
        }
        if self.control_text.is_empty() {
            return Err(BrowserError::InvalidConfig("control_text must not be empty".to_string()));
        }
        Ok(())
    }

    /// Builder method: set the target count
    pub fn max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }

    /// Builder method: set the scroll budget
    pub fn max_scrolls(mut self, max_scrolls: usize) -> Self {
        self.max_scrolls = max_scrolls;
        self
    }

    /// Builder method: set the template term label
    pub fn template_term(mut self, term: impl Into<String>) -> Self {
        self.template_term = term.into();
        self
    }

    /// Builder method: set the comment text
    pub fn template_text(mut self, text: impl Into<String>) -> Self {
        self.template_text = text.into();
        self
    }

    /// Builder method: set every pacing delay to zero
    pub fn without_delays(mut self) -> Self {
        self.scroll_delay_secs = 0.0;
        self.click_delay_secs = 0.0;
        self.reconnect_delay_secs = 0.0;
        self
    }

    pub fn scroll_delay(&self) -> Duration {
        secs(self.scroll_delay_secs)
    }

    pub fn click_delay(&self) -> Duration {
        secs(self.click_delay_secs)
    }

    pub fn modal_wait(&self) -> Duration {
        secs(self.modal_wait_secs)
    }

    pub fn modal_poll_interval(&self) -> Duration {
        secs(self.modal_poll_interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        secs(self.reconnect_delay_secs)
    }
}

/// One saved comment template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
}

/// Saved templates and which one is active
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplateBook {
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub active_template_id: Option<u64>,
}

impl TemplateBook {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// A book holding a single template, active
    pub fn from_plain_text(content: impl Into<String>) -> Self {
        Self {
            templates: vec![Template {
                id: 1,
                name: "default".to_string(),
                content: content.into(),
            }],
            active_template_id: Some(1),
        }
    }

    /// The active template, or the first one when the active id is unknown
    pub fn active(&self) -> Option<&Template> {
        self.active_template_id
            .and_then(|id| self.templates.iter().find(|t| t.id == id))
            .or_else(|| self.templates.first())
    }

    pub fn active_content(&self) -> &str {
        self.active().map(|t| t.content.as_str()).unwrap_or("")
    }
}
