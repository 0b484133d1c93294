use crate::dom::{ElementHandle, Locator, Marker, MarkerAttributes, Page, Scope};
use crate::error::{BrowserError, Result};

/// Outcome of one scan pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    /// Controls not yet clicked, in document order
    pub eligible: Vec<ElementHandle>,
    /// Controls marked as counted by this pass
    pub newly_marked: usize,
}

/// Finds target controls and marks new ones as counted.
///
/// All per-control state lives in the DOM markers, so scanning the same
/// viewport twice marks nothing the second time.
#[derive(Debug, Clone)]
pub struct ButtonScanner {
    control: Locator,
    text_filter: String,
    markers: MarkerAttributes,
    total_detected: usize,
}

impl ButtonScanner {
    pub fn new(control: Locator, text_filter: impl Into<String>, markers: MarkerAttributes) -> Self {
        Self {
            control,
            text_filter: text_filter.into(),
            markers,
            total_detected: 0,
        }
    }

    /// Controls marked as counted across every scan of this scanner
    pub fn total_detected(&self) -> usize {
        self.total_detected
    }

    pub fn markers(&self) -> &MarkerAttributes {
        &self.markers
    }

    pub fn scan<P: Page + ?Sized>(&mut self, page: &P, scope: &Scope) -> Result<ScanResult> {
        let candidates = page.locate_all(scope, self.control.kind, &self.control.value, self.control.timeout())?;

        let mut result = ScanResult::default();
        for element in candidates {
            match self.inspect(page, &element) {
                Ok(Some(newly_marked)) => {
                    if newly_marked {
                        result.newly_marked += 1;
                        self.total_detected += 1;
                    }
                    result.eligible.push(element);
                }
                Ok(None) => {}
                Err(BrowserError::StaleElement(reason)) => {
                    log::debug!("control {:?} detached during scan: {}", element, reason);
                }
                Err(e) => return Err(e),
            }
        }

        if result.newly_marked > 0 {
            log::debug!(
                "detected {} new controls ({} total)",
                result.newly_marked,
                self.total_detected
            );
        }
        Ok(result)
    }

    /// `Some(newly_marked)` for an eligible control, `None` to skip it
    fn inspect<P: Page + ?Sized>(&self, page: &P, element: &ElementHandle) -> Result<Option<bool>> {
        if !page.text(element)?.contains(self.text_filter.as_str()) {
            return Ok(None);
        }
        match self.markers.read(page, element)? {
            Marker::Clicked | Marker::Skipped => Ok(None),
            Marker::Counted => Ok(Some(false)),
            Marker::Unmarked => Ok(Some(self.markers.advance(page, element, Marker::Counted)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::{Event, MemoryPage, NodeSpec};

    fn scanner() -> ButtonScanner {
        ButtonScanner::new(
            Locator::css(r#"button[data-testid="uicl-button"]"#).timeout_ms(0),
            "Send Proposal",
            MarkerAttributes::default(),
        )
    }

    fn add_button(page: &MemoryPage, text: &str) -> ElementHandle {
        let row = page.append(page.body(), NodeSpec::new("div").class("row"));
        page.append(row, NodeSpec::new("button").attr("data-testid", "uicl-button").text(text))
    }

    #[test]
    fn test_scan_filters_by_text() {
        let page = MemoryPage::new();
        let a = add_button(&page, "Send Proposal");
        add_button(&page, "View Profile");
        let b = add_button(&page, "Send Proposal");

        let mut scanner = scanner();
        let result = scanner.scan(&page, &Scope::Page).unwrap();
        assert_eq!(result.eligible, vec![a, b]);
        assert_eq!(result.newly_marked, 2);
        assert_eq!(scanner.total_detected(), 2);
    }

    #[test]
    fn test_scan_is_idempotent() {
        let page = MemoryPage::new();
        add_button(&page, "Send Proposal");
        add_button(&page, "Send Proposal");

        let mut scanner = scanner();
        let first = scanner.scan(&page, &Scope::Page).unwrap();
        let second = scanner.scan(&page, &Scope::Page).unwrap();

        assert_eq!(first.newly_marked, 2);
        assert_eq!(second.newly_marked, 0);
        assert_eq!(second.eligible, first.eligible);
        assert_eq!(scanner.total_detected(), 2);
    }

    #[test]
    fn test_scan_skips_clicked() {
        let page = MemoryPage::new();
        let a = add_button(&page, "Send Proposal");
        let b = add_button(&page, "Send Proposal");
        let mut scanner = scanner();
        scanner.scan(&page, &Scope::Page).unwrap();

        MarkerAttributes::default().advance(&page, &a, Marker::Clicked).unwrap();
        let result = scanner.scan(&page, &Scope::Page).unwrap();
        assert_eq!(result.eligible, vec![b]);
    }

    #[test]
    fn test_scan_skips_given_up() {
        let page = MemoryPage::new();
        let a = add_button(&page, "Send Proposal");
        let b = add_button(&page, "Send Proposal");
        let mut scanner = scanner();
        scanner.scan(&page, &Scope::Page).unwrap();

        MarkerAttributes::default().advance(&page, &a, Marker::Skipped).unwrap();
        let result = scanner.scan(&page, &Scope::Page).unwrap();
        assert_eq!(result.eligible, vec![b]);
        assert_eq!(result.newly_marked, 0);
    }

    #[test]
    fn test_markers_only_move_forward() {
        let page = MemoryPage::new();
        let a = add_button(&page, "Send Proposal");
        let mut scanner = scanner();
        scanner.scan(&page, &Scope::Page).unwrap();
        MarkerAttributes::default().advance(&page, &a, Marker::Clicked).unwrap();
        scanner.scan(&page, &Scope::Page).unwrap();
        scanner.scan(&page, &Scope::Page).unwrap();

        let writes: Vec<String> = page
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::SetAttribute { element, name, .. } if element == a => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec!["data-impact-rpa-counted", "data-impact-rpa-clicked"]);
    }

    #[test]
    fn test_scan_propagates_disconnect() {
        let page = MemoryPage::new();
        add_button(&page, "Send Proposal");
        page.fail_queries(1);

        let err = scanner().scan(&page, &Scope::Page).unwrap_err();
        assert!(err.is_transient());
    }
}
