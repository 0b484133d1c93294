use crate::dom::locator::{ElementHandle, Locator, Scope};
use crate::dom::page::Page;
use crate::error::Result;

/// Walks a fallback chain of locators and returns the first hit.
///
/// A strategy that finds nothing, or fails with a non-transient error (a bad
/// selector, an element that detached mid-query), just hands over to the next
/// one. Transient errors are returned so the engine can count them.
pub struct SelectorResolver<'p, P: Page + ?Sized> {
    page: &'p P,
}

impl<'p, P: Page + ?Sized> SelectorResolver<'p, P> {
    pub fn new(page: &'p P) -> Self {
        Self { page }
    }

    /// First element matched by the first successful strategy
    pub fn resolve(&self, scope: &Scope, chain: &[Locator]) -> Result<Option<ElementHandle>> {
        for locator in chain {
            if let Some(found) = self.try_strategy(scope, locator)?.into_iter().next() {
                log::debug!("resolved {} -> {:?}", locator, found);
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// All elements matched by the first strategy that matches anything
    pub fn resolve_all(&self, scope: &Scope, chain: &[Locator]) -> Result<Vec<ElementHandle>> {
        for locator in chain {
            let found = self.try_strategy(scope, locator)?;
            if !found.is_empty() {
                return Ok(found);
            }
        }
        Ok(Vec::new())
    }

    fn try_strategy(&self, scope: &Scope, locator: &Locator) -> Result<Vec<ElementHandle>> {
        let found = match self.page.locate_all(scope, locator.kind, &locator.value, locator.timeout()) {
            Ok(found) => found,
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => {
                log::debug!("strategy {} failed, trying next: {}", locator, e);
                return Ok(Vec::new());
            }
        };

        let Some(needle) = &locator.text else {
            return Ok(found);
        };

        let mut matching = Vec::new();
        for element in found {
            match self.page.text(&element) {
                Ok(text) if text.contains(needle.as_str()) => matching.push(element),
                Ok(_) => {}
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => log::debug!("skipping {:?} while filtering {}: {}", element, locator, e),
            }
        }
        if matching.is_empty() {
            log::debug!("no match for {}", locator);
        }
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::{MemoryPage, NodeSpec};
    use crate::error::BrowserError;

    fn page_with_buttons() -> MemoryPage {
        let page = MemoryPage::new();
        let body = page.body();
        page.append(body, NodeSpec::new("button").attr("data-testid", "uicl-button").text("Cancel"));
        page.append(body, NodeSpec::new("button").attr("data-testid", "uicl-button").text("Send Proposal"));
        page
    }

    #[test]
    fn test_resolve_first_strategy_wins() {
        let page = page_with_buttons();
        let resolver = SelectorResolver::new(&page);

        let chain = vec![
            Locator::css("button[data-testid=\"uicl-button\"]").timeout_ms(0),
            Locator::text("Send Proposal").timeout_ms(0),
        ];
        let found = resolver.resolve(&Scope::Page, &chain).unwrap().unwrap();
        assert_eq!(page.text(&found).unwrap(), "Cancel");
    }

    #[test]
    fn test_resolve_text_filter_and_fallback() {
        let page = page_with_buttons();
        let resolver = SelectorResolver::new(&page);

        let chain = vec![
            Locator::css("a.missing").timeout_ms(0),
            Locator::css("button").timeout_ms(0).containing("Send Proposal"),
        ];
        let found = resolver.resolve(&Scope::Page, &chain).unwrap().unwrap();
        assert_eq!(page.text(&found).unwrap(), "Send Proposal");
    }

    #[test]
    fn test_resolve_absent_is_not_an_error() {
        let page = page_with_buttons();
        let resolver = SelectorResolver::new(&page);

        let chain = vec![Locator::css("select").timeout_ms(500), Locator::text("I understand").timeout_ms(500)];
        assert_eq!(resolver.resolve(&Scope::Page, &chain).unwrap(), None);
        // Both strategies polled through their full timeout in page time.
        assert_eq!(page.paused().as_millis(), 1000);
    }

    #[test]
    fn test_resolve_propagates_disconnect() {
        let page = page_with_buttons();
        page.disconnect();
        let resolver = SelectorResolver::new(&page);

        let err = resolver.resolve(&Scope::Page, &[Locator::css("button").timeout_ms(0)]).unwrap_err();
        assert!(matches!(err, BrowserError::Disconnected(_)));
    }

    #[test]
    fn test_resolve_all_uses_first_non_empty_strategy() {
        let page = page_with_buttons();
        let resolver = SelectorResolver::new(&page);

        let chain = vec![Locator::css("li[role=\"option\"]").timeout_ms(0), Locator::css("button").timeout_ms(0)];
        assert_eq!(resolver.resolve_all(&Scope::Page, &chain).unwrap().len(), 2);
    }
}
