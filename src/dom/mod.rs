//! Page access layer
//!
//! This module defines what the engine is allowed to do to a page and the
//! pieces built directly on top of that:
//! - Page: the element capability interface every adapter implements
//! - Locator / Scope / ElementHandle: how elements are addressed
//! - SelectorResolver: ordered fallback chains over locators
//! - Marker: progress state persisted on DOM nodes
//! - memory: a scripted in-memory page for tests (`testing` feature)

pub mod locator;
pub mod marker;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod page;
pub mod resolver;

pub use locator::{ElementHandle, Locator, LocatorKind, Scope};
pub use marker::{Marker, MarkerAttributes};
pub use page::{POLL_INTERVAL, Page};
pub use resolver::SelectorResolver;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_export() {
        let loc = Locator::text("I understand");
        assert_eq!(loc.kind, LocatorKind::Text);
    }

    #[test]
    fn test_marker_export() {
        assert!(Marker::Unmarked < Marker::Counted);
        assert!(Marker::Counted < Marker::Skipped);
        assert!(Marker::Skipped < Marker::Clicked);
    }

    #[test]
    fn test_scope_from_handle() {
        let handle = ElementHandle(7);
        assert_eq!(Scope::from(handle), Scope::Element(ElementHandle(7)));
    }
}
