use crate::dom::locator::{ElementHandle, LocatorKind, Scope};
use crate::error::Result;
use std::time::Duration;

/// Interval between polls in [`Page::locate`] and [`Page::locate_all`]
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Capabilities the engine needs from a live page.
///
/// Every engine component depends on this trait only. `ChromePage` is the
/// adapter over a DevTools tab; `MemoryPage` is the scripted stand-in used by
/// the tests.
///
/// A locate that finds nothing is `Ok(None)` / `Ok(vec![])`, never an error.
/// Errors are reserved for failures of the page or the connection.
pub trait Page {
    /// Run one query against `scope` without waiting
    fn query(&self, scope: &Scope, kind: LocatorKind, value: &str) -> Result<Vec<ElementHandle>>;

    /// Click an element, natively or through `element.click()` in the page
    fn click(&self, element: &ElementHandle, via_script: bool) -> Result<()>;

    fn hover(&self, element: &ElementHandle) -> Result<()>;

    fn scroll_into_view(&self, element: &ElementHandle) -> Result<()>;

    /// Scroll the page vertically by `pixels`
    fn scroll_page(&self, pixels: i64) -> Result<()>;

    /// Visible text of an element
    fn text(&self, element: &ElementHandle) -> Result<String>;

    /// Lowercase tag name
    fn tag_name(&self, element: &ElementHandle) -> Result<String>;

    fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>>;

    /// Write an attribute through the DOM domain
    fn set_attribute(&self, element: &ElementHandle, name: &str, value: &str) -> Result<()>;

    /// Call `function_declaration` with `this` bound to the element
    fn run_script(
        &self,
        element: &ElementHandle,
        function_declaration: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value>;

    fn type_text(&self, element: &ElementHandle, text: &str) -> Result<()>;

    fn clear(&self, element: &ElementHandle) -> Result<()>;

    /// Select the option of a native `<select>` whose label equals `label`.
    /// Returns `false` when no such option exists.
    fn select_by_label(&self, element: &ElementHandle, label: &str) -> Result<bool>;

    /// Parent element, `None` at the document root
    fn parent(&self, element: &ElementHandle) -> Result<Option<ElementHandle>>;

    fn wait_document_loaded(&self, timeout: Duration) -> Result<()>;

    /// Current page URL, if it can be read
    fn url(&self) -> Option<String>;

    /// PNG screenshot of the viewport
    fn screenshot(&self) -> Result<Vec<u8>>;

    /// Wait in page time. Every engine sleep goes through here.
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// Poll until at least one element matches or `timeout` elapses
    fn locate(&self, scope: &Scope, kind: LocatorKind, value: &str, timeout: Duration) -> Result<Option<ElementHandle>> {
        Ok(self.locate_all(scope, kind, value, timeout)?.into_iter().next())
    }

    /// Poll until the match set is non-empty or `timeout` elapses
    fn locate_all(&self, scope: &Scope, kind: LocatorKind, value: &str, timeout: Duration) -> Result<Vec<ElementHandle>> {
        let mut waited = Duration::ZERO;
        loop {
            let found = self.query(scope, kind, value)?;
            if !found.is_empty() || waited >= timeout {
                return Ok(found);
            }
            let step = POLL_INTERVAL.min(timeout - waited);
            self.pause(step);
            waited += step;
        }
    }
}
