use crate::dom::locator::ElementHandle;
use crate::dom::page::Page;
use crate::error::Result;
use serde::{Deserialize, Serialize};

const SET_ATTRIBUTE_JS: &str = "function(name, value) { this.setAttribute(name, value); }";

/// Progress of a target control, persisted on its DOM node.
///
/// Ordered: a marker only ever moves forward. `Skipped` and `Clicked` are
/// both terminal; a scanner never hands either out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Marker {
    Unmarked,
    Counted,
    /// Given up on without a click
    Skipped,
    Clicked,
}

/// Attribute names the markers are written under
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MarkerAttributes {
    pub counted: String,
    pub skipped: String,
    pub clicked: String,
}

impl Default for MarkerAttributes {
    fn default() -> Self {
        Self {
            counted: "data-impact-rpa-counted".to_string(),
            skipped: "data-impact-rpa-skipped".to_string(),
            clicked: "data-impact-rpa-clicked".to_string(),
        }
    }
}

impl MarkerAttributes {
    /// Read the marker stored on `element`
    pub fn read<P: Page + ?Sized>(&self, page: &P, element: &ElementHandle) -> Result<Marker> {
        if page.attribute(element, &self.clicked)?.as_deref() == Some("true") {
            return Ok(Marker::Clicked);
        }
        if page.attribute(element, &self.skipped)?.as_deref() == Some("true") {
            return Ok(Marker::Skipped);
        }
        if page.attribute(element, &self.counted)?.as_deref() == Some("true") {
            return Ok(Marker::Counted);
        }
        Ok(Marker::Unmarked)
    }

    /// Move `element` forward to `target`.
    ///
    /// Returns `Ok(true)` when the marker now reads `target` or later. A
    /// marker already past `target` is left alone. `Ok(false)` means neither
    /// the DOM write nor the script fallback took.
    pub fn advance<P: Page + ?Sized>(&self, page: &P, element: &ElementHandle, target: Marker) -> Result<bool> {
        if self.read(page, element)? >= target {
            return Ok(true);
        }
        let name = match target {
            Marker::Unmarked => return Ok(true),
            Marker::Counted => &self.counted,
            Marker::Skipped => &self.skipped,
            Marker::Clicked => &self.clicked,
        };
        write_flag(page, element, name)
    }
}

fn write_flag<P: Page + ?Sized>(page: &P, element: &ElementHandle, name: &str) -> Result<bool> {
    match page.set_attribute(element, name, "true") {
        Ok(()) => return Ok(true),
        Err(e) if e.is_transient() => return Err(e),
        Err(e) => log::debug!("direct write of {} failed, using script: {}", name, e),
    }

    let args = [serde_json::json!(name), serde_json::json!("true")];
    match page.run_script(element, SET_ATTRIBUTE_JS, &args) {
        Ok(_) => Ok(true),
        Err(e) if e.is_transient() => Err(e),
        Err(e) => {
            log::debug!("script write of {} failed: {}", name, e);
            Ok(false)
        }
    }
}
