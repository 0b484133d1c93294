use crate::dom::{ElementHandle, LocatorKind, POLL_INTERVAL, Page, Scope};
use crate::error::{BrowserError, Result};
use headless_chrome::protocol::cdp::{DOM, Page as Cdp, Runtime};
use headless_chrome::{Element, Tab};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Evaluates a locator below `this`. Called with `index < 0` it returns the
/// match count, otherwise the match at `index` (or null).
const QUERY_JS: &str = r#"
function(kind, value, index) {
    let root = this;
    if (this.tagName === 'IFRAME') {
        root = this.contentDocument;
        if (!root) { return index < 0 ? 0 : null; }
    }
    let found = [];
    if (kind === 'css') {
        found = Array.from(root.querySelectorAll(value));
    } else if (kind === 'xpath') {
        const doc = root.ownerDocument || root;
        const snap = doc.evaluate(value, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
        for (let i = 0; i < snap.snapshotLength; i++) { found.push(snap.snapshotItem(i)); }
    } else {
        const exact = kind === 'exact_text';
        const hit = (el) => {
            const text = el.innerText || el.textContent || '';
            return exact ? text.trim() === value : text.includes(value);
        };
        found = Array.from(root.querySelectorAll('*'))
            .filter((el) => hit(el) && !Array.from(el.children).some(hit));
    }
    return index < 0 ? found.length : (found[index] || null);
}
"#;

const CLEAR_JS: &str = r#"
function() {
    const proto = Object.getPrototypeOf(this);
    const setter = Object.getOwnPropertyDescriptor(proto, 'value');
    if (setter && setter.set) { setter.set.call(this, ''); } else { this.value = ''; }
    this.dispatchEvent(new Event('input', { bubbles: true }));
}
"#;

const SELECT_JS: &str = r#"
function(label) {
    const options = Array.from(this.options || []);
    const index = options.findIndex((o) => (o.label || o.text).trim() === label);
    if (index < 0) { return false; }
    this.selectedIndex = index;
    this.dispatchEvent(new Event('input', { bubbles: true }));
    this.dispatchEvent(new Event('change', { bubbles: true }));
    return true;
}
"#;

/// [`Page`] over a DevTools tab.
///
/// Element handles are DOM node ids. Each operation resolves the node afresh,
/// so a handle to a detached node fails with a stale-element error.
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    pub fn new(tab: Arc<Tab>) -> Result<Self> {
        // Node ids only resolve once the DOM domain holds the document
        tab.get_document()
            .map_err(|e| BrowserError::classify("get document", e.to_string(), BrowserError::TabOperationFailed))?;
        Ok(Self { tab })
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    fn element(&self, handle: &ElementHandle) -> Result<Element<'_>> {
        let node_id = DOM::NodeId::try_from(handle.0)
            .map_err(|_| BrowserError::StaleElement(format!("no node with given id {}", handle.0)))?;
        Element::new(&self.tab, node_id)
            .map_err(|e| BrowserError::classify("resolve node", e.to_string(), BrowserError::StaleElement))
    }

    /// Node handle for a JS object reference, `None` for null
    fn adopt(&self, object: Runtime::RemoteObject) -> Result<Option<ElementHandle>> {
        let Some(object_id) = object.object_id else {
            return Ok(None);
        };
        let node = self
            .tab
            .call_method(DOM::RequestNode { object_id })
            .map_err(|e| BrowserError::classify("request node", e.to_string(), BrowserError::EvaluationFailed))?;
        Ok(Some(ElementHandle(node.node_id as u64)))
    }

    fn call(&self, handle: &ElementHandle, operation: &str, function: &str, args: Vec<Value>) -> Result<Runtime::RemoteObject> {
        self.element(handle)?
            .call_js_fn(function, args, false)
            .map_err(|e| BrowserError::classify(operation, e.to_string(), BrowserError::EvaluationFailed))
    }

    fn evaluate(&self, operation: &str, expression: &str) -> Result<Runtime::RemoteObject> {
        self.tab
            .evaluate(expression, false)
            .map_err(|e| BrowserError::classify(operation, e.to_string(), BrowserError::EvaluationFailed))
    }

    fn document_root(&self) -> Result<ElementHandle> {
        let root = self.evaluate("find document", "document.documentElement")?;
        self.adopt(root)?
            .ok_or_else(|| BrowserError::TabOperationFailed("page has no document element".to_string()))
    }
}

impl Page for ChromePage {
    fn query(&self, scope: &Scope, kind: LocatorKind, value: &str) -> Result<Vec<ElementHandle>> {
        let root = match scope {
            Scope::Page => self.document_root()?,
            Scope::Element(handle) => *handle,
        };
        let args = |index: i64| vec![json!(kind.as_str()), json!(value), json!(index)];

        let count = self
            .call(&root, "query", QUERY_JS, args(-1))?
            .value
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let mut found = Vec::new();
        for index in 0..count as i64 {
            if let Some(handle) = self.adopt(self.call(&root, "query", QUERY_JS, args(index))?)? {
                found.push(handle);
            }
        }
        Ok(found)
    }

    fn click(&self, element: &ElementHandle, via_script: bool) -> Result<()> {
        if via_script {
            self.call(element, "click", "function() { this.click(); }", vec![])?;
            return Ok(());
        }
        self.element(element)?
            .click()
            .map_err(|e| BrowserError::classify("click", e.to_string(), BrowserError::NotInteractable))?;
        Ok(())
    }

    fn hover(&self, element: &ElementHandle) -> Result<()> {
        self.element(element)?
            .move_mouse_over()
            .map_err(|e| BrowserError::classify("hover", e.to_string(), BrowserError::NotInteractable))?;
        Ok(())
    }

    fn scroll_into_view(&self, element: &ElementHandle) -> Result<()> {
        self.call(
            element,
            "scroll into view",
            "function() { this.scrollIntoView({ block: 'center', inline: 'nearest' }); }",
            vec![],
        )?;
        Ok(())
    }

    fn scroll_page(&self, pixels: i64) -> Result<()> {
        self.evaluate("scroll page", &format!("window.scrollBy(0, {})", pixels))?;
        Ok(())
    }

    fn text(&self, element: &ElementHandle) -> Result<String> {
        let text = self.call(
            element,
            "read text",
            "function() { return this.innerText || this.textContent || ''; }",
            vec![],
        )?;
        Ok(text.value.and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default())
    }

    fn tag_name(&self, element: &ElementHandle) -> Result<String> {
        let tag = self.call(
            element,
            "read tag",
            "function() { return (this.tagName || '').toLowerCase(); }",
            vec![],
        )?;
        Ok(tag.value.and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default())
    }

    fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let value = self.call(
            element,
            "read attribute",
            "function(name) { return this.getAttribute(name); }",
            vec![json!(name)],
        )?;
        Ok(value.value.and_then(|v| v.as_str().map(str::to_string)))
    }

    fn set_attribute(&self, element: &ElementHandle, name: &str, value: &str) -> Result<()> {
        let node_id = DOM::NodeId::try_from(element.0)
            .map_err(|_| BrowserError::StaleElement(format!("no node with given id {}", element.0)))?;
        self.tab
            .call_method(DOM::SetAttributeValue {
                node_id,
                name: name.to_string(),
                value: value.to_string(),
            })
            .map_err(|e| BrowserError::classify("set attribute", e.to_string(), BrowserError::EvaluationFailed))?;
        Ok(())
    }

    fn run_script(&self, element: &ElementHandle, function_declaration: &str, args: &[Value]) -> Result<Value> {
        let result = self.call(element, "run script", function_declaration, args.to_vec())?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn type_text(&self, element: &ElementHandle, text: &str) -> Result<()> {
        self.call(element, "focus", "function() { this.focus(); }", vec![])?;
        self.tab
            .type_str(text)
            .map_err(|e| BrowserError::classify("type text", e.to_string(), BrowserError::TabOperationFailed))?;
        Ok(())
    }

    fn clear(&self, element: &ElementHandle) -> Result<()> {
        self.call(element, "clear", CLEAR_JS, vec![])?;
        Ok(())
    }

    fn select_by_label(&self, element: &ElementHandle, label: &str) -> Result<bool> {
        let selected = self.call(element, "select option", SELECT_JS, vec![json!(label)])?;
        Ok(selected.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn parent(&self, element: &ElementHandle) -> Result<Option<ElementHandle>> {
        let parent = self.call(element, "find parent", "function() { return this.parentElement; }", vec![])?;
        self.adopt(parent)
    }

    fn wait_document_loaded(&self, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            let state = self.evaluate("read ready state", "document.readyState")?;
            if state.value.as_ref().and_then(|v| v.as_str()) == Some("complete") {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(BrowserError::Timeout(format!("document not loaded after {:?}", timeout)));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn url(&self) -> Option<String> {
        Some(self.tab.get_url())
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(Cdp::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| BrowserError::classify("screenshot", e.to_string(), BrowserError::TabOperationFailed))
    }
}
