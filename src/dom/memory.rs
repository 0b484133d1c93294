//! Scripted in-memory page
//!
//! `MemoryPage` implements [`Page`] over a small node tree so the engine can be
//! exercised without a browser. It understands the CSS subset the selector
//! catalog uses (tag, `#id`, `.class`, `[attr]`, `[attr="v"]`, `[attr*="v"]`,
//! descendant combinators and comma lists) plus text locators. XPath is not
//! supported and reports an evaluation error.
//!
//! Page behavior is scripted with hooks: clicking or typing into an element
//! matching a selector, or scrolling the page, runs a closure against the
//! [`Dom`]. `pause` advances a virtual clock instead of sleeping.

use crate::dom::locator::{ElementHandle, LocatorKind, Scope};
use crate::dom::page::Page;
use crate::engine::session::SessionProvider;
use crate::error::{BrowserError, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type ClickHook = Box<dyn FnMut(&mut Dom, ElementHandle) + Send>;
type TypeHook = Box<dyn FnMut(&mut Dom, ElementHandle, &str) + Send>;
type ScrollHook = Box<dyn FnMut(&mut Dom, i64) + Send>;

const DOCUMENT: usize = 0;
const BODY: usize = 1;

/// Description of a node to insert
#[derive(Debug, Clone)]
pub struct NodeSpec {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    interactable: bool,
}

impl NodeSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            attrs: Vec::new(),
            text: String::new(),
            interactable: true,
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn class(self, class: impl Into<String>) -> Self {
        self.attr("class", class)
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Clicks on this node fail as if it had no layout box
    pub fn not_interactable(mut self) -> Self {
        self.interactable = false;
        self
    }
}

#[derive(Debug)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    parent: Option<usize>,
    children: Vec<usize>,
    interactable: bool,
    attached: bool,
}

impl Node {
    fn new(tag: &str, parent: Option<usize>) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            text: String::new(),
            parent,
            children: Vec::new(),
            interactable: true,
            attached: true,
        }
    }
}

/// The node tree behind a [`MemoryPage`]
#[derive(Debug)]
pub struct Dom {
    nodes: Vec<Node>,
}

impl Default for Dom {
    fn default() -> Self {
        let mut document = Node::new("#document", None);
        document.children.push(BODY);
        Self {
            nodes: vec![document, Node::new("body", Some(DOCUMENT))],
        }
    }
}

impl Dom {
    pub fn body(&self) -> ElementHandle {
        ElementHandle(BODY as u64)
    }

    /// Append a node under `parent` and return its handle
    pub fn append(&mut self, parent: ElementHandle, spec: NodeSpec) -> ElementHandle {
        let parent_idx = parent.0 as usize;
        let idx = self.nodes.len();
        let mut node = Node::new(&spec.tag, Some(parent_idx));
        node.attrs = spec.attrs.into_iter().collect();
        node.text = spec.text;
        node.interactable = spec.interactable;
        self.nodes.push(node);
        self.nodes[parent_idx].children.push(idx);
        ElementHandle(idx as u64)
    }

    /// Detach a subtree; handles into it go stale
    pub fn remove(&mut self, element: ElementHandle) {
        let idx = element.0 as usize;
        if let Some(parent) = self.nodes.get(idx).and_then(|n| n.parent) {
            self.nodes[parent].children.retain(|&c| c != idx);
        }
        let mut stack = vec![idx];
        while let Some(i) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(i) {
                node.attached = false;
                stack.extend(node.children.iter().copied());
            }
        }
    }

    pub fn set_text(&mut self, element: ElementHandle, text: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(element.0 as usize) {
            node.text = text.into();
        }
    }

    pub fn set_attribute(&mut self, element: ElementHandle, name: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(element.0 as usize) {
            node.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn attribute(&self, element: ElementHandle, name: &str) -> Option<String> {
        self.nodes.get(element.0 as usize).and_then(|n| n.attrs.get(name).cloned())
    }

    pub fn is_attached(&self, element: ElementHandle) -> bool {
        self.nodes.get(element.0 as usize).is_some_and(|n| n.attached)
    }

    /// Elements under the document (or `scope`) matching a CSS selector
    pub fn select(&self, scope: Option<ElementHandle>, css: &str) -> Vec<ElementHandle> {
        let root = scope.map_or(DOCUMENT, |h| h.0 as usize);
        match parse_selector_list(css) {
            Ok(list) => self.select_parsed(root, &list),
            Err(_) => Vec::new(),
        }
    }

    /// Whether `element` itself matches a CSS selector, frames included
    pub fn matches(&self, element: ElementHandle, css: &str) -> bool {
        let idx = element.0 as usize;
        if !self.is_attached(element) {
            return false;
        }
        match parse_selector_list(css) {
            Ok(list) => list.iter().any(|chain| self.matches_chain(idx, chain)),
            Err(_) => false,
        }
    }

    /// First element in the document matching a CSS selector
    pub fn first(&self, css: &str) -> Option<ElementHandle> {
        self.select(None, css).into_iter().next()
    }

    /// Visible text of a node, joined across descendants
    pub fn text_of(&self, element: ElementHandle) -> String {
        self.text_at(element.0 as usize)
    }

    fn node(&self, element: &ElementHandle) -> Result<&Node> {
        match self.nodes.get(element.0 as usize) {
            Some(node) if node.attached => Ok(node),
            _ => Err(BrowserError::StaleElement(format!("no node with given id {}", element.0))),
        }
    }

    fn node_mut(&mut self, element: &ElementHandle) -> Result<&mut Node> {
        match self.nodes.get_mut(element.0 as usize) {
            Some(node) if node.attached => Ok(node),
            _ => Err(BrowserError::StaleElement(format!("no node with given id {}", element.0))),
        }
    }

    fn text_at(&self, idx: usize) -> String {
        let node = &self.nodes[idx];
        let mut parts = Vec::new();
        if !node.text.trim().is_empty() {
            parts.push(node.text.trim().to_string());
        }
        if node.tag != "iframe" {
            for &child in &node.children {
                let text = self.text_at(child);
                if !text.is_empty() {
                    parts.push(text);
                }
            }
        }
        parts.join(" ")
    }

    /// Preorder descendants of `root`, not crossing into nested frames
    fn descendants(&self, root: usize) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_descendants(root, &mut out);
        out
    }

    fn collect_descendants(&self, idx: usize, out: &mut Vec<usize>) {
        for &child in &self.nodes[idx].children {
            out.push(child);
            if self.nodes[child].tag != "iframe" {
                self.collect_descendants(child, out);
            }
        }
    }

    fn select_parsed(&self, root: usize, list: &[Vec<Compound>]) -> Vec<ElementHandle> {
        self.descendants(root)
            .into_iter()
            .filter(|&idx| list.iter().any(|chain| self.matches_chain(idx, chain)))
            .map(|idx| ElementHandle(idx as u64))
            .collect()
    }

    fn matches_chain(&self, idx: usize, chain: &[Compound]) -> bool {
        let Some((last, rest)) = chain.split_last() else {
            return false;
        };
        if !last.matches(&self.nodes[idx]) {
            return false;
        }
        let mut remaining = rest;
        let mut cursor = self.nodes[idx].parent;
        while let Some((wanted, before)) = remaining.split_last() {
            loop {
                match cursor {
                    Some(i) if i != DOCUMENT => {
                        cursor = self.nodes[i].parent;
                        if wanted.matches(&self.nodes[i]) {
                            break;
                        }
                    }
                    _ => return false,
                }
            }
            remaining = before;
        }
        true
    }

    fn select_text(&self, root: usize, value: &str, exact: bool) -> Vec<ElementHandle> {
        let hit = |idx: usize| {
            let text = self.text_at(idx);
            if exact { text.trim() == value } else { text.contains(value) }
        };
        self.descendants(root)
            .into_iter()
            .filter(|&idx| {
                hit(idx)
                    && !(self.nodes[idx].tag != "iframe" && self.nodes[idx].children.iter().any(|&c| hit(c)))
            })
            .map(|idx| ElementHandle(idx as u64))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
}

#[derive(Debug, Clone, PartialEq)]
struct AttrTest {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn matches(&self, node: &Node) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && !tag.eq_ignore_ascii_case(&node.tag) {
                return false;
            }
        }
        if !self.ids.iter().all(|id| node.attrs.get("id") == Some(id)) {
            return false;
        }
        let classes = node.attrs.get("class").map(String::as_str).unwrap_or("");
        if !self.classes.iter().all(|c| classes.split_whitespace().any(|have| have == c)) {
            return false;
        }
        self.attrs.iter().all(|test| match (&test.op, node.attrs.get(&test.name)) {
            (_, None) => false,
            (AttrOp::Exists, Some(_)) => true,
            (AttrOp::Equals(v), Some(have)) => have == v,
            (AttrOp::Contains(v), Some(have)) => have.contains(v.as_str()),
        })
    }
}

/// Split on `sep` outside brackets and quotes
fn split_top_level(input: &str, is_sep: impl Fn(char) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for ch in input.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(ch);
                current.push(ch);
            }
            (None, '[') => {
                depth += 1;
                current.push(ch);
            }
            (None, ']') => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            (None, c) if depth == 0 && is_sep(c) => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_string());
                }
                current.clear();
            }
            (None, c) => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

fn parse_selector_list(input: &str) -> std::result::Result<Vec<Vec<Compound>>, String> {
    let list: Vec<Vec<Compound>> = split_top_level(input, |c| c == ',')
        .iter()
        .map(|selector| {
            split_top_level(selector, char::is_whitespace)
                .iter()
                .map(|compound| parse_compound(compound))
                .collect::<std::result::Result<Vec<_>, _>>()
        })
        .collect::<std::result::Result<_, _>>()?;
    if list.is_empty() {
        return Err(format!("empty selector '{}'", input));
    }
    Ok(list)
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(input: &str) -> std::result::Result<Compound, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut compound = Compound::default();
    let mut i = 0;

    let read_ident = |i: &mut usize| {
        let start = *i;
        while *i < chars.len() && is_ident(chars[*i]) {
            *i += 1;
        }
        chars[start..*i].iter().collect::<String>()
    };

    if i < chars.len() && (is_ident(chars[i]) || chars[i] == '*') {
        if chars[i] == '*' {
            compound.tag = Some("*".to_string());
            i += 1;
        } else {
            compound.tag = Some(read_ident(&mut i));
        }
    }

    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
                compound.classes.push(read_ident(&mut i));
            }
            '#' => {
                i += 1;
                compound.ids.push(read_ident(&mut i));
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|&c| c == ']')
                    .ok_or_else(|| format!("unclosed attribute selector in '{}'", input))?;
                let inner: String = chars[i + 1..i + close].iter().collect();
                compound.attrs.push(parse_attr(&inner)?);
                i += close + 1;
            }
            other => return Err(format!("unsupported character '{}' in '{}'", other, input)),
        }
    }
    Ok(compound)
}

fn parse_attr(inner: &str) -> std::result::Result<AttrTest, String> {
    let unquote = |v: &str| v.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string();
    if let Some((name, value)) = inner.split_once("*=") {
        return Ok(AttrTest {
            name: name.trim().to_string(),
            op: AttrOp::Contains(unquote(value)),
        });
    }
    if let Some((name, value)) = inner.split_once('=') {
        return Ok(AttrTest {
            name: name.trim().to_string(),
            op: AttrOp::Equals(unquote(value)),
        });
    }
    if inner.trim().is_empty() {
        return Err("empty attribute selector".to_string());
    }
    Ok(AttrTest {
        name: inner.trim().to_string(),
        op: AttrOp::Exists,
    })
}

/// Something the engine did to a [`MemoryPage`]
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Click { element: ElementHandle, via_script: bool },
    Hover(ElementHandle),
    ScrollIntoView(ElementHandle),
    Scroll(i64),
    Typed { element: ElementHandle, text: String },
    Cleared(ElementHandle),
    SetAttribute { element: ElementHandle, name: String, value: String },
    Selected { element: ElementHandle, label: String },
}

#[derive(Default)]
struct State {
    dom: Dom,
    click_hooks: Vec<(String, ClickHook)>,
    type_hooks: Vec<(String, TypeHook)>,
    scroll_hook: Option<ScrollHook>,
    events: Vec<Event>,
    paused: Duration,
    disconnected: bool,
    failing_queries: usize,
    failing_scrolls: usize,
    attribute_writes_unsupported: bool,
}

/// In-memory [`Page`]. Clones share the same page.
#[derive(Clone, Default)]
pub struct MemoryPage {
    state: Arc<Mutex<State>>,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn live(&self) -> Result<MutexGuard<'_, State>> {
        let state = self.state();
        if state.disconnected {
            return Err(BrowserError::Disconnected("memory page: target closed".to_string()));
        }
        Ok(state)
    }

    pub fn body(&self) -> ElementHandle {
        ElementHandle(BODY as u64)
    }

    pub fn append(&self, parent: ElementHandle, spec: NodeSpec) -> ElementHandle {
        self.state().dom.append(parent, spec)
    }

    /// Run a closure against the node tree
    pub fn with_dom<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> R {
        f(&mut self.state().dom)
    }

    /// Run `hook` after every successful click on an element matching `css`
    pub fn on_click(&self, css: impl Into<String>, hook: impl FnMut(&mut Dom, ElementHandle) + Send + 'static) {
        self.state().click_hooks.push((css.into(), Box::new(hook)));
    }

    /// Run `hook` after text is typed into an element matching `css`
    pub fn on_type(&self, css: impl Into<String>, hook: impl FnMut(&mut Dom, ElementHandle, &str) + Send + 'static) {
        self.state().type_hooks.push((css.into(), Box::new(hook)));
    }

    /// Run `hook` after every page scroll
    pub fn on_scroll(&self, hook: impl FnMut(&mut Dom, i64) + Send + 'static) {
        self.state().scroll_hook = Some(Box::new(hook));
    }

    /// Every operation fails with a disconnect until [`MemoryPage::reconnect`]
    pub fn disconnect(&self) {
        self.state().disconnected = true;
    }

    pub fn reconnect(&self) {
        self.state().disconnected = false;
    }

    /// The next `count` queries fail with a disconnect
    pub fn fail_queries(&self, count: usize) {
        self.state().failing_queries = count;
    }

    /// The next `count` page scrolls fail with a disconnect
    pub fn fail_scrolls(&self, count: usize) {
        self.state().failing_scrolls = count;
    }

    /// `set_attribute` fails, forcing callers onto the script path
    pub fn reject_attribute_writes(&self) {
        self.state().attribute_writes_unsupported = true;
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    pub fn clicks(&self) -> Vec<ElementHandle> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Click { element, .. } => Some(*element),
                _ => None,
            })
            .collect()
    }

    pub fn scroll_count(&self) -> usize {
        self.state().events.iter().filter(|e| matches!(e, Event::Scroll(_))).count()
    }

    /// Total virtual time spent in [`Page::pause`]
    pub fn paused(&self) -> Duration {
        self.state().paused
    }

    /// Attribute value, read without going through the page connection
    pub fn peek_attribute(&self, element: ElementHandle, name: &str) -> Option<String> {
        self.state().dom.attribute(element, name)
    }
}

impl Page for MemoryPage {
    fn query(&self, scope: &Scope, kind: LocatorKind, value: &str) -> Result<Vec<ElementHandle>> {
        let mut state = self.live()?;
        if state.failing_queries > 0 {
            state.failing_queries -= 1;
            return Err(BrowserError::Disconnected("memory page: context lost".to_string()));
        }
        let root = match scope {
            Scope::Page => DOCUMENT,
            Scope::Element(handle) => {
                state.dom.node(handle)?;
                handle.0 as usize
            }
        };
        match kind {
            LocatorKind::Css => {
                let list = parse_selector_list(value).map_err(BrowserError::EvaluationFailed)?;
                Ok(state.dom.select_parsed(root, &list))
            }
            LocatorKind::Text => Ok(state.dom.select_text(root, value, false)),
            LocatorKind::ExactText => Ok(state.dom.select_text(root, value, true)),
            LocatorKind::XPath => Err(BrowserError::EvaluationFailed(
                "xpath is not supported by MemoryPage".to_string(),
            )),
        }
    }

    fn click(&self, element: &ElementHandle, via_script: bool) -> Result<()> {
        let mut state = self.live()?;
        if !state.dom.node(element)?.interactable {
            return Err(BrowserError::NotInteractable(format!("node {} has no box model", element.0)));
        }
        state.events.push(Event::Click {
            element: *element,
            via_script,
        });
        let State { dom, click_hooks, .. } = &mut *state;
        for (css, hook) in click_hooks.iter_mut() {
            if dom.matches(*element, css) {
                hook(dom, *element);
            }
        }
        Ok(())
    }

    fn hover(&self, element: &ElementHandle) -> Result<()> {
        let mut state = self.live()?;
        state.dom.node(element)?;
        state.events.push(Event::Hover(*element));
        Ok(())
    }

    fn scroll_into_view(&self, element: &ElementHandle) -> Result<()> {
        let mut state = self.live()?;
        state.dom.node(element)?;
        state.events.push(Event::ScrollIntoView(*element));
        Ok(())
    }

    fn scroll_page(&self, pixels: i64) -> Result<()> {
        let mut state = self.live()?;
        if state.failing_scrolls > 0 {
            state.failing_scrolls -= 1;
            return Err(BrowserError::Disconnected("memory page: scroll lost the target".to_string()));
        }
        state.events.push(Event::Scroll(pixels));
        let State { dom, scroll_hook, .. } = &mut *state;
        if let Some(hook) = scroll_hook {
            hook(dom, pixels);
        }
        Ok(())
    }

    fn text(&self, element: &ElementHandle) -> Result<String> {
        let state = self.live()?;
        state.dom.node(element)?;
        Ok(state.dom.text_of(*element))
    }

    fn tag_name(&self, element: &ElementHandle) -> Result<String> {
        Ok(self.live()?.dom.node(element)?.tag.clone())
    }

    fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        Ok(self.live()?.dom.node(element)?.attrs.get(name).cloned())
    }

    fn set_attribute(&self, element: &ElementHandle, name: &str, value: &str) -> Result<()> {
        let mut state = self.live()?;
        if state.attribute_writes_unsupported {
            return Err(BrowserError::EvaluationFailed(
                "DOM.setAttributeValue is not supported for this node".to_string(),
            ));
        }
        state.dom.node_mut(element)?.attrs.insert(name.to_string(), value.to_string());
        state.events.push(Event::SetAttribute {
            element: *element,
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn run_script(
        &self,
        element: &ElementHandle,
        function_declaration: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value> {
        let mut state = self.live()?;
        state.dom.node(element)?;
        // Only attribute writes are understood; everything else evaluates to null.
        if function_declaration.contains("setAttribute") {
            if let [serde_json::Value::String(name), serde_json::Value::String(value)] = args {
                state.dom.node_mut(element)?.attrs.insert(name.clone(), value.clone());
                state.events.push(Event::SetAttribute {
                    element: *element,
                    name: name.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(serde_json::Value::Null)
    }

    fn type_text(&self, element: &ElementHandle, text: &str) -> Result<()> {
        let mut state = self.live()?;
        let node = state.dom.node_mut(element)?;
        let mut current = node.attrs.remove("value").unwrap_or_default();
        current.push_str(text);
        node.attrs.insert("value".to_string(), current);
        state.events.push(Event::Typed {
            element: *element,
            text: text.to_string(),
        });
        let State { dom, type_hooks, .. } = &mut *state;
        for (css, hook) in type_hooks.iter_mut() {
            if dom.matches(*element, css) {
                hook(dom, *element, text);
            }
        }
        Ok(())
    }

    fn clear(&self, element: &ElementHandle) -> Result<()> {
        let mut state = self.live()?;
        state.dom.node_mut(element)?.attrs.insert("value".to_string(), String::new());
        state.events.push(Event::Cleared(*element));
        Ok(())
    }

    fn select_by_label(&self, element: &ElementHandle, label: &str) -> Result<bool> {
        let mut state = self.live()?;
        let node = state.dom.node(element)?;
        if node.tag != "select" {
            return Ok(false);
        }
        let found = node
            .children
            .iter()
            .any(|&c| state.dom.nodes[c].tag == "option" && state.dom.text_at(c) == label);
        if found {
            state.dom.node_mut(element)?.attrs.insert("value".to_string(), label.to_string());
            state.events.push(Event::Selected {
                element: *element,
                label: label.to_string(),
            });
        }
        Ok(found)
    }

    fn parent(&self, element: &ElementHandle) -> Result<Option<ElementHandle>> {
        let state = self.live()?;
        Ok(state
            .dom
            .node(element)?
            .parent
            .filter(|&p| p != DOCUMENT)
            .map(|p| ElementHandle(p as u64)))
    }

    fn wait_document_loaded(&self, _timeout: Duration) -> Result<()> {
        self.live().map(|_| ())
    }

    fn url(&self) -> Option<String> {
        Some("memory://page".to_string())
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        self.live()?;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    fn pause(&self, duration: Duration) {
        self.state().paused += duration;
    }
}

/// [`SessionProvider`] that hands out a shared [`MemoryPage`].
///
/// Connecting clears the page's disconnect flag, unless connections are
/// being refused.
#[derive(Clone, Default)]
pub struct MemoryProvider {
    page: MemoryPage,
    refuse: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
}

impl MemoryProvider {
    pub fn new(page: MemoryPage) -> Self {
        Self {
            page,
            refuse: Arc::new(AtomicBool::new(false)),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of connection attempts, successful or not
    pub fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl SessionProvider for MemoryProvider {
    type Handle = usize;
    type Page = MemoryPage;

    fn connect(&self) -> Result<usize> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if self.refuse.load(Ordering::SeqCst) {
            return Err(BrowserError::ConnectionFailed(format!(
                "memory provider refused connection #{}",
                attempt
            )));
        }
        self.page.reconnect();
        Ok(attempt)
    }

    fn active_page(&self, _handle: &usize) -> Result<MemoryPage> {
        Ok(self.page.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_subset() {
        let page = MemoryPage::new();
        let body = page.body();
        let row = page.append(body, NodeSpec::new("div").class("row selected-tab"));
        let btn = page.append(row, NodeSpec::new("button").attr("data-testid", "uicl-button").text("Send Proposal"));
        page.append(body, NodeSpec::new("span").class("please-select"));

        let find = |css: &str| page.query(&Scope::Page, LocatorKind::Css, css).unwrap();
        assert_eq!(find("button[data-testid=\"uicl-button\"]"), vec![btn]);
        assert_eq!(find("div.row button"), vec![btn]);
        assert_eq!(find("[class*=\"select\"]").len(), 2);
        assert_eq!(find("a, span.please-select").len(), 1);
        assert!(page.query(&Scope::Page, LocatorKind::XPath, "//button").is_err());
    }

    #[test]
    fn test_text_locator_prefers_innermost() {
        let page = MemoryPage::new();
        let body = page.body();
        let button = page.append(body, NodeSpec::new("button"));
        let label = page.append(button, NodeSpec::new("span").text("I understand"));

        let found = page.query(&Scope::Page, LocatorKind::Text, "understand").unwrap();
        assert_eq!(found, vec![label]);
        assert_eq!(page.text(&button).unwrap(), "I understand");
        assert_eq!(page.parent(&label).unwrap(), Some(button));
        assert_eq!(page.parent(&body).unwrap(), None);
    }

    #[test]
    fn test_frames_are_separate_documents() {
        let page = MemoryPage::new();
        let frame = page.append(page.body(), NodeSpec::new("iframe"));
        let inner = page.append(frame, NodeSpec::new("textarea"));

        assert!(page.query(&Scope::Page, LocatorKind::Css, "textarea").unwrap().is_empty());
        assert_eq!(page.query(&Scope::Element(frame), LocatorKind::Css, "textarea").unwrap(), vec![inner]);
    }

    #[test]
    fn test_hooks_and_stale_handles() {
        let page = MemoryPage::new();
        let btn = page.append(page.body(), NodeSpec::new("button").class("open"));
        page.on_click("button.open", |dom, clicked| {
            let body = dom.body();
            dom.append(body, NodeSpec::new("div").class("modal"));
            dom.remove(clicked);
        });

        page.click(&btn, true).unwrap();
        assert_eq!(page.query(&Scope::Page, LocatorKind::Css, "div.modal").unwrap().len(), 1);
        assert!(matches!(page.text(&btn), Err(BrowserError::StaleElement(_))));
    }

    #[test]
    fn test_disconnect_and_provider() {
        let page = MemoryPage::new();
        let provider = MemoryProvider::new(page.clone());
        page.disconnect();
        assert!(page.scroll_page(500).unwrap_err().is_transient());

        provider.refuse_connections(true);
        assert!(provider.connect().is_err());
        provider.refuse_connections(false);
        let handle = provider.connect().unwrap();
        assert_eq!(handle, 2);
        assert!(provider.active_page(&handle).unwrap().scroll_page(500).is_ok());
    }
}
