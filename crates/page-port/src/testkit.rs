//! Synthetic page driver for tests
//!
//! Implements `PageDriver` over an in-memory element tree with nested
//! shadow/iframe scopes. Matching covers the selector subset the engine
//! generates: tag, `#id`, `.class`, `[attr]`, `[attr="value"]`,
//! `:not([attr])`, `:nth-of-type(n)`, and descendant chains. This is
//! test tooling only; production resolution always runs against a real
//! driver adapter.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use wayfinder_core_types::{normalize_text, Locator, TextMatch};

use crate::errors::DriverError;
use crate::port::{BoundingBox, ElementHandle, PageDriver, ScopeKind, ScopeRef};

/// Builder for a synthetic element (and its subtree)
#[derive(Debug, Clone)]
pub struct FakeElement {
    tag: String,
    text: String,
    attributes: BTreeMap<String, String>,
    visible: bool,
    enabled: bool,
    children: Vec<FakeElement>,
}

impl FakeElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            text: String::new(),
            attributes: BTreeMap::new(),
            visible: true,
            enabled: true,
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: FakeElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self.attributes.insert("hidden".into(), String::new());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self.attributes.insert("disabled".into(), String::new());
        self
    }
}

#[derive(Debug, Clone)]
struct FakeNode {
    node_ref: String,
    tag: String,
    text: String,
    attributes: BTreeMap<String, String>,
    visible: bool,
    enabled: bool,
    /// 1-based index among same-tag siblings
    type_index: usize,
    children: Vec<FakeNode>,
}

impl FakeNode {
    fn handle(&self) -> ElementHandle {
        ElementHandle {
            node_ref: self.node_ref.clone(),
            tag: self.tag.clone(),
            text: self.text.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

struct FakeScope {
    scope: ScopeRef,
    page: FakePage,
    same_origin: bool,
}

struct PageState {
    url: String,
    roots: Vec<FakeNode>,
    scopes: Vec<FakeScope>,
    load_time_ms: f64,
    eval_overrides: Vec<(String, Value)>,
    fail_queries: bool,
    next_ref: u64,
    next_scope: u64,
}

/// Synthetic page implementing the driver port
#[derive(Clone)]
pub struct FakePage {
    state: Arc<RwLock<PageState>>,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePage {
    pub fn new() -> Self {
        Self::with_url("https://example.com/")
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            state: Arc::new(RwLock::new(PageState {
                url: url.into(),
                roots: Vec::new(),
                scopes: Vec::new(),
                load_time_ms: 350.0,
                eval_overrides: Vec::new(),
                fail_queries: false,
                next_ref: 0,
                next_scope: 0,
            })),
        }
    }

    /// This page as a driver handle
    pub fn driver(&self) -> Arc<dyn PageDriver> {
        Arc::new(self.clone())
    }

    /// Add a top-level element (with its subtree)
    pub fn add_element(&self, element: FakeElement) {
        let mut state = self.state.write();
        let sibling_count = state
            .roots
            .iter()
            .filter(|node| node.tag == element.tag.to_lowercase())
            .count();
        let node = intern(element, sibling_count + 1, &mut state.next_ref);
        state.roots.push(node);
    }

    /// Drop all elements (scopes are kept)
    pub fn clear_elements(&self) {
        self.state.write().roots.clear();
    }

    /// Attach a child iframe and return its page
    pub fn add_iframe(&self, label: impl Into<String>, same_origin: bool) -> FakePage {
        self.add_scope(ScopeKind::Iframe, label, same_origin)
    }

    /// Attach a shadow root and return its page
    pub fn add_shadow_root(&self, label: impl Into<String>) -> FakePage {
        self.add_scope(ScopeKind::ShadowRoot, label, true)
    }

    fn add_scope(&self, kind: ScopeKind, label: impl Into<String>, same_origin: bool) -> FakePage {
        let child = FakePage::new();
        let mut state = self.state.write();
        state.next_scope += 1;
        let scope = ScopeRef {
            id: format!("scope-{}", state.next_scope),
            kind,
            label: label.into(),
        };
        state.scopes.push(FakeScope {
            scope,
            page: child.clone(),
            same_origin,
        });
        child
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.state.write().url = url.into();
    }

    /// Value reported by the navigation-latency probe
    pub fn set_load_time_ms(&self, ms: f64) {
        self.state.write().load_time_ms = ms;
    }

    /// Canned result for evaluate expressions containing `key`
    pub fn set_eval_result(&self, key: impl Into<String>, value: Value) {
        self.state.write().eval_overrides.push((key.into(), value));
    }

    /// Make query_all fail, for detector fault-tolerance tests
    pub fn set_fail_queries(&self, fail: bool) {
        self.state.write().fail_queries = fail;
    }

    fn find_node<'a>(nodes: &'a [FakeNode], node_ref: &str) -> Option<&'a FakeNode> {
        for node in nodes {
            if node.node_ref == node_ref {
                return Some(node);
            }
            if let Some(found) = Self::find_node(&node.children, node_ref) {
                return Some(found);
            }
        }
        None
    }

    fn all_text(nodes: &[FakeNode], out: &mut Vec<String>) {
        for node in nodes {
            if !node.text.trim().is_empty() {
                out.push(node.text.trim().to_string());
            }
            Self::all_text(&node.children, out);
        }
    }
}

fn intern(element: FakeElement, type_index: usize, next_ref: &mut u64) -> FakeNode {
    *next_ref += 1;
    let node_ref = format!("n{next_ref}");
    let mut children = Vec::new();
    let mut tag_counts: BTreeMap<String, usize> = BTreeMap::new();
    for child in element.children {
        let count = tag_counts.entry(child.tag.to_lowercase()).or_insert(0);
        *count += 1;
        let index = *count;
        children.push(intern(child, index, next_ref));
    }
    FakeNode {
        node_ref,
        tag: element.tag,
        text: element.text,
        attributes: element.attributes,
        visible: element.visible,
        enabled: element.enabled,
        type_index,
        children,
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn query_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DriverError> {
        let state = self.state.read();
        if state.fail_queries {
            return Err(DriverError::Unavailable("query failure injected".into()));
        }
        let mut matched: Vec<&FakeNode> = Vec::new();
        match locator {
            Locator::Css(selector) => {
                let chain = parse_selector(selector)?;
                collect_css(&state.roots, &chain, 0, &mut matched);
            }
            Locator::Text { pattern, mode } => {
                collect_where(&state.roots, &mut matched, &|node| {
                    text_matches(&node.text, pattern, *mode)
                });
            }
            Locator::Role { role, name } => {
                collect_where(&state.roots, &mut matched, &|node| {
                    role_matches(node, role, name.as_deref())
                });
            }
            Locator::Labelled(label) => {
                let wanted = normalize_text(label);
                let mut for_ids = Vec::new();
                collect_label_targets(&state.roots, &wanted, &mut for_ids);
                collect_where(&state.roots, &mut matched, &|node| {
                    labelled_matches(node, &wanted, &for_ids)
                });
            }
        }
        Ok(matched.into_iter().map(FakeNode::handle).collect())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, DriverError> {
        let state = self.state.read();
        for (key, value) in &state.eval_overrides {
            if expression.contains(key.as_str()) {
                return Ok(value.clone());
            }
        }
        if expression.contains("navigationStart") {
            return Ok(json!(state.load_time_ms));
        }
        if expression.contains("innerText") {
            let mut parts = Vec::new();
            FakePage::all_text(&state.roots, &mut parts);
            return Ok(json!(parts.join(" ")));
        }
        Ok(Value::Null)
    }

    async fn child_scopes(&self, kind: ScopeKind) -> Result<Vec<ScopeRef>, DriverError> {
        let state = self.state.read();
        Ok(state
            .scopes
            .iter()
            .filter(|entry| entry.scope.kind == kind)
            .map(|entry| entry.scope.clone())
            .collect())
    }

    async fn enter_scope(&self, scope: &ScopeRef) -> Result<Arc<dyn PageDriver>, DriverError> {
        let state = self.state.read();
        let entry = state
            .scopes
            .iter()
            .find(|entry| entry.scope.id == scope.id)
            .ok_or_else(|| DriverError::NodeGone(format!("scope {}", scope.id)))?;
        if !entry.same_origin {
            return Err(DriverError::AccessDenied(entry.scope.label.clone()));
        }
        Ok(Arc::new(entry.page.clone()))
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.state.read().url.clone())
    }

    async fn bounding_box(
        &self,
        element: &ElementHandle,
    ) -> Result<Option<BoundingBox>, DriverError> {
        let state = self.state.read();
        let node = FakePage::find_node(&state.roots, &element.node_ref)
            .ok_or_else(|| DriverError::NodeGone(element.node_ref.clone()))?;
        if !node.visible {
            return Ok(None);
        }
        Ok(Some(BoundingBox {
            x: 10.0,
            y: 10.0,
            width: 120.0,
            height: 24.0,
        }))
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        let state = self.state.read();
        let node = FakePage::find_node(&state.roots, &element.node_ref)
            .ok_or_else(|| DriverError::NodeGone(element.node_ref.clone()))?;
        Ok(node.visible)
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        let state = self.state.read();
        let node = FakePage::find_node(&state.roots, &element.node_ref)
            .ok_or_else(|| DriverError::NodeGone(element.node_ref.clone()))?;
        Ok(node.enabled)
    }
}

// ---------------------------------------------------------------------------
// CSS selector subset
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
    not_attrs: Vec<String>,
    nth_of_type: Option<usize>,
}

fn parse_selector(selector: &str) -> Result<Vec<Compound>, DriverError> {
    let flattened = selector.replace('>', " ");
    let chain: Result<Vec<_>, _> = flattened
        .split_whitespace()
        .map(parse_compound)
        .collect();
    let chain = chain?;
    if chain.is_empty() {
        return Err(DriverError::InvalidSelector("empty selector".into()));
    }
    Ok(chain)
}

fn parse_compound(token: &str) -> Result<Compound, DriverError> {
    let invalid = || DriverError::InvalidSelector(token.to_string());
    let mut compound = Compound::default();
    let chars: Vec<char> = token.chars().collect();
    let mut i = 0;

    let read_name = |chars: &[char], mut i: usize| -> (String, usize) {
        let start = i;
        while i < chars.len()
            && (chars[i].is_alphanumeric() || chars[i] == '-' || chars[i] == '_')
        {
            i += 1;
        }
        (chars[start..i].iter().collect(), i)
    };

    if i < chars.len() && (chars[i].is_alphabetic() || chars[i] == '_') {
        let (tag, next) = read_name(&chars, i);
        compound.tag = Some(tag.to_lowercase());
        i = next;
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                let (id, next) = read_name(&chars, i + 1);
                if id.is_empty() {
                    return Err(invalid());
                }
                compound.id = Some(id);
                i = next;
            }
            '.' => {
                let (class, next) = read_name(&chars, i + 1);
                if class.is_empty() {
                    return Err(invalid());
                }
                compound.classes.push(class);
                i = next;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .ok_or_else(invalid)?
                    + i;
                let body: String = chars[i + 1..close].iter().collect();
                compound.attrs.push(parse_attr(&body).ok_or_else(invalid)?);
                i = close + 1;
            }
            ':' => {
                let rest: String = chars[i..].iter().collect();
                if let Some(inner) = rest
                    .strip_prefix(":not([")
                    .and_then(|r| r.split_once("])").map(|(inner, _)| inner))
                {
                    compound.not_attrs.push(inner.to_string());
                    i += ":not([])".len() + inner.len();
                } else if let Some(args) = rest
                    .strip_prefix(":nth-of-type(")
                    .and_then(|r| r.split_once(')').map(|(args, _)| args))
                {
                    let n: usize = args.trim().parse().map_err(|_| invalid())?;
                    compound.nth_of_type = Some(n);
                    i += ":nth-of-type()".len() + args.len();
                } else {
                    return Err(invalid());
                }
            }
            _ => return Err(invalid()),
        }
    }

    Ok(compound)
}

fn parse_attr(body: &str) -> Option<(String, Option<String>)> {
    match body.split_once('=') {
        None => {
            let key = body.trim();
            (!key.is_empty()).then(|| (key.to_string(), None))
        }
        Some((key, value)) => {
            let key = key.trim();
            let value = value.trim().trim_matches(['"', '\''].as_slice());
            (!key.is_empty()).then(|| (key.to_string(), Some(value.to_string())))
        }
    }
}

fn compound_matches(node: &FakeNode, compound: &Compound) -> bool {
    if let Some(tag) = &compound.tag {
        if node.tag != *tag {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if node.attributes.get("id").map(String::as_str) != Some(id.as_str()) {
            return false;
        }
    }
    if !compound.classes.is_empty() {
        let class_attr = node.attributes.get("class").cloned().unwrap_or_default();
        let classes: Vec<&str> = class_attr.split_whitespace().collect();
        if !compound
            .classes
            .iter()
            .all(|class| classes.contains(&class.as_str()))
        {
            return false;
        }
    }
    for (key, value) in &compound.attrs {
        match (node.attributes.get(key), value) {
            (None, _) => return false,
            (Some(_), None) => {}
            (Some(actual), Some(expected)) => {
                if actual != expected {
                    return false;
                }
            }
        }
    }
    for key in &compound.not_attrs {
        if node.attributes.contains_key(key) {
            return false;
        }
    }
    if let Some(n) = compound.nth_of_type {
        if node.type_index != n {
            return false;
        }
    }
    true
}

fn collect_css<'a>(
    nodes: &'a [FakeNode],
    chain: &[Compound],
    progress: usize,
    out: &mut Vec<&'a FakeNode>,
) {
    for node in nodes {
        let mut next = progress;
        if progress < chain.len() && compound_matches(node, &chain[progress]) {
            if progress == chain.len() - 1 {
                out.push(node);
            } else {
                next = progress + 1;
            }
        }
        collect_css(&node.children, chain, next, out);
    }
}

fn collect_where<'a>(
    nodes: &'a [FakeNode],
    out: &mut Vec<&'a FakeNode>,
    predicate: &dyn Fn(&FakeNode) -> bool,
) {
    for node in nodes {
        if predicate(node) {
            out.push(node);
        }
        collect_where(&node.children, out, predicate);
    }
}

fn text_matches(text: &str, pattern: &str, mode: TextMatch) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    match mode {
        TextMatch::Exact => text.trim() == pattern.trim(),
        TextMatch::Normalized => normalize_text(text) == normalize_text(pattern),
        TextMatch::Contains => normalize_text(text).contains(&normalize_text(pattern)),
    }
}

fn implied_role(node: &FakeNode) -> Option<&str> {
    if let Some(role) = node.attributes.get("role") {
        return Some(role.as_str());
    }
    match node.tag.as_str() {
        "button" => Some("button"),
        "a" if node.attributes.contains_key("href") => Some("link"),
        "select" => Some("combobox"),
        "textarea" => Some("textbox"),
        "img" => Some("img"),
        "form" => Some("form"),
        "table" => Some("table"),
        "input" => match node.attributes.get("type").map(String::as_str) {
            Some("checkbox") => Some("checkbox"),
            Some("radio") => Some("radio"),
            Some("submit") | Some("button") => Some("button"),
            Some("search") => Some("searchbox"),
            _ => Some("textbox"),
        },
        _ => None,
    }
}

fn role_matches(node: &FakeNode, role: &str, name: Option<&str>) -> bool {
    if implied_role(node) != Some(role) {
        return false;
    }
    match name {
        None => true,
        Some(name) => {
            let wanted = normalize_text(name);
            let accessible = node
                .attributes
                .get("aria-label")
                .map(|label| normalize_text(label))
                .filter(|label| !label.is_empty())
                .unwrap_or_else(|| normalize_text(&node.text));
            accessible == wanted
        }
    }
}

fn collect_label_targets(nodes: &[FakeNode], wanted: &str, for_ids: &mut Vec<String>) {
    for node in nodes {
        if node.tag == "label" && normalize_text(&node.text) == wanted {
            if let Some(target) = node.attributes.get("for") {
                for_ids.push(target.clone());
            }
        }
        collect_label_targets(&node.children, wanted, for_ids);
    }
}

fn labelled_matches(node: &FakeNode, wanted: &str, for_ids: &[String]) -> bool {
    if node.tag == "label" {
        return false;
    }
    if let Some(label) = node.attributes.get("aria-label") {
        if normalize_text(label) == *wanted {
            return true;
        }
    }
    if let Some(id) = node.attributes.get("id") {
        return for_ids.iter().any(|target| target == id);
    }
    false
}
