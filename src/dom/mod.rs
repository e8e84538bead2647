pub mod selector;

use tokio::sync::mpsc;
use tracing::debug;

pub use selector::{Selector, SelectorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
}

impl Element {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    fn set_attribute(&mut self, name: &str, value: String) {
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    fn matches(&self, compound: &selector::Compound) -> bool {
        compound.tag.as_deref().map_or(true, |t| t == self.tag)
            && compound.classes.iter().all(|c| self.has_class(c))
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(Element),
    Text(String),
    /// Trusted HTML fragment, serialized verbatim.
    Markup(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Nodes added to the connected tree by one insertion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationBatch {
    pub added: Vec<NodeId>,
}

/// Arena-backed document standing in for the host page.
///
/// Nodes are never freed; detached nodes simply stop being reachable from
/// the body.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    body: NodeId,
    observer: Option<mpsc::UnboundedSender<MutationBatch>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let body = Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Element(Element {
                tag: "body".to_string(),
                attributes: Vec::new(),
            }),
        };
        Self {
            nodes: vec![body],
            body: NodeId(0),
            observer: None,
        }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        }))
    }

    /// Shorthand for an element with a `class` attribute.
    pub fn create_element_with_class(&mut self, tag: &str, class: &str) -> NodeId {
        let id = self.create_element(tag);
        self.set_attribute(id, "class", class);
        id
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub fn create_markup(&mut self, html: impl Into<String>) -> NodeId {
        self.push(NodeKind::Markup(html.into()))
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.nodes[node.0].kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    /// No-op on non-element nodes.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        if let NodeKind::Element(el) = &mut self.nodes[node.0].kind {
            el.set_attribute(name, value.into());
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attribute(name)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Whether the node is reachable from the body.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == self.body {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(old) = self.nodes[child.0].parent.take() {
            self.nodes[old.0].children.retain(|c| *c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.append_children(parent, [child]);
    }

    /// Append several children; observers see them as a single batch.
    pub fn append_children(&mut self, parent: NodeId, children: impl IntoIterator<Item = NodeId>) {
        let added: Vec<NodeId> = children.into_iter().collect();
        for &child in &added {
            self.attach(parent, child);
        }
        if !added.is_empty() && self.is_connected(parent) {
            self.notify(added);
        }
    }

    fn notify(&mut self, added: Vec<NodeId>) {
        let Some(tx) = &self.observer else {
            return;
        };
        if tx.send(MutationBatch { added }).is_err() {
            debug!("Mutation observer receiver dropped, disconnecting");
            self.observer = None;
        }
    }

    /// Start observing insertions under the body. Replaces any earlier observer.
    pub fn observe(&mut self) -> mpsc::UnboundedReceiver<MutationBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observer = Some(tx);
        rx
    }

    /// Stop observing; the receiver ends once buffered batches are drained.
    pub fn disconnect_observer(&mut self) {
        self.observer = None;
    }

    /// Descendants in document order, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        self.matches_from(node, selector, selector.parts.len() - 1)
    }

    fn matches_from(&self, node: NodeId, selector: &Selector, idx: usize) -> bool {
        let Some(el) = self.element(node) else {
            return false;
        };
        if !el.matches(&selector.parts[idx]) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        let mut ancestor = self.parent(node);
        while let Some(a) = ancestor {
            if self.matches_from(a, selector, idx - 1) {
                return true;
            }
            ancestor = self.parent(a);
        }
        false
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&n| self.matches(n, selector))
            .collect()
    }

    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|&n| self.matches(n, selector))
    }

    /// Concatenated text. Markup fragments are rendered to plain text.
    pub fn text_content(&self, node: NodeId) -> String {
        match self.kind(node) {
            NodeKind::Text(t) => t.clone(),
            NodeKind::Markup(html) => html2text::from_read(html.as_bytes(), 1000)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_else(|_| html.clone()),
            NodeKind::Element(_) => self
                .children(node)
                .iter()
                .map(|&c| self.text_content(c))
                .collect(),
        }
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &c in self.children(node) {
            self.write_html(c, &mut out);
        }
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            NodeKind::Text(t) => out.push_str(&escape_html(t)),
            NodeKind::Markup(html) => out.push_str(html),
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (k, v) in &el.attributes {
                    out.push_str(&format!(" {}=\"{}\"", k, escape_html(v)));
                }
                out.push('>');
                if is_void(&el.tag) {
                    return;
                }
                for &c in self.children(node) {
                    self.write_html(c, out);
                }
                out.push_str(&format!("</{}>", el.tag));
            }
        }
    }
}

fn is_void(tag: &str) -> bool {
    matches!(tag, "br" | "hr" | "img" | "input" | "meta" | "link")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    /// body > div.result-item > (h3 > a[href]) + p.result-excerpt
    fn sample(doc: &mut Document) -> (NodeId, NodeId, NodeId) {
        let item = doc.create_element_with_class("div", "result-item card");
        let h3 = doc.create_element("h3");
        let a = doc.create_element("a");
        doc.set_attribute(a, "href", "/docs/id1.pdf");
        doc.append_child(h3, a);
        let excerpt = doc.create_element_with_class("p", "result-excerpt");
        let text = doc.create_text("Some <excerpt>");
        doc.append_child(excerpt, text);
        doc.append_children(item, [h3, excerpt]);
        let body = doc.body();
        doc.append_child(body, item);
        (item, a, excerpt)
    }

    #[test]
    fn test_query_and_match() {
        let mut doc = Document::new();
        let (item, a, excerpt) = sample(&mut doc);

        assert_eq!(doc.query_selector_all(doc.body(), &sel(".result-item")), vec![item]);
        assert_eq!(doc.query_selector(item, &sel("h3 a")), Some(a));
        assert_eq!(doc.query_selector(item, &sel("p.result-excerpt")), Some(excerpt));
        assert!(doc.matches(item, &sel("div.card")));
        assert!(!doc.matches(a, &sel("div a")));
        assert!(doc.matches(a, &sel("body a")));
        assert_eq!(doc.attribute(a, "href"), Some("/docs/id1.pdf"));
    }

    #[test]
    fn test_scope_excludes_self() {
        let mut doc = Document::new();
        let (item, _, _) = sample(&mut doc);
        assert!(doc.query_selector_all(item, &sel(".result-item")).is_empty());
    }

    #[test]
    fn test_html_and_text() {
        let mut doc = Document::new();
        let (_, _, excerpt) = sample(&mut doc);
        let markup = doc.create_markup("<b>Bold</b> claim");
        doc.append_child(excerpt, markup);

        assert_eq!(
            doc.outer_html(excerpt),
            "<p class=\"result-excerpt\">Some &lt;excerpt&gt;<b>Bold</b> claim</p>"
        );
        let text = doc.text_content(excerpt);
        assert!(text.starts_with("Some <excerpt>"));
        assert!(text.contains("Bold"));
        assert!(text.contains("claim"));
    }

    #[test]
    fn test_reparenting_moves_node() {
        let mut doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let c = doc.create_element("span");
        doc.append_child(a, c);
        doc.append_child(b, c);
        assert!(doc.children(a).is_empty());
        assert_eq!(doc.children(b), &[c]);
        assert_eq!(doc.parent(c), Some(b));
    }

    #[tokio::test]
    async fn test_observer_reports_connected_insertions() {
        let mut doc = Document::new();
        let mut rx = doc.observe();

        // Building a detached subtree is not observed.
        let item = doc.create_element_with_class("div", "result-item");
        let inner = doc.create_element("span");
        doc.append_child(item, inner);
        assert!(rx.try_recv().is_err());

        let body = doc.body();
        doc.append_child(body, item);
        assert_eq!(rx.recv().await, Some(MutationBatch { added: vec![item] }));

        doc.disconnect_observer();
        assert_eq!(rx.recv().await, None);
    }
}
