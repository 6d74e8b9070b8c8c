//! In-memory document tree the engine renders into.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]; removing a node only
//! detaches it, so ids stay valid. Structural changes to the attached part of
//! the tree are reported to the observer registered with [`Document::observe`].
mod mutation;

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tokio::sync::mpsc::{
    UnboundedReceiver,
    UnboundedSender,
    unbounded_channel,
};

pub use mutation::MutationRecord;

/// Handle to a node of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Unknown node {0}")]
    UnknownNode(NodeId),
    #[error("Node {0} is not an element")]
    NotAnElement(NodeId),
    /// The insertion would create a cycle or targets a non-element parent
    #[error("Cannot insert {child} into {parent}")]
    HierarchyRequest { parent: NodeId, child: NodeId },
}

/// What a node holds.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    /// An element with its attributes
    Element {
        /// Lower-case tag name
        tag: String,
        /// Attributes by name
        attributes: BTreeMap<String, String>,
    },
    /// A text node
    Text(String),
    /// Opaque markup fragment written through `set_inner_markup`
    Markup(String),
}

/// One arena slot.
#[derive(Debug, Clone)]
struct NodeData {
    /// Content of the node
    kind: NodeKind,
    /// `None` for the root and for detached nodes
    parent: Option<NodeId>,
    /// Children in document order
    children: Vec<NodeId>,
}

/// A document: a root `html` element, a title and an arena of nodes.
pub struct Document {
    /// Every node ever created, indexed by `NodeId`
    nodes: Vec<NodeData>,
    /// The `html` element
    root: NodeId,
    /// Document title
    title: String,
    /// Number of content writes (text, markup, attributes, title)
    writes: usize,
    /// Sender of mutation records while observed
    observer: Option<UnboundedSender<MutationRecord>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        let root = NodeData {
            kind: NodeKind::Element { tag: "html".to_string(), attributes: BTreeMap::new() },
            parent: None,
            children: Vec::new(),
        };
        Self { nodes: vec![root], root: NodeId(0), title: String::new(), writes: 0, observer: None }
    }

    /// The document element.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Registers the structural observer, replacing any previous one.
    pub fn observe(&mut self) -> UnboundedReceiver<MutationRecord> {
        let (tx, rx) = unbounded_channel();
        self.observer = Some(tx);
        rx
    }

    /// Stops reporting structural changes.
    pub fn disconnect(&mut self) {
        self.observer = None;
    }

    /// Number of content writes performed so far.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element { tag: tag.to_ascii_lowercase(), attributes: BTreeMap::new() })
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData { kind, parent: None, children: Vec::new() });
        id
    }

    fn node(&self, id: NodeId) -> Result<&NodeData, DocumentError> {
        self.nodes.get(id.0).ok_or(DocumentError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, DocumentError> {
        self.nodes.get_mut(id.0).ok_or(DocumentError::UnknownNode(id))
    }

    /// Appends `child` to `parent`, moving it if it is attached elsewhere.
    ///
    /// # Errors
    /// Unknown ids, a non-element parent, or a child that is an ancestor of
    /// `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        let hierarchy = DocumentError::HierarchyRequest { parent, child };
        if !matches!(self.node(parent)?.kind, NodeKind::Element { .. }) {
            return Err(hierarchy);
        }
        self.node(child)?;
        if child == self.root || self.ancestors(parent).any(|a| a == child) {
            return Err(hierarchy);
        }

        self.detach(child)?;
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);

        if self.is_attached(child) {
            self.notify(MutationRecord::Inserted(child));
        }
        Ok(())
    }

    /// Detaches `node` from its parent. The root cannot be removed.
    ///
    /// # Errors
    /// When `node` is unknown.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DocumentError> {
        self.detach(node)
    }

    fn detach(&mut self, node: NodeId) -> Result<(), DocumentError> {
        if let Some(parent) = self.node_mut(node)?.parent.take() {
            self.node_mut(parent)?.children.retain(|c| *c != node);
        }
        Ok(())
    }

    /// Replaces every child of `node`, detaching the old ones.
    fn replace_children(&mut self, node: NodeId, kind: NodeKind) -> Result<(), DocumentError> {
        if !matches!(self.node(node)?.kind, NodeKind::Element { .. }) {
            return Err(DocumentError::NotAnElement(node));
        }
        let old = std::mem::take(&mut self.node_mut(node)?.children);
        for child in old {
            self.node_mut(child)?.parent = None;
        }
        let new_child = self.push(kind);
        self.node_mut(new_child)?.parent = Some(node);
        self.node_mut(node)?.children.push(new_child);
        self.writes += 1;
        Ok(())
    }

    /// Replaces the children of `node` with one text node.
    ///
    /// # Errors
    /// When `node` is unknown or not an element.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DocumentError> {
        self.replace_children(node, NodeKind::Text(text.to_string()))
    }

    /// Replaces the children of `node` with an opaque markup fragment.
    ///
    /// # Errors
    /// When `node` is unknown or not an element.
    pub fn set_inner_markup(&mut self, node: NodeId, markup: &str) -> Result<(), DocumentError> {
        self.replace_children(node, NodeKind::Markup(markup.to_string()))
    }

    /// # Errors
    /// When `node` is unknown or not an element.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DocumentError> {
        let NodeKind::Element { attributes, .. } = &mut self.node_mut(node)?.kind else {
            return Err(DocumentError::NotAnElement(node));
        };
        attributes.insert(name.to_string(), value.to_string());
        self.writes += 1;
        if self.is_attached(node) {
            self.notify(MutationRecord::AttributeChanged { node, name: name.to_string() });
        }
        Ok(())
    }

    /// # Errors
    /// When `node` is unknown or not an element.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DocumentError> {
        let NodeKind::Element { attributes, .. } = &mut self.node_mut(node)?.kind else {
            return Err(DocumentError::NotAnElement(node));
        };
        if attributes.remove(name).is_some() {
            self.writes += 1;
            if self.is_attached(node) {
                self.notify(MutationRecord::AttributeChanged { node, name: name.to_string() });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            NodeKind::Text(_) | NodeKind::Markup(_) => None,
        }
    }

    /// Lowercase tag name, or `None` for text and markup nodes.
    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) | NodeKind::Markup(_) => None,
        }
    }

    #[must_use]
    pub fn is_element(&self, node: NodeId) -> bool {
        self.tag(node).is_some()
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(node.0).map_or(&[], |n| n.children.as_slice())
    }

    /// Iterates the ancestors of `node`, nearest first.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), |n| self.parent(*n))
    }

    /// Returns true if `node` is reachable from the root.
    #[must_use]
    pub fn is_attached(&self, node: NodeId) -> bool {
        node == self.root || self.ancestors(node).any(|a| a == self.root)
    }

    /// Returns true if `node` is `ancestor` or lies beneath it.
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Pre-order list of the elements in the subtree rooted at `root`.
    #[must_use]
    pub fn elements(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !self.is_element(node) {
                continue;
            }
            out.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    /// Concatenated text of the subtree (markup fragments verbatim).
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.nodes.get(node.0) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(s) | NodeKind::Markup(s) => out.push_str(s),
            NodeKind::Element { .. } => {
                for child in &data.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Serializes the children of `node` as markup.
    #[must_use]
    pub fn inner_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.serialize(*child, &mut out);
        }
        out
    }

    fn serialize(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.nodes.get(node.0) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(s) => out.push_str(&escape(s, false)),
            NodeKind::Markup(s) => out.push_str(s),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push_str(&format!(" {name}=\"{}\"", escape(value, true)));
                }
                out.push('>');
                for child in &data.children {
                    self.serialize(*child, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        title.clone_into(&mut self.title);
        self.writes += 1;
    }

    /// The `lang` attribute of the document element.
    #[must_use]
    pub fn lang(&self) -> Option<&str> {
        self.attribute(self.root, "lang")
    }

    /// Sets the `lang` attribute of the document element.
    ///
    /// # Errors
    /// Never fails for a well-formed document.
    pub fn set_lang(&mut self, lang: &str) -> Result<(), DocumentError> {
        self.set_attribute(self.root, "lang", lang)
    }

    fn notify(&self, record: MutationRecord) {
        if let Some(observer) = &self.observer
            && observer.send(record).is_err()
        {
            tracing::debug!("Mutation observer is gone");
        }
    }
}

fn escape(s: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("title", &self.title)
            .field("writes", &self.writes)
            .field("observed", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use googletest::prelude::*;

    use super::*;

    #[googletest::test]
    fn append_and_remove_track_attachment() {
        let mut doc = Document::new();
        let nav = doc.create_element("NAV");
        let link = doc.create_element("a");
        doc.append_child(nav, link).unwrap();

        expect_that!(doc.is_attached(link), eq(false));
        doc.append_child(doc.root(), nav).unwrap();
        expect_that!(doc.is_attached(link), eq(true));
        expect_that!(doc.tag(nav), some(eq("nav")));

        doc.remove(nav).unwrap();
        expect_that!(doc.is_attached(link), eq(false));
        expect_that!(doc.children(doc.root()).len(), eq(0));
    }

    #[googletest::test]
    fn append_rejects_cycles_and_text_parents() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        let text = doc.create_text("x");
        doc.append_child(outer, inner).unwrap();

        expect_that!(doc.append_child(inner, outer).is_err(), eq(true));
        expect_that!(doc.append_child(text, inner).is_err(), eq(true));
        expect_that!(doc.append_child(outer, doc.root()).is_err(), eq(true));
    }

    #[googletest::test]
    fn set_text_replaces_children_and_counts_writes() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let b = doc.create_element("b");
        doc.append_child(doc.root(), p).unwrap();
        doc.append_child(p, b).unwrap();

        doc.set_text(p, "Hello").unwrap();

        expect_that!(doc.text_content(p), eq("Hello"));
        expect_that!(doc.is_attached(b), eq(false));
        expect_that!(doc.writes(), eq(1));
    }

    #[googletest::test]
    fn inner_markup_serializes_children() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let b = doc.create_element("b");
        let text = doc.create_text("a < b");
        doc.append_child(p, b).unwrap();
        doc.append_child(b, text).unwrap();
        doc.set_attribute(b, "class", "x\"y").unwrap();

        expect_that!(doc.inner_markup(p), eq("<b class=\"x&quot;y\">a &lt; b</b>"));

        doc.set_inner_markup(p, "<i>raw</i>").unwrap();
        expect_that!(doc.inner_markup(p), eq("<i>raw</i>"));
    }

    #[googletest::test]
    fn elements_are_listed_in_document_order() {
        let mut doc = Document::new();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        let c = doc.create_element("c");
        let text = doc.create_text("t");
        doc.append_child(a, b).unwrap();
        doc.append_child(a, text).unwrap();
        doc.append_child(a, c).unwrap();

        assert_eq!(doc.elements(a), vec![a, b, c]);
    }

    #[tokio::test]
    async fn observer_sees_only_attached_changes() {
        let mut doc = Document::new();
        let mut records = doc.observe();
        let list = doc.create_element("ul");
        let item = doc.create_element("li");

        doc.append_child(list, item).unwrap();
        doc.set_attribute(item, "data-i18n", "a").unwrap();
        doc.append_child(doc.root(), list).unwrap();
        doc.set_attribute(item, "data-i18n", "b").unwrap();

        assert_eq!(records.recv().await, Some(MutationRecord::Inserted(list)));
        assert_eq!(
            records.recv().await,
            Some(MutationRecord::AttributeChanged { node: item, name: "data-i18n".to_string() })
        );
        assert!(records.try_recv().is_err());
    }

    #[googletest::test]
    fn lang_lives_on_the_root() {
        let mut doc = Document::new();
        doc.set_lang("zh-TW").unwrap();

        expect_that!(doc.lang(), some(eq("zh-TW")));
    }
}
