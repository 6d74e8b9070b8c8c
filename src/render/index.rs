//! The flat list of bindings discovered in a document.

use std::collections::HashSet;
use std::ops::AddAssign;

use super::binding::{
    Binding,
    Marker,
};
use crate::config::MarkersConfig;
use crate::dictionary::DictionaryTree;
use crate::document::{
    Document,
    NodeId,
};

/// Counters of one apply pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Bindings whose content was written
    pub written: usize,
    /// Bindings already showing the right content
    pub unchanged: usize,
    /// Bindings dropped because their node left the document
    pub pruned: usize,
}

impl AddAssign for ApplyStats {
    fn add_assign(&mut self, other: Self) {
        self.written += other.written;
        self.unchanged += other.unchanged;
        self.pruned += other.pruned;
    }
}

/// Every known binding, in discovery order.
///
/// A (node, marker) pair is indexed at most once; bindings of detached nodes
/// are pruned during the next apply.
#[derive(Debug, Clone, Default)]
pub struct RenderIndex {
    /// Marker attribute names to look for
    markers: MarkersConfig,
    /// Bindings in discovery order
    bindings: Vec<Binding>,
    /// (node, marker) pairs present in `bindings`
    indexed: HashSet<(NodeId, Marker)>,
}

impl RenderIndex {
    #[must_use]
    pub fn new(markers: MarkersConfig) -> Self {
        Self { markers, bindings: Vec::new(), indexed: HashSet::new() }
    }

    #[must_use]
    pub const fn markers(&self) -> &MarkersConfig {
        &self.markers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Indexes the markers of `root` and every element beneath it.
    ///
    /// Returns the number of bindings added.
    pub fn index_subtree(&mut self, doc: &Document, root: NodeId) -> usize {
        let before = self.bindings.len();
        for node in doc.elements(root) {
            self.index_node(doc, node, None);
        }
        let added = self.bindings.len() - before;
        if added > 0 {
            tracing::debug!(%root, added, "Indexed bindings");
        }
        added
    }

    fn index_node(&mut self, doc: &Document, node: NodeId, mut previous: Option<Vec<Binding>>) {
        for marker in Marker::ALL {
            if self.indexed.contains(&(node, marker)) {
                continue;
            }
            match Binding::read(doc, node, marker, &self.markers) {
                Ok(Some(mut binding)) => {
                    if let Some(old) = previous.as_mut().and_then(|p| take_marker(p, marker)) {
                        binding.inherit(old);
                    }
                    self.indexed.insert((node, marker));
                    self.bindings.push(binding);
                }
                Ok(None) => {}
                Err(e) => tracing::debug!(error = %e, "Skipping malformed marker"),
            }
        }
    }

    /// Re-reads the markers of `node` after one of them changed.
    ///
    /// A marker that is still present keeps the original content captured when
    /// it was first indexed.
    pub fn rebind(&mut self, doc: &Document, node: NodeId) {
        let previous = self.unbind(node);
        self.bind(doc, node, previous);
    }

    /// Removes and returns every binding of `node`.
    ///
    /// Later bindings shift down, so positions taken from [`len`](Self::len)
    /// before this call no longer mark where new bindings start.
    pub fn unbind(&mut self, node: NodeId) -> Vec<Binding> {
        let (previous, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.bindings).into_iter().partition(|b| b.node() == node);
        self.bindings = kept;
        self.indexed.retain(|(n, _)| *n != node);
        previous
    }

    /// Indexes the markers of `node` alone, carrying over the originals of
    /// `previous` bindings with the same marker.
    ///
    /// Returns the number of bindings added. Detached nodes are not indexed.
    pub fn bind(&mut self, doc: &Document, node: NodeId, previous: Vec<Binding>) -> usize {
        if !doc.is_attached(node) {
            return 0;
        }
        let before = self.bindings.len();
        self.index_node(doc, node, Some(previous));
        self.bindings.len() - before
    }

    /// Applies `dict` to every binding.
    pub fn apply(&mut self, doc: &mut Document, dict: &DictionaryTree) -> ApplyStats {
        self.apply_from(doc, dict, 0)
    }

    /// Applies `dict` to the bindings at position `start` and later, i.e. the
    /// ones added since [`len`](Self::len) returned `start`.
    pub fn apply_from(&mut self, doc: &mut Document, dict: &DictionaryTree, start: usize) -> ApplyStats {
        let mut stats = ApplyStats::default();
        let mut index = start;
        while let Some(binding) = self.bindings.get_mut(index) {
            if !doc.is_attached(binding.node()) {
                let pruned = self.bindings.remove(index);
                self.indexed.remove(&(pruned.node(), pruned.marker()));
                stats.pruned += 1;
                continue;
            }
            match binding.apply(doc, dict) {
                Ok(true) => stats.written += 1,
                Ok(false) => stats.unchanged += 1,
                Err(e) => {
                    tracing::debug!(node = %binding.node(), error = %e, "Binding write failed");
                }
            }
            index += 1;
        }
        stats
    }
}

fn take_marker(bindings: &mut Vec<Binding>, marker: Marker) -> Option<Binding> {
    let pos = bindings.iter().position(|b| b.marker() == marker)?;
    Some(bindings.swap_remove(pos))
}
