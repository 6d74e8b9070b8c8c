//! Structural change records emitted by an observed document.

use super::NodeId;

/// One structural change to the attached part of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    /// A subtree rooted at this node was attached
    Inserted(NodeId),
    /// An attribute of an attached element was set or removed
    AttributeChanged { node: NodeId, name: String },
}

impl MutationRecord {
    #[must_use]
    pub const fn node(&self) -> NodeId {
        match self {
            Self::Inserted(node) | Self::AttributeChanged { node, .. } => *node,
        }
    }
}
