//! Keeps late-inserted content translated.
//!
//! The watcher drains the document's mutation records in batches. Each batch
//! is handled by one pass that indexes the inserted subtrees, re-reads changed
//! markers and renders just the new bindings with the dictionary in effect.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::controller::EngineState;
use crate::dictionary::DictionaryTree;
use crate::document::{
    Document,
    MutationRecord,
    NodeId,
};
use crate::render::{
    ApplyStats,
    RenderIndex,
};

/// Consumes mutation records until the document stops reporting them.
#[derive(Debug)]
pub struct StructuralWatcher {
    /// Shared engine state the passes lock
    state: EngineState,
    /// Records reported by the document
    records: UnboundedReceiver<MutationRecord>,
    /// How long to wait for more records after the first of a batch
    delay: Duration,
}

impl StructuralWatcher {
    #[must_use]
    pub const fn new(
        state: EngineState,
        records: UnboundedReceiver<MutationRecord>,
        delay: Duration,
    ) -> Self {
        Self { state, records, delay }
    }

    /// Processes batches until the document disconnects its observer.
    pub async fn run(mut self) {
        while let Some(first) = self.records.recv().await {
            if self.delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.delay).await;
            }

            let mut batch = vec![first];
            while let Ok(record) = self.records.try_recv() {
                batch.push(record);
            }

            let size = batch.len();
            let stats = absorb(&self.state, batch).await;
            if stats.written > 0 || stats.pruned > 0 {
                tracing::debug!(records = size, ?stats, "Absorbed structural changes");
            }
        }
        tracing::debug!("Structural watcher stopped");
    }

    /// Runs the watcher on the tokio runtime.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Handles one batch of records against the shared engine state.
pub async fn absorb(state: &EngineState, records: Vec<MutationRecord>) -> ApplyStats {
    let (mut document, mut render, active) = state.lock_all().await;
    let dictionary = active.dictionary.clone();
    drop(active);
    absorb_locked(&mut document, &mut render, dictionary.as_deref(), records)
}

/// One coalesced pass.
///
/// Roots are de-duplicated, detached ones and ones nested in another root
/// are dropped, nodes whose marker attribute changed are re-bound. Without a
/// dictionary the new bindings are indexed but not written.
pub fn absorb_locked(
    doc: &mut Document,
    index: &mut RenderIndex,
    dictionary: Option<&DictionaryTree>,
    records: Vec<MutationRecord>,
) -> ApplyStats {
    let mut roots: Vec<NodeId> = Vec::new();
    let mut changed: Vec<NodeId> = Vec::new();
    for record in records {
        match record {
            MutationRecord::Inserted(node) => {
                if !roots.contains(&node) {
                    roots.push(node);
                }
            }
            MutationRecord::AttributeChanged { node, name } => {
                if index.markers().is_marker(&name) && !changed.contains(&node) {
                    changed.push(node);
                }
            }
        }
    }

    roots.retain(|root| doc.is_attached(*root));
    let nested: Vec<NodeId> = roots
        .iter()
        .copied()
        .filter(|root| roots.iter().any(|other| other != root && doc.contains(*other, *root)))
        .collect();
    roots.retain(|root| !nested.contains(root));

    if roots.is_empty() && changed.is_empty() {
        return ApplyStats::default();
    }

    let previous: Vec<_> = changed.into_iter().map(|node| (node, index.unbind(node))).collect();
    let start = index.len();
    for (node, bindings) in previous {
        index.bind(doc, node, bindings);
    }
    for root in roots {
        index.index_subtree(doc, root);
    }

    match dictionary {
        Some(dictionary) => index.apply_from(doc, dictionary, start),
        None => ApplyStats::default(),
    }
}
