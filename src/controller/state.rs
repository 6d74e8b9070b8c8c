//! State shared by the controller and the structural watcher.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{
    Mutex,
    MutexGuard,
};

use crate::dictionary::DictionaryTree;
use crate::document::Document;
use crate::locale::Locale;
use crate::render::RenderIndex;

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No switch has succeeded yet
    Uninitialized,
    /// A switch to this locale is in flight
    Loading(Locale),
    /// This locale's merged dictionary is rendered
    Ready(Locale),
}

/// The locale choice and the dictionary currently in effect.
#[derive(Debug)]
pub struct Active {
    pub phase: Phase,
    /// Last locale that reached `Ready`, restored when a switch fails
    pub ready: Option<Locale>,
    /// Bumped by every switch that starts loading; only the latest may finish
    pub generation: u64,
    /// Merged dictionary of `ready`
    pub dictionary: Option<Arc<DictionaryTree>>,
}

impl Default for Active {
    fn default() -> Self {
        Self { phase: Phase::Uninitialized, ready: None, generation: 0, dictionary: None }
    }
}

/// Engine state behind shared handles.
///
/// # Lock order
///
/// When holding several locks at once, always acquire them in this order:
/// 1. `document`
/// 2. `render`
/// 3. `active`
#[derive(Clone)]
pub struct EngineState {
    pub document: Arc<Mutex<Document>>,
    pub render: Arc<Mutex<RenderIndex>>,
    pub active: Arc<Mutex<Active>>,
}

impl EngineState {
    #[must_use]
    pub fn new(document: Document, render: RenderIndex) -> Self {
        Self {
            document: Arc::new(Mutex::new(document)),
            render: Arc::new(Mutex::new(render)),
            active: Arc::new(Mutex::new(Active::default())),
        }
    }

    /// Locks `document` and `render`, in lock order.
    pub async fn lock_document_and_render(
        &self,
    ) -> (MutexGuard<'_, Document>, MutexGuard<'_, RenderIndex>) {
        let document = self.document.lock().await;
        let render = self.render.lock().await;
        (document, render)
    }

    /// Locks `document`, `render` and `active`, in lock order.
    pub async fn lock_all(
        &self,
    ) -> (MutexGuard<'_, Document>, MutexGuard<'_, RenderIndex>, MutexGuard<'_, Active>) {
        let document = self.document.lock().await;
        let render = self.render.lock().await;
        let active = self.active.lock().await;
        (document, render, active)
    }

    /// The merged dictionary in effect, if any switch has succeeded.
    pub async fn dictionary(&self) -> Option<Arc<DictionaryTree>> {
        self.active.lock().await.dictionary.clone()
    }
}

impl fmt::Debug for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineState")
            .field("document", &"<Document>")
            .field("render", &"<RenderIndex>")
            .field("active", &"<Active>")
            .finish()
    }
}
