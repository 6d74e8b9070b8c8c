//! Locale selection and the public engine handle.
mod platform;
mod state;
mod storage;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{
    Mutex,
    broadcast,
};

pub use platform::{
    EnvLanguagePreference,
    LanguagePreference,
    StaticLanguagePreference,
};
pub use state::{
    Active,
    EngineState,
    Phase,
};
pub use storage::{
    FileStorage,
    LocaleStorage,
    MemoryStorage,
    StorageError,
};

use crate::config::EngineSettings;
use crate::dictionary::{
    DictionaryError,
    DictionarySource,
    DictionaryStore,
    DictionaryTree,
    Entry,
};
use crate::document::{
    Document,
    MutationRecord,
    NodeId,
};
use crate::locale::Locale;
use crate::render::{
    ApplyStats,
    RenderIndex,
};
use crate::watcher::{
    self,
    StructuralWatcher,
};

/// Capacity of the locale-changed channel
const EVENT_CAPACITY: usize = 16;

/// Broadcast after every successful switch, including one to the locale
/// already in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleChanged {
    pub locale: Locale,
}

/// How a switch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The locale is now in effect. It is the default locale when the
    /// requested one could not be loaded.
    Switched(Locale),
    /// The requested locale was already in effect
    Unchanged,
    /// A later switch started before this one finished
    Superseded,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwitchError {
    #[error("'{0}' is not a locale identifier")]
    InvalidLocale(String),
    /// Neither the requested locale nor the default could be loaded
    #[error("No dictionary could be loaded for '{locale}': {source}")]
    Unavailable {
        locale: Locale,
        #[source]
        source: DictionaryError,
    },
}

/// Builds an [`I18n`] engine.
#[derive(Debug)]
pub struct I18nBuilder {
    /// Validated engine settings
    settings: EngineSettings,
    /// Where dictionaries come from
    source: Arc<dyn DictionarySource>,
    /// Defaults to [`MemoryStorage`]
    storage: Arc<dyn LocaleStorage>,
    /// Defaults to [`EnvLanguagePreference`]
    preference: Arc<dyn LanguagePreference>,
    /// Starting document
    document: Document,
}

impl I18nBuilder {
    /// Persists the chosen locale in `storage` (default: in memory).
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn LocaleStorage>) -> Self {
        self.storage = storage;
        self
    }

    /// Reads platform preferences from `preference` (default: environment).
    #[must_use]
    pub fn preference(mut self, preference: Arc<dyn LanguagePreference>) -> Self {
        self.preference = preference;
        self
    }

    /// Renders into `document` (default: an empty document).
    #[must_use]
    pub fn document(mut self, document: Document) -> Self {
        self.document = document;
        self
    }

    #[must_use]
    pub fn build(self) -> I18n {
        let store = DictionaryStore::new(self.source, self.settings.key_separator.clone());
        let render = RenderIndex::new(self.settings.markers.clone());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        I18n {
            inner: Arc::new(Inner {
                store,
                state: EngineState::new(self.document, render),
                storage: self.storage,
                preference: self.preference,
                events,
                settings: self.settings,
            }),
        }
    }
}

/// Everything an [`I18n`] handle shares with its clones.
struct Inner {
    /// Settings the engine was built with
    settings: EngineSettings,
    /// Dictionary cache
    store: DictionaryStore,
    /// Document, render index and active locale
    state: EngineState,
    /// Persisted locale choice
    storage: Arc<dyn LocaleStorage>,
    /// Platform language preferences
    preference: Arc<dyn LanguagePreference>,
    /// Locale change notifications
    events: broadcast::Sender<LocaleChanged>,
}

/// Handle to a localization engine. Clones share the same engine.
#[derive(Clone)]
pub struct I18n {
    /// Shared engine
    inner: Arc<Inner>,
}

impl I18n {
    #[must_use]
    pub fn builder(settings: EngineSettings, source: Arc<dyn DictionarySource>) -> I18nBuilder {
        I18nBuilder {
            settings,
            source,
            storage: Arc::new(MemoryStorage::new()),
            preference: Arc::new(EnvLanguagePreference),
            document: Document::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn store(&self) -> &DictionaryStore {
        &self.inner.store
    }

    /// The document the engine renders into.
    #[must_use]
    pub fn document(&self) -> Arc<Mutex<Document>> {
        Arc::clone(&self.inner.state.document)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LocaleChanged> {
        self.inner.events.subscribe()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.state.active.lock().await.phase.clone()
    }

    /// The locale in effect, if any switch has succeeded.
    pub async fn locale(&self) -> Option<Locale> {
        self.inner.state.active.lock().await.ready.clone()
    }

    /// Looks `key` up in the dictionary in effect.
    pub async fn t(&self, key: &str) -> Option<Entry> {
        self.inner.state.dictionary().await?.resolve(key).cloned()
    }

    /// Text of `key` in the dictionary in effect.
    pub async fn text(&self, key: &str) -> Option<String> {
        self.inner.state.dictionary().await?.resolve_text(key).map(ToString::to_string)
    }

    /// Text of `key`, or `fallback` when it does not resolve.
    pub async fn text_or(&self, key: &str, fallback: &str) -> String {
        self.text(key).await.unwrap_or_else(|| fallback.to_string())
    }

    /// Picks the starting locale: `override_locale`, then the persisted
    /// choice, then platform preferences, then the default locale.
    pub async fn detect(&self, override_locale: Option<&str>) -> Locale {
        if let Some(locale) = override_locale.and_then(Locale::parse) {
            tracing::debug!(%locale, "Locale from override");
            return locale;
        }

        match self.inner.storage.get(&self.inner.settings.storage_key).await {
            Ok(Some(stored)) => {
                if let Some(locale) = Locale::parse(&stored) {
                    tracing::debug!(%locale, "Locale from storage");
                    return locale;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to read persisted locale"),
        }

        let supported = self.inner.settings.supported_locales();
        for preferred in self.inner.preference.preferred() {
            let Some(locale) = Locale::parse(&preferred) else {
                continue;
            };
            let Some(supported) = &supported else {
                tracing::debug!(%locale, "Locale from platform preference");
                return locale;
            };
            if let Some(found) = supported
                .iter()
                .find(|s| **s == locale)
                .or_else(|| supported.iter().find(|s| s.base() == locale.base()))
            {
                tracing::debug!(locale = %found, "Supported locale from platform preference");
                return found.clone();
            }
        }

        self.inner.settings.default_locale()
    }

    /// Indexes the whole document, detects the starting locale and switches
    /// to it.
    ///
    /// # Errors
    /// See [`switch`](Self::switch).
    pub async fn init(&self, override_locale: Option<&str>) -> Result<SwitchOutcome, SwitchError> {
        {
            let (document, mut render) = self.inner.state.lock_document_and_render().await;
            let added = render.index_subtree(&document, document.root());
            tracing::debug!(bindings = added, "Indexed document");
        }
        let locale = self.detect(override_locale).await;
        self.switch(locale.as_str()).await
    }

    /// Makes `input` the locale in effect.
    ///
    /// Loads the locale and the fallback locale concurrently, renders every
    /// binding with the merged dictionary, persists the choice, sets the
    /// document language and broadcasts [`LocaleChanged`]. When the locale
    /// cannot be loaded the default locale is tried once instead.
    ///
    /// # Errors
    /// - `input` is not a locale identifier
    /// - No dictionary could be loaded; the document keeps its last state
    pub async fn switch(&self, input: &str) -> Result<SwitchOutcome, SwitchError> {
        let target = Locale::parse(input).ok_or_else(|| SwitchError::InvalidLocale(input.to_string()))?;

        let generation = {
            let mut active = self.inner.state.active.lock().await;
            if active.phase == Phase::Ready(target.clone()) {
                drop(active);
                tracing::debug!(locale = %target, "Locale already in effect");
                self.broadcast(&target);
                return Ok(SwitchOutcome::Unchanged);
            }
            active.generation += 1;
            active.phase = Phase::Loading(target.clone());
            active.generation
        };

        let default = self.inner.settings.default_locale();
        let mut attempts = vec![target.clone()];
        if target != default {
            attempts.push(default);
        }

        let mut last_error = None;
        for locale in attempts {
            match self.load_merged(&locale).await {
                Ok(dictionary) => return Ok(self.commit(generation, locale, dictionary).await),
                Err(e) => {
                    tracing::warn!(%locale, error = %e, "Locale unavailable");
                    last_error = Some(e);
                }
            }
        }

        let mut active = self.inner.state.active.lock().await;
        if active.generation != generation {
            return Ok(SwitchOutcome::Superseded);
        }
        active.phase = active.ready.clone().map_or(Phase::Uninitialized, Phase::Ready);
        drop(active);

        let source = last_error.unwrap_or_else(|| DictionaryError::unavailable(&target, "no attempt"));
        Err(SwitchError::Unavailable { locale: target, source })
    }

    /// Loads `locale` and the fallback locale and layers the first over the
    /// second. A missing fallback only costs the keys it would have filled.
    async fn load_merged(&self, locale: &Locale) -> Result<Arc<DictionaryTree>, DictionaryError> {
        let fallback = self.inner.settings.fallback_locale();
        if fallback == *locale {
            return self.inner.store.load(locale).await;
        }

        let (primary, secondary) =
            tokio::join!(self.inner.store.load(locale), self.inner.store.load(&fallback));
        let primary = primary?;
        match secondary {
            Ok(secondary) => Ok(Arc::new(DictionaryTree::merge(&primary, &secondary))),
            Err(e) => {
                tracing::warn!(%fallback, error = %e, "Fallback dictionary unavailable");
                Ok(primary)
            }
        }
    }

    /// Puts a loaded dictionary into effect unless a later switch started.
    async fn commit(
        &self,
        generation: u64,
        locale: Locale,
        dictionary: Arc<DictionaryTree>,
    ) -> SwitchOutcome {
        let state = &self.inner.state;
        let (mut document, mut render, mut active) = state.lock_all().await;
        if active.generation != generation {
            tracing::debug!(%locale, "Discarding superseded switch");
            return SwitchOutcome::Superseded;
        }

        let stats = render.apply(&mut document, &dictionary);
        if let Err(e) = document.set_lang(&locale.to_bcp47()) {
            tracing::warn!(error = %e, "Failed to set document language");
        }
        active.phase = Phase::Ready(locale.clone());
        active.ready = Some(locale.clone());
        active.dictionary = Some(dictionary);
        drop(render);
        drop(document);

        // Still holding `active`: no other switch can start until the choice
        // is persisted and announced.
        if let Err(e) = self.inner.storage.set(&self.inner.settings.storage_key, locale.as_str()).await
        {
            tracing::warn!(error = %e, "Failed to persist locale");
        }
        tracing::info!(%locale, written = stats.written, pruned = stats.pruned, "Switched locale");
        self.broadcast(&locale);
        drop(active);

        SwitchOutcome::Switched(locale)
    }

    fn broadcast(&self, locale: &Locale) {
        if self.inner.events.send(LocaleChanged { locale: locale.clone() }).is_err() {
            tracing::debug!(%locale, "No locale change subscribers");
        }
    }

    /// Re-applies the dictionary in effect to every binding.
    pub async fn render(&self) -> ApplyStats {
        let (mut document, mut render, active) = self.inner.state.lock_all().await;
        match active.dictionary.as_deref() {
            Some(dictionary) => render.apply(&mut document, dictionary),
            None => ApplyStats::default(),
        }
    }

    /// Indexes and renders a subtree attached without an observer.
    pub async fn notify_inserted(&self, root: NodeId) -> ApplyStats {
        watcher::absorb(&self.inner.state, vec![MutationRecord::Inserted(root)]).await
    }

    /// Starts observing the document. Run the returned watcher (for example
    /// with [`StructuralWatcher::spawn`]) to translate inserted content.
    pub async fn watch(&self) -> StructuralWatcher {
        let records = self.inner.state.document.lock().await.observe();
        StructuralWatcher::new(
            self.inner.state.clone(),
            records,
            self.inner.settings.coalesce_delay(),
        )
    }
}

impl std::fmt::Debug for I18n {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I18n")
            .field("settings", &self.inner.settings)
            .field("store", &self.inner.store)
            .field("state", &self.inner.state)
            .finish_non_exhaustive()
    }
}
