//! Dictionary cache with request de-duplication.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{
    AtomicUsize,
    Ordering,
};

use futures::FutureExt;
use futures::future::{
    BoxFuture,
    Shared,
};
use tokio::sync::Mutex;

use super::error::DictionaryError;
use super::source::{
    DictionarySource,
    parse_dictionary,
};
use super::DictionaryTree;
use crate::locale::Locale;

/// A load in progress, awaited by every caller asking for the same locale.
type PendingLoad = Shared<BoxFuture<'static, Result<Arc<DictionaryTree>, DictionaryError>>>;

/// Cache entry for one locale.
enum Slot {
    /// Fetch issued but not settled yet
    Loading(PendingLoad),
    /// Successfully loaded; kept for the lifetime of the store
    Ready(Arc<DictionaryTree>),
}

/// Fetches and caches one dictionary per locale.
///
/// Concurrent loads of a locale share one fetch. Successes are cached forever;
/// failures are forgotten so the next load retries.
#[derive(Clone)]
pub struct DictionaryStore {
    /// Where dictionaries come from
    source: Arc<dyn DictionarySource>,
    /// Key separator handed to every parsed tree
    separator: String,
    /// Locale -> cache slot
    slots: Arc<Mutex<HashMap<Locale, Slot>>>,
    /// Number of fetches issued to the source
    fetches: Arc<AtomicUsize>,
}

impl DictionaryStore {
    #[must_use]
    pub fn new(source: Arc<dyn DictionarySource>, separator: impl Into<String>) -> Self {
        Self {
            source,
            separator: separator.into(),
            slots: Arc::new(Mutex::new(HashMap::new())),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the dictionary for `locale`, fetching it at most once at a time.
    ///
    /// # Errors
    /// [`DictionaryError::Unavailable`] when the fetch or parse fails.
    pub async fn load(&self, locale: &Locale) -> Result<Arc<DictionaryTree>, DictionaryError> {
        let pending = {
            let mut slots = self.slots.lock().await;
            match slots.get(locale) {
                Some(Slot::Ready(tree)) => {
                    tracing::debug!(%locale, "Dictionary cache hit");
                    return Ok(Arc::clone(tree));
                }
                Some(Slot::Loading(pending)) => {
                    tracing::debug!(%locale, "Joining in-flight dictionary load");
                    pending.clone()
                }
                None => {
                    let pending = self.fetch_and_parse(locale.clone()).boxed().shared();
                    slots.insert(locale.clone(), Slot::Loading(pending.clone()));
                    pending
                }
            }
        };

        let result = pending.clone().await;

        // Only the load that is still registered may settle the slot.
        let mut slots = self.slots.lock().await;
        if let Some(Slot::Loading(current)) = slots.get(locale)
            && current.ptr_eq(&pending)
        {
            match &result {
                Ok(tree) => {
                    slots.insert(locale.clone(), Slot::Ready(Arc::clone(tree)));
                }
                Err(_) => {
                    slots.remove(locale);
                }
            }
        }

        result
    }

    /// Returns the dictionary for `locale` if it is already loaded.
    pub async fn cached(&self, locale: &Locale) -> Option<Arc<DictionaryTree>> {
        match self.slots.lock().await.get(locale) {
            Some(Slot::Ready(tree)) => Some(Arc::clone(tree)),
            Some(Slot::Loading(_)) | None => None,
        }
    }

    /// How many fetches have been issued to the source so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn fetch_and_parse(
        &self,
        locale: Locale,
    ) -> impl Future<Output = Result<Arc<DictionaryTree>, DictionaryError>> + Send + 'static {
        let source = Arc::clone(&self.source);
        let separator = self.separator.clone();
        let fetches = Arc::clone(&self.fetches);

        async move {
            fetches.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%locale, "Fetching dictionary");

            let text = source.fetch(&locale).await.map_err(|e| {
                tracing::warn!(%locale, error = %e, "Dictionary fetch failed");
                DictionaryError::unavailable(&locale, e)
            })?;

            let tree = parse_dictionary(&text, &separator).map_err(|reason| {
                tracing::warn!(%locale, %reason, "Dictionary parse failed");
                DictionaryError::unavailable(&locale, reason)
            })?;

            Ok(Arc::new(tree))
        }
    }
}

impl std::fmt::Debug for DictionaryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryStore")
            .field("source", &self.source)
            .field("separator", &self.separator)
            .field("slots", &"<HashMap<Locale, Slot>>")
            .field("fetches", &self.fetch_count())
            .finish()
    }
}
