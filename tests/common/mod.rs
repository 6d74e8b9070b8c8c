//! Helpers shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, unreachable_pub)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use page_i18n::Locale;
use page_i18n::config::EngineSettings;
use page_i18n::controller::{
    LocaleStorage,
    MemoryStorage,
    StaticLanguagePreference,
};
use page_i18n::dictionary::{
    DictionarySource,
    MemorySource,
    SourceError,
};
use page_i18n::document::{
    Document,
    NodeId,
};
use page_i18n::I18n;

pub const EN: &str = r#"{
  "nav": { "home": "Home", "blog": "Blog" },
  "meta": { "title": { "title": "My Site", "short": "Site" } },
  "logo": "Company logo",
  "intro": "<b>Welcome</b>"
}"#;

pub const FR: &str = r#"{
  "nav": { "home": "Accueil" },
  "meta": { "title": { "title": "Mon site" } },
  "logo": "Logo de l'entreprise",
  "intro": "<b>Bienvenue</b>"
}"#;

pub const DE: &str = r#"{
  "nav": { "home": "Startseite", "blog": "Blog (de)" },
  "logo": "Firmenlogo"
}"#;

pub const ZH_TW: &str = r#"{ "nav": { "home": "首頁" } }"#;

/// Memory dictionaries, each fetch delayed by a per-locale duration.
#[derive(Debug, Default)]
pub struct DelayedSource {
    inner: MemorySource,
    delays: HashMap<String, Duration>,
}

impl DelayedSource {
    pub fn new(inner: MemorySource) -> Self {
        Self { inner, delays: HashMap::new() }
    }

    pub fn delay(mut self, locale: &str, delay: Duration) -> Self {
        self.delays.insert(Locale::parse(locale).unwrap().to_string(), delay);
        self
    }
}

#[async_trait]
impl DictionarySource for DelayedSource {
    async fn fetch(&self, locale: &Locale) -> Result<String, SourceError> {
        if let Some(delay) = self.delays.get(locale.as_str()) {
            tokio::time::sleep(*delay).await;
        }
        self.inner.fetch(locale).await
    }
}

pub fn dictionaries() -> MemorySource {
    MemorySource::new().with("en", EN).with("fr", FR).with("de", DE).with("zh-TW", ZH_TW)
}

/// An engine over `source` with in-memory storage and no platform preference.
pub fn engine_with(source: Arc<dyn DictionarySource>, storage: Arc<dyn LocaleStorage>) -> I18n {
    engine_with_settings(EngineSettings::default(), source, storage)
}

pub fn engine_with_settings(
    settings: EngineSettings,
    source: Arc<dyn DictionarySource>,
    storage: Arc<dyn LocaleStorage>,
) -> I18n {
    I18n::builder(settings, source)
        .storage(storage)
        .preference(Arc::new(StaticLanguagePreference::default()))
        .build()
}

pub fn engine() -> I18n {
    engine_with(Arc::new(dictionaries()), Arc::new(MemoryStorage::new()))
}

/// Nodes of the page built by [`build_page`].
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub title: NodeId,
    pub home: NodeId,
    pub blog: NodeId,
    pub logo: NodeId,
    pub intro: NodeId,
}

/// A small page: a bound title, two nav links, an image and a markup block.
pub fn build_page(doc: &mut Document) -> Page {
    doc.set_title("Static title");
    let root = doc.root();

    let title = doc.create_element("title");
    doc.set_attribute(title, "data-i18n", "meta.title").unwrap();
    doc.append_child(root, title).unwrap();

    let nav = doc.create_element("nav");
    doc.append_child(root, nav).unwrap();
    let home = link(doc, nav, "nav.home", "home");
    let blog = link(doc, nav, "nav.blog", "blog");

    let logo = doc.create_element("img");
    doc.set_attribute(logo, "data-i18n-attr", "alt,title=logo").unwrap();
    doc.set_attribute(logo, "alt", "logo").unwrap();
    doc.append_child(root, logo).unwrap();

    let intro = doc.create_element("section");
    doc.set_attribute(intro, "data-i18n-html", "intro").unwrap();
    doc.append_child(root, intro).unwrap();

    Page { title, home, blog, logo, intro }
}

pub fn link(doc: &mut Document, parent: NodeId, key: &str, text: &str) -> NodeId {
    let node = doc.create_element("a");
    doc.set_attribute(node, "data-i18n", key).unwrap();
    let content = doc.create_text(text);
    doc.append_child(node, content).unwrap();
    doc.append_child(parent, node).unwrap();
    node
}

/// Builds the page inside the engine's document.
pub async fn page_in(engine: &I18n) -> Page {
    let document = engine.document();
    let mut doc = document.lock().await;
    build_page(&mut doc)
}
