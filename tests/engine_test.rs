//! End-to-end behavior of the engine over an in-memory document.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    DelayedSource,
    build_page,
    dictionaries,
    engine,
    engine_with,
    engine_with_settings,
    link,
    page_in,
};
use googletest::prelude::*;
use page_i18n::config::EngineSettings;
use page_i18n::dictionary::MemorySource;
use page_i18n::document::Document;
use page_i18n::controller::{
    FileStorage,
    LocaleStorage,
    MemoryStorage,
    Phase,
    StaticLanguagePreference,
};
use page_i18n::{
    I18n,
    Locale,
    LocaleChanged,
    SwitchError,
    SwitchOutcome,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::TempDir;

fn locale(s: &str) -> Locale {
    Locale::parse(s).unwrap()
}

const fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[tokio::test]
async fn init_renders_every_binding_with_fallback() {
    let engine = engine();
    let page = page_in(&engine).await;

    let outcome = engine.init(Some("fr")).await.unwrap();

    assert_eq!(outcome, SwitchOutcome::Switched(locale("fr")));
    assert_eq!(engine.phase().await, Phase::Ready(locale("fr")));
    let document = engine.document();
    let doc = document.lock().await;
    assert_eq!(doc.title(), "Mon site");
    assert_eq!(doc.text_content(page.home), "Accueil");
    assert_eq!(doc.text_content(page.blog), "Blog");
    assert_eq!(doc.attribute(page.logo, "alt"), Some("Logo de l'entreprise"));
    assert_eq!(doc.attribute(page.logo, "title"), Some("Logo de l'entreprise"));
    assert_eq!(doc.inner_markup(page.intro), "<b>Bienvenue</b>");
    assert_eq!(doc.lang(), Some("fr"));
}

#[tokio::test]
async fn render_twice_writes_nothing() {
    let engine = engine();
    page_in(&engine).await;
    engine.init(Some("de")).await.unwrap();
    let writes = engine.document().lock().await.writes();

    let stats = engine.render().await;

    assert_eq!(stats.written, 0);
    assert_eq!(stats.unchanged, 5);
    assert_eq!(engine.document().lock().await.writes(), writes);
}

#[tokio::test]
async fn switching_away_and_back_restores_the_same_document() {
    let engine = engine();
    let page = page_in(&engine).await;
    engine.init(Some("fr")).await.unwrap();
    let snapshot = |doc: &Document| {
        (doc.inner_markup(doc.root()), doc.title().to_string(), doc.lang().map(str::to_string))
    };
    let first = snapshot(&*engine.document().lock().await);

    engine.switch("de").await.unwrap();
    {
        let document = engine.document();
        let doc = document.lock().await;
        assert_eq!(doc.text_content(page.home), "Startseite");
        assert_eq!(doc.title(), "My Site");
        assert_eq!(doc.inner_markup(page.intro), "<b>Welcome</b>");
    }
    engine.switch("fr").await.unwrap();

    assert_eq!(snapshot(&*engine.document().lock().await), first);
}

#[tokio::test]
async fn unresolved_keys_keep_static_content() {
    let source = dictionaries().with("en", "{}").with("ja", r#"{"nav": {"home": "ホーム"}}"#);
    let engine = engine_with(Arc::new(source), Arc::new(MemoryStorage::new()));
    let page = page_in(&engine).await;

    engine.init(Some("ja")).await.unwrap();

    let document = engine.document();
    let doc = document.lock().await;
    assert_eq!(doc.text_content(page.home), "ホーム");
    assert_eq!(doc.text_content(page.blog), "blog");
    assert_eq!(doc.title(), "Static title");
    assert_eq!(doc.attribute(page.logo, "alt"), Some("logo"));
    assert_eq!(doc.attribute(page.logo, "title"), None);
}

#[rstest]
#[case::earlier_switch_finishes_last(300, 10)]
#[case::earlier_switch_finishes_first(10, 300)]
#[tokio::test(start_paused = true)]
async fn latest_switch_wins(#[case] fr_delay: u64, #[case] de_delay: u64) {
    let source =
        DelayedSource::new(dictionaries()).delay("fr", ms(fr_delay)).delay("de", ms(de_delay));
    let storage = MemoryStorage::new();
    let engine = engine_with(Arc::new(source), Arc::new(storage.clone()));
    let page = page_in(&engine).await;
    engine.init(Some("en")).await.unwrap();

    let (first, second) = tokio::join!(engine.switch("fr"), async {
        tokio::task::yield_now().await;
        engine.switch("de").await
    });

    assert_eq!(first.unwrap(), SwitchOutcome::Superseded);
    assert_eq!(second.unwrap(), SwitchOutcome::Switched(locale("de")));
    assert_eq!(engine.locale().await, Some(locale("de")));
    assert_eq!(storage.get("lang").await.unwrap().as_deref(), Some("de"));
    let document = engine.document();
    let doc = document.lock().await;
    assert_eq!(doc.text_content(page.home), "Startseite");
    assert_eq!(doc.lang(), Some("de"));
}

#[tokio::test(start_paused = true)]
async fn late_insertion_is_translated_by_the_watcher() {
    let settings = EngineSettings { coalesce_delay_ms: 20, ..EngineSettings::default() };
    let engine =
        engine_with_settings(settings, Arc::new(dictionaries()), Arc::new(MemoryStorage::new()));
    let watcher = engine.watch().await.spawn();
    engine.init(Some("fr")).await.unwrap();

    tokio::time::sleep(ms(500)).await;
    let (home, blog, writes_before) = {
        let document = engine.document();
        let mut doc = document.lock().await;
        let list = doc.create_element("ul");
        let home = link(&mut doc, list, "nav.home", "home");
        let root = doc.root();
        doc.append_child(root, list).unwrap();
        let blog = link(&mut doc, list, "nav.blog", "blog");
        (home, blog, doc.writes())
    };
    tokio::time::sleep(ms(100)).await;

    let document = engine.document();
    let mut doc = document.lock().await;
    assert_eq!(doc.text_content(home), "Accueil");
    assert_eq!(doc.text_content(blog), "Blog");
    assert_eq!(doc.writes(), writes_before + 2);

    doc.disconnect();
    drop(doc);
    watcher.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn watcher_follows_rekeyed_removed_and_inserted_markers() {
    let settings = EngineSettings { coalesce_delay_ms: 20, ..EngineSettings::default() };
    let engine =
        engine_with_settings(settings, Arc::new(dictionaries()), Arc::new(MemoryStorage::new()));
    let page = page_in(&engine).await;
    let watcher = engine.watch().await.spawn();
    engine.init(Some("fr")).await.unwrap();
    tokio::time::sleep(ms(100)).await;

    let inserted = {
        let document = engine.document();
        let mut doc = document.lock().await;
        doc.set_attribute(page.blog, "data-i18n", "nav.home").unwrap();
        doc.remove_attribute(page.logo, "data-i18n-attr").unwrap();
        let root = doc.root();
        link(&mut doc, root, "nav.blog", "blog")
    };
    tokio::time::sleep(ms(100)).await;

    let document = engine.document();
    let mut doc = document.lock().await;
    assert_eq!(doc.text_content(page.blog), "Accueil");
    assert_eq!(doc.text_content(inserted), "Blog");
    assert_eq!(doc.attribute(page.logo, "alt"), Some("Logo de l'entreprise"));

    doc.disconnect();
    drop(doc);
    watcher.await.unwrap();
}

#[tokio::test]
async fn insertion_before_first_switch_is_rendered_by_it() {
    let engine = engine();
    let node = {
        let document = engine.document();
        let mut doc = document.lock().await;
        let root = doc.root();
        link(&mut doc, root, "nav.home", "home")
    };

    let stats = engine.notify_inserted(node).await;
    assert_eq!(stats.written, 0);

    engine.switch("de").await.unwrap();
    assert_eq!(engine.document().lock().await.text_content(node), "Startseite");
}

#[tokio::test]
async fn notify_inserted_renders_only_new_content() {
    let engine = engine();
    page_in(&engine).await;
    engine.init(Some("fr")).await.unwrap();

    let node = {
        let document = engine.document();
        let mut doc = document.lock().await;
        let root = doc.root();
        link(&mut doc, root, "nav.home", "home")
    };
    let stats = engine.notify_inserted(node).await;

    assert_eq!(stats.written, 1);
    assert_eq!(engine.document().lock().await.text_content(node), "Accueil");
}

#[tokio::test]
async fn unknown_locale_falls_back_to_default() {
    let engine = engine();
    page_in(&engine).await;

    let outcome = engine.switch("es-MX").await.unwrap();

    assert_eq!(outcome, SwitchOutcome::Switched(locale("en")));
    assert_eq!(engine.document().lock().await.lang(), Some("en"));
}

#[tokio::test]
async fn failed_switch_keeps_previous_state() {
    let settings = EngineSettings { default_locale: "it".to_string(), ..EngineSettings::default() };
    let engine =
        engine_with_settings(settings, Arc::new(dictionaries()), Arc::new(MemoryStorage::new()));
    page_in(&engine).await;
    engine.init(Some("fr")).await.unwrap();
    let writes = engine.document().lock().await.writes();

    let result = engine.switch("es").await;

    match result {
        Err(SwitchError::Unavailable { locale: failed, .. }) => assert_eq!(failed, locale("es")),
        other => panic!("expected Unavailable, got {other:?}"),
    }
    assert_eq!(engine.phase().await, Phase::Ready(locale("fr")));
    assert_eq!(engine.document().lock().await.writes(), writes);
    assert_eq!(engine.text("nav.home").await.as_deref(), Some("Accueil"));
}

#[tokio::test]
async fn failure_before_any_switch_returns_to_uninitialized() {
    let engine = engine_with(
        Arc::new(MemorySource::new()),
        Arc::new(MemoryStorage::new()),
    );

    assert!(engine.switch("fr").await.is_err());
    assert_eq!(engine.phase().await, Phase::Uninitialized);
    assert_eq!(engine.document().lock().await.lang(), None);
}

#[tokio::test]
async fn invalid_locale_is_rejected() {
    let engine = engine();

    let result = engine.switch(" - ").await;

    assert_eq!(result, Err(SwitchError::InvalidLocale(" - ".to_string())));
}

#[tokio::test]
async fn switching_to_active_locale_rebroadcasts() {
    let engine = engine();
    let mut events = engine.subscribe();
    engine.init(Some("zh-TW")).await.unwrap();
    let writes = engine.document().lock().await.writes();

    let outcome = engine.switch("zh_tw").await.unwrap();

    assert_eq!(outcome, SwitchOutcome::Unchanged);
    assert_eq!(events.recv().await.unwrap(), LocaleChanged { locale: locale("zh_tw") });
    assert_eq!(events.recv().await.unwrap(), LocaleChanged { locale: locale("zh_tw") });
    assert_eq!(engine.document().lock().await.writes(), writes);
}

#[tokio::test]
async fn lookups_follow_the_active_locale() {
    let engine = engine();

    assert_eq!(engine.text("nav.home").await, None);
    assert_eq!(engine.text_or("nav.home", "Home?").await, "Home?");

    engine.switch("fr").await.unwrap();

    assert_eq!(engine.text("nav.home").await.as_deref(), Some("Accueil"));
    assert_eq!(engine.text("nav.blog").await.as_deref(), Some("Blog"));
    assert_eq!(engine.text("meta.title").await.as_deref(), Some("Mon site"));
    assert_eq!(engine.text("meta.title.short").await.as_deref(), Some("Site"));
    assert_eq!(engine.text("nav").await, None);
    assert!(engine.t("nav").await.is_some());
    assert_eq!(engine.text_or("nav.missing", "?").await, "?");
}

#[tokio::test]
async fn persisted_locale_survives_a_cold_start() {
    let storage = MemoryStorage::new();
    let first = engine_with(Arc::new(dictionaries()), Arc::new(storage.clone()));
    first.switch("zh-TW").await.unwrap();

    let cold = engine_with(Arc::new(dictionaries()), Arc::new(storage.clone()));

    assert_eq!(cold.detect(None).await, locale("zh_tw"));
    assert_eq!(cold.init(None).await.unwrap(), SwitchOutcome::Switched(locale("zh_tw")));
    assert_eq!(cold.text("nav.home").await.as_deref(), Some("首頁"));
}

#[tokio::test]
async fn file_storage_persists_across_engines() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state.json");
    let first = engine_with(Arc::new(dictionaries()), Arc::new(FileStorage::new(&path)));
    first.switch("de").await.unwrap();

    let cold = engine_with(Arc::new(dictionaries()), Arc::new(FileStorage::new(&path)));

    assert_eq!(cold.detect(None).await, locale("de"));
}

fn detecting_engine(preferred: &[&str], supported: Option<&[&str]>) -> I18n {
    let settings = EngineSettings {
        supported_locales: supported.map(|s| s.iter().map(ToString::to_string).collect()),
        ..EngineSettings::default()
    };
    I18n::builder(settings, Arc::new(dictionaries()))
        .preference(Arc::new(StaticLanguagePreference::new(preferred.iter().copied())))
        .build()
}

#[rstest]
#[case::first_preference(&["pt-BR", "fr"], None, "pt_br")]
#[case::exact_supported(&["de", "fr"], Some(&["en", "fr"][..]), "fr")]
#[case::base_language(&["fr-CA"], Some(&["en", "fr"][..]), "fr")]
#[case::regional_supported(&["zh-tw"], Some(&["zh-TW", "zh"][..]), "zh_tw")]
#[case::nothing_supported(&["ja"], Some(&["en", "fr"][..]), "en")]
#[case::no_preference(&[], None, "en")]
#[tokio::test]
async fn detect_uses_platform_preferences(
    #[case] preferred: &[&str],
    #[case] supported: Option<&[&str]>,
    #[case] expected: &str,
) {
    let engine = detecting_engine(preferred, supported);

    assert_eq!(engine.detect(None).await, locale(expected));
}

#[tokio::test]
async fn override_beats_persisted_and_platform() {
    let engine = detecting_engine(&["fr"], None);
    engine.switch("de").await.unwrap();

    assert_eq!(engine.detect(Some("ja")).await, locale("ja"));
    assert_eq!(engine.detect(Some("  ")).await, locale("de"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_loads_share_one_fetch() {
    let source = DelayedSource::new(dictionaries()).delay("fr", ms(50));
    let engine = engine_with(Arc::new(source), Arc::new(MemoryStorage::new()));
    let store = engine.store();
    let fr = locale("fr");

    let (a, b, c) = tokio::join!(store.load(&fr), store.load(&fr), store.load(&fr));

    assert_that!(store.fetch_count(), eq(1));
    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert!(c.is_ok());
}

#[tokio::test]
async fn page_can_be_built_outside_the_engine() {
    let mut doc = Document::new();
    let page = build_page(&mut doc);
    let engine = I18n::builder(EngineSettings::default(), Arc::new(dictionaries()))
        .preference(Arc::new(StaticLanguagePreference::new(["de-AT"])))
        .document(doc)
        .build();

    engine.init(None).await.unwrap();

    assert_eq!(engine.locale().await, Some(locale("de_at")));
    assert_eq!(engine.document().lock().await.text_content(page.home), "Startseite");
}
