//! page-i18n
//!
//! Localization rendering engine: loads per-locale dictionaries, resolves keys
//! with fallback and keeps a live document in sync with the active locale.

pub mod config;
pub mod controller;
pub mod dictionary;
pub mod document;
pub mod locale;
pub mod render;
pub mod watcher;

pub use controller::{
    I18n,
    LocaleChanged,
    SwitchError,
    SwitchOutcome,
};
pub use locale::Locale;
