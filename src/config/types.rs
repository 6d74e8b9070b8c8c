use std::time::Duration;

use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

use crate::locale::Locale;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error in '{field_path}': {message}")]
pub struct ValidationError {
    /// JSON path to the field (e.g., "markers.text")
    pub field_path: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field_path: field_path.into(), message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    ValidationErrors(Vec<ValidationError>),

    #[error("Failed to load configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| format!("  {}. {} - {}", i + 1, err.field_path, err.message))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Used when nothing else decides the locale, and retried once when a
    /// requested locale cannot be loaded.
    pub default_locale: String,

    /// Fills keys missing from the active locale.
    pub fallback_locale: String,

    /// Locales the site ships.
    ///
    /// - `None`: any platform preference is accepted as-is (default)
    /// - `Some([...])`: platform preferences must match one of these, exactly
    ///   or by base language
    pub supported_locales: Option<Vec<String>>,

    pub dictionaries: DictionariesConfig,

    pub key_separator: String,

    pub markers: MarkersConfig,

    /// Storage key under which the chosen locale is persisted.
    pub storage_key: String,

    /// How long the structural watcher waits to coalesce a burst of changes.
    /// `0` defers the pass by one scheduling turn only.
    pub coalesce_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DictionariesConfig {
    /// Directory holding the dictionaries, relative to the project root.
    pub directory: String,
    /// File name pattern; `{locale}` is replaced by each candidate spelling.
    pub file_pattern: String,
}

impl Default for DictionariesConfig {
    fn default() -> Self {
        Self { directory: "i18n".to_string(), file_pattern: "{locale}.json".to_string() }
    }
}

/// Attribute names that declare a binding.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkersConfig {
    /// `data-i18n="key"`: text content (document title on `<title>`)
    pub text: String,
    /// `data-i18n-html="key"`: inner markup
    pub html: String,
    /// `data-i18n-attr="title,aria-label=key"`: one key, several attributes
    pub attr: String,
    /// `data-i18n-title="key"`: document title
    pub title: String,
}

impl Default for MarkersConfig {
    fn default() -> Self {
        Self {
            text: "data-i18n".to_string(),
            html: "data-i18n-html".to_string(),
            attr: "data-i18n-attr".to_string(),
            title: "data-i18n-title".to_string(),
        }
    }
}

impl MarkersConfig {
    /// Every marker attribute name.
    #[must_use]
    pub fn all(&self) -> [&str; 4] {
        [&self.text, &self.html, &self.attr, &self.title]
    }

    /// Returns true if `name` declares a binding.
    #[must_use]
    pub fn is_marker(&self, name: &str) -> bool {
        self.all().contains(&name)
    }
}

impl EngineSettings {
    /// # Errors
    /// - Locale field is not a valid locale
    /// - Required field is empty
    /// - File pattern lacks the `{locale}` placeholder
    /// - Marker names are empty or repeated
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (field, value) in
            [("defaultLocale", &self.default_locale), ("fallbackLocale", &self.fallback_locale)]
        {
            if Locale::parse(value).is_none() {
                errors.push(ValidationError::new(
                    field,
                    format!("'{value}' is not a locale identifier. Example: \"en\" or \"zh-TW\""),
                ));
            }
        }

        if let Some(supported) = &self.supported_locales {
            if supported.is_empty() {
                errors.push(ValidationError::new(
                    "supportedLocales",
                    "At least one locale is required, or remove this field",
                ));
            }
            for (index, value) in supported.iter().enumerate() {
                if Locale::parse(value).is_none() {
                    errors.push(ValidationError::new(
                        format!("supportedLocales[{index}]"),
                        format!("'{value}' is not a locale identifier"),
                    ));
                }
            }
        }

        if self.dictionaries.directory.is_empty() {
            errors.push(ValidationError::new(
                "dictionaries.directory",
                "The directory cannot be empty. Example: \"i18n\"",
            ));
        }

        if !self.dictionaries.file_pattern.contains("{locale}") {
            errors.push(ValidationError::new(
                "dictionaries.filePattern",
                format!(
                    "The pattern '{}' must contain the {{locale}} placeholder. Example: \"{{locale}}.json\"",
                    self.dictionaries.file_pattern
                ),
            ));
        }

        if self.key_separator.is_empty() {
            errors.push(ValidationError::new(
                "keySeparator",
                "The separator cannot be empty. Please specify a separator, for example: \".\" (dot)",
            ));
        }

        let markers = self.markers.all();
        for (name, value) in ["text", "html", "attr", "title"].iter().zip(markers) {
            if value.is_empty() {
                errors.push(ValidationError::new(
                    format!("markers.{name}"),
                    "The attribute name cannot be empty",
                ));
            } else if markers.iter().filter(|m| **m == value).count() > 1 {
                errors.push(ValidationError::new(
                    format!("markers.{name}"),
                    format!("The attribute name '{value}' is used by more than one marker"),
                ));
            }
        }

        if self.storage_key.is_empty() {
            errors.push(ValidationError::new(
                "storageKey",
                "The storage key cannot be empty. Example: \"lang\"",
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// The default locale, falling back to `en` when the setting is invalid.
    #[must_use]
    pub fn default_locale(&self) -> Locale {
        Locale::parse(&self.default_locale).unwrap_or_else(Locale::english)
    }

    /// The fallback locale, falling back to `en` when the setting is invalid.
    #[must_use]
    pub fn fallback_locale(&self) -> Locale {
        Locale::parse(&self.fallback_locale).unwrap_or_else(Locale::english)
    }

    /// Parsed `supportedLocales`, skipping invalid entries.
    #[must_use]
    pub fn supported_locales(&self) -> Option<Vec<Locale>> {
        self.supported_locales
            .as_ref()
            .map(|list| list.iter().filter_map(|s| Locale::parse(s)).collect())
    }

    #[must_use]
    pub const fn coalesce_delay(&self) -> Duration {
        Duration::from_millis(self.coalesce_delay_ms)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_locale: "en".to_string(),
            fallback_locale: "en".to_string(),
            supported_locales: None,
            dictionaries: DictionariesConfig::default(),
            key_separator: ".".to_string(),
            markers: MarkersConfig::default(),
            storage_key: "lang".to_string(),
            coalesce_delay_ms: 0,
        }
    }
}
