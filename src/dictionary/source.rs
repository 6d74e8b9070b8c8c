//! Where dictionaries come from.

use std::collections::HashMap;
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{
    Path,
    PathBuf,
};

use async_trait::async_trait;
use jsonc_parser::ParseOptions;

use super::DictionaryTree;
use super::error::SourceError;
use crate::config::DictionariesConfig;
use crate::locale::Locale;

/// Placeholder replaced by a locale spelling in file patterns.
const LOCALE_PLACEHOLDER: &str = "{locale}";

/// Supplies the raw JSON text of a locale's dictionary.
#[async_trait]
pub trait DictionarySource: Debug + Send + Sync {
    /// Fetches the dictionary text for `locale`.
    ///
    /// # Errors
    /// When no dictionary exists for the locale or it cannot be read.
    async fn fetch(&self, locale: &Locale) -> Result<String, SourceError>;
}

/// Parses dictionary text into a tree.
///
/// Comments and trailing commas are accepted. The root must be an object.
///
/// # Errors
/// Returns a description of the problem when the text is not a JSON object.
pub fn parse_dictionary(text: &str, separator: &str) -> Result<DictionaryTree, String> {
    let value = jsonc_parser::parse_to_serde_value(text, &ParseOptions::default())
        .map_err(|e| format!("Failed to parse JSON: {e}"))?
        .ok_or_else(|| "Dictionary is empty".to_string())?;

    DictionaryTree::from_json(&value, separator)
        .ok_or_else(|| "Dictionary root must be an object".to_string())
}

/// Reads dictionaries from `<directory>/<file pattern>`.
///
/// Each spelling from [`Locale::candidates`] is tried in order, so `zh_tw`
/// finds `zh_tw.json`, `zh-tw.json` or finally `zh.json`.
#[derive(Debug, Clone)]
pub struct FileSource {
    /// Directory the pattern is resolved against
    directory: PathBuf,
    /// File name with a `{locale}` placeholder
    file_pattern: String,
}

impl FileSource {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, file_pattern: impl Into<String>) -> Self {
        Self { directory: directory.into(), file_pattern: file_pattern.into() }
    }

    /// Source described by the `dictionaries` settings, relative to `root`.
    #[must_use]
    pub fn from_config(root: &Path, config: &DictionariesConfig) -> Self {
        Self::new(root.join(&config.directory), config.file_pattern.clone())
    }

    fn path_for(&self, spelling: &str) -> PathBuf {
        self.directory.join(self.file_pattern.replace(LOCALE_PLACEHOLDER, spelling))
    }

    /// Lists locales with a dictionary file in the directory.
    ///
    /// Only file-name patterns (no `/`) can be listed; anything else yields an
    /// empty list.
    ///
    /// # Errors
    /// When the directory cannot be read.
    pub async fn available_locales(&self) -> Result<Vec<Locale>, SourceError> {
        let Some((prefix, suffix)) = self.file_pattern.split_once(LOCALE_PLACEHOLDER) else {
            return Ok(Vec::new());
        };
        if self.file_pattern.contains('/') {
            tracing::debug!(pattern = %self.file_pattern, "Nested file pattern cannot be listed");
            return Ok(Vec::new());
        }

        let io_error = |e: std::io::Error| SourceError::Io {
            path: self.directory.display().to_string(),
            message: e.to_string(),
        };
        let mut entries = tokio::fs::read_dir(&self.directory).await.map_err(io_error)?;
        let mut locales = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let name = entry.file_name();
            let Some(locale) = name
                .to_str()
                .and_then(|n| n.strip_prefix(prefix))
                .and_then(|n| n.strip_suffix(suffix))
                .and_then(Locale::parse)
            else {
                continue;
            };
            if !locales.contains(&locale) {
                locales.push(locale);
            }
        }
        locales.sort();
        Ok(locales)
    }
}

#[async_trait]
impl DictionarySource for FileSource {
    async fn fetch(&self, locale: &Locale) -> Result<String, SourceError> {
        let mut tried = Vec::new();
        for spelling in locale.candidates() {
            let path = self.path_for(&spelling);
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    tracing::debug!(%locale, path = %path.display(), "Read dictionary file");
                    return Ok(text);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tried.push(path.display().to_string());
                }
                Err(e) => {
                    return Err(SourceError::Io {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Err(SourceError::NotFound { locale: locale.clone(), tried })
    }
}

/// Dictionaries held in memory, keyed by spelling.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    /// Raw dictionary text by canonical locale
    dictionaries: HashMap<String, String>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the dictionary text stored under `spelling`.
    #[must_use]
    pub fn with(mut self, spelling: &str, text: impl Into<String>) -> Self {
        self.insert(spelling, text);
        self
    }

    pub fn insert(&mut self, spelling: &str, text: impl Into<String>) {
        let key = Locale::parse(spelling).map_or_else(|| spelling.to_string(), String::from);
        self.dictionaries.insert(key, text.into());
    }
}

#[async_trait]
impl DictionarySource for MemorySource {
    async fn fetch(&self, locale: &Locale) -> Result<String, SourceError> {
        let tried = locale.candidates();
        tried
            .iter()
            .filter_map(|spelling| Locale::parse(spelling))
            .find_map(|key| self.dictionaries.get(key.as_str()).cloned())
            .ok_or_else(|| SourceError::NotFound { locale: locale.clone(), tried })
    }
}
