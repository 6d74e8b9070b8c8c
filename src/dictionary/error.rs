use thiserror::Error;

use crate::locale::Locale;

/// Failure to obtain the raw dictionary text from a source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// No dictionary exists for the locale under any candidate spelling
    #[error("No dictionary found for '{locale}' (tried: {})", .tried.join(", "))]
    NotFound { locale: Locale, tried: Vec<String> },
    /// Reading the dictionary failed
    #[error("Failed to read dictionary '{path}': {message}")]
    Io { path: String, message: String },
}

/// A locale's dictionary could not be fetched or parsed.
///
/// Never cached: the next load of the same locale retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DictionaryError {
    #[error("Dictionary for '{locale}' is unavailable: {reason}")]
    Unavailable { locale: Locale, reason: String },
}

impl DictionaryError {
    pub(crate) fn unavailable(locale: &Locale, reason: impl ToString) -> Self {
        Self::Unavailable { locale: locale.clone(), reason: reason.to_string() }
    }

    #[must_use]
    pub const fn locale(&self) -> &Locale {
        match self {
            Self::Unavailable { locale, .. } => locale,
        }
    }
}
