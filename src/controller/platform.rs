//! The platform's language preferences.

use std::fmt::Debug;

/// Languages the user prefers, most preferred first.
pub trait LanguagePreference: Debug + Send + Sync {
    fn preferred(&self) -> Vec<String>;
}

/// Reads `LC_ALL`, `LC_MESSAGES` and `LANG`, in that order.
///
/// Encodings and modifiers (`fr_FR.UTF-8@euro`) are stripped; `C` and `POSIX`
/// carry no preference.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvLanguagePreference;

const LOCALE_VARIABLES: [&str; 3] = ["LC_ALL", "LC_MESSAGES", "LANG"];

impl LanguagePreference for EnvLanguagePreference {
    fn preferred(&self) -> Vec<String> {
        LOCALE_VARIABLES
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .filter_map(|value| posix_language(&value))
            .collect()
    }
}

fn posix_language(value: &str) -> Option<String> {
    let language = value.split(['.', '@']).next().unwrap_or_default().trim();
    if language.is_empty() || language == "C" || language == "POSIX" {
        return None;
    }
    Some(language.to_string())
}

/// A fixed list of preferences.
#[derive(Debug, Clone, Default)]
pub struct StaticLanguagePreference(Vec<String>);

impl StaticLanguagePreference {
    #[must_use]
    pub fn new<I, S>(languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(languages.into_iter().map(Into::into).collect())
    }
}

impl LanguagePreference for StaticLanguagePreference {
    fn preferred(&self) -> Vec<String> {
        self.0.clone()
    }
}
