//! Canonical locale identifiers.

use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};

/// A normalized locale identifier such as `en` or `zh_tw`.
///
/// Both `zh-TW` and `zh_tw` normalize to the same token, which is the only form
/// used for caching, persistence and comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale(String);

impl Locale {
    /// Normalizes `input` (trim, lowercase, `-` to `_`).
    ///
    /// Returns `None` when nothing but whitespace or separators remains.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = normalize_locale(input);
        if normalized.is_empty() || normalized.split('_').any(str::is_empty) {
            return None;
        }
        Some(Self(normalized))
    }

    /// `en`, used when configuration names no usable locale.
    #[must_use]
    pub fn english() -> Self {
        Self("en".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Language part without region or script (`zh_tw` -> `zh`).
    #[must_use]
    pub fn base(&self) -> &str {
        self.0.split('_').next().unwrap_or(&self.0)
    }

    /// Spellings to try when locating a dictionary for this locale.
    ///
    /// `zh_tw` -> `["zh_tw", "zh-tw", "zh"]`
    #[must_use]
    pub fn candidates(&self) -> Vec<String> {
        let mut out = vec![self.0.clone()];
        let hyphenated = self.0.replace('_', "-");
        if hyphenated != self.0 {
            out.push(hyphenated);
        }
        let base = self.base();
        if !out.iter().any(|c| c == base) {
            out.push(base.to_string());
        }
        out
    }

    /// BCP 47 spelling for the document `lang` attribute (`zh_tw` -> `zh-TW`).
    #[must_use]
    pub fn to_bcp47(&self) -> String {
        let mut parts = self.0.split('_');
        let mut out = parts.next().unwrap_or_default().to_string();
        for part in parts {
            out.push('-');
            match part.len() {
                2 => out.push_str(&part.to_uppercase()),
                4 => {
                    let mut chars = part.chars();
                    if let Some(first) = chars.next() {
                        out.extend(first.to_uppercase());
                        out.push_str(chars.as_str());
                    }
                }
                _ => out.push_str(part),
            }
        }
        out
    }
}

/// Normalize locale code (trim, lowercase and replace - with _)
fn normalize_locale(code: &str) -> String {
    code.trim().to_lowercase().replace('-', "_")
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Locale {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Locale {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid locale identifier '{value}'"))
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.0
    }
}
