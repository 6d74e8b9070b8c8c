//! Dictionary tree, key resolution and fallback merging.

use std::collections::BTreeMap;

use serde_json::Value;

/// Fields consulted, in order, when a lookup lands on an object entry.
pub const DEFAULT_FIELDS: &[&str] = &["title", "label", "text", "default"];

/// Fields of an object entry, ordered by key.
pub type Fields = BTreeMap<String, Entry>;

/// A value stored in a dictionary tree.
///
/// Objects are classified once, at construction: an object holding a string in
/// one of [`DEFAULT_FIELDS`] becomes [`Entry::WithDefault`], any other object a
/// [`Entry::Branch`]. Use [`Entry::object`] to build objects so the two never
/// disagree with their fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A plain string
    Text(String),
    /// An object with no default field
    Branch(Fields),
    /// An object whose first default field holds a string
    WithDefault {
        /// Value of that default field
        default: String,
        /// Every field, the default one included
        fields: Fields,
    },
    /// An array, addressed by numeric segments
    List(Vec<Entry>),
}

impl Entry {
    /// Builds an object entry, picking the variant from its fields.
    #[must_use]
    pub fn object(fields: Fields) -> Self {
        let default = DEFAULT_FIELDS.iter().find_map(|name| match fields.get(*name) {
            Some(Self::Text(s)) => Some(s.clone()),
            _ => None,
        });
        match default {
            Some(default) => Self::WithDefault { default, fields },
            None => Self::Branch(fields),
        }
    }

    /// Converts a JSON value. `null` yields `None`; scalars are stringified.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Bool(_) | Value::Number(_) => Some(Self::Text(value.to_string())),
            Value::Array(items) => Some(Self::List(items.iter().filter_map(Self::from_json).collect())),
            Value::Object(map) => Some(Self::object(
                map.iter()
                    .filter_map(|(key, value)| Some((key.clone(), Self::from_json(value)?)))
                    .collect(),
            )),
        }
    }

    /// The text to render for this entry, if it has one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::WithDefault { default: s, .. } => Some(s),
            Self::Branch(_) | Self::List(_) => None,
        }
    }

    #[must_use]
    pub const fn fields(&self) -> Option<&Fields> {
        match self {
            Self::Branch(fields) | Self::WithDefault { fields, .. } => Some(fields),
            Self::Text(_) | Self::List(_) => None,
        }
    }

    /// One traversal step: field name for objects, numeric index for lists.
    fn child(&self, segment: &str) -> Option<&Self> {
        match self {
            Self::Branch(fields) | Self::WithDefault { fields, .. } => fields.get(segment),
            Self::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            Self::Text(_) => None,
        }
    }

    /// Layers `self` over `fallback`. Objects merge field by field; any other
    /// value on the primary side wins as a whole.
    #[must_use]
    pub fn merged_over(&self, fallback: &Self) -> Self {
        match (self.fields(), fallback.fields()) {
            (Some(primary), Some(secondary)) => Self::object(merge_fields(primary, secondary)),
            _ => self.clone(),
        }
    }
}

fn merge_fields(primary: &Fields, fallback: &Fields) -> Fields {
    let mut merged = primary.clone();
    for (key, fallback_entry) in fallback {
        match merged.get_mut(key) {
            Some(existing) => *existing = existing.merged_over(fallback_entry),
            None => {
                merged.insert(key.clone(), fallback_entry.clone());
            }
        }
    }
    merged
}

/// The dictionary of one locale, or a merge of two.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictionaryTree {
    /// Top-level fields
    root: Fields,
    /// Splits keys into path segments
    separator: String,
}

impl DictionaryTree {
    /// Creates a tree from root fields, resolving keys split on `separator`.
    #[must_use]
    pub fn new(root: Fields, separator: impl Into<String>) -> Self {
        Self { root, separator: separator.into() }
    }

    /// An empty tree; every lookup resolves to `None`.
    #[must_use]
    pub fn empty(separator: impl Into<String>) -> Self {
        Self::new(Fields::new(), separator)
    }

    /// Builds a tree from a JSON document. The root must be an object.
    #[must_use]
    pub fn from_json(value: &Value, separator: impl Into<String>) -> Option<Self> {
        let Value::Object(_) = value else {
            return None;
        };
        let root = Entry::from_json(value)?.fields().cloned().unwrap_or_default();
        Some(Self::new(root, separator))
    }

    #[must_use]
    pub const fn root(&self) -> &Fields {
        &self.root
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Walks `key` one segment at a time.
    ///
    /// Returns `None` as soon as a segment is missing or the current entry
    /// cannot be traversed. An empty key resolves to nothing.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<&Entry> {
        if key.is_empty() || self.separator.is_empty() {
            return None;
        }
        let mut segments = key.split(self.separator.as_str());
        let mut current = self.root.get(segments.next()?)?;
        for segment in segments {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Resolves `key` and applies the default-field rule for object entries.
    #[must_use]
    pub fn resolve_text(&self, key: &str) -> Option<&str> {
        self.resolve(key).and_then(Entry::as_text)
    }

    /// Fills every path missing from `primary` with the value from `fallback`.
    ///
    /// Primary values always win, including nested ones.
    #[must_use]
    pub fn merge(primary: &Self, fallback: &Self) -> Self {
        Self { root: merge_fields(&primary.root, &fallback.root), separator: primary.separator.clone() }
    }
}
