//! One node/key pair and how its content is written.

use thiserror::Error;

use crate::config::MarkersConfig;
use crate::dictionary::DictionaryTree;
use crate::document::{
    Document,
    DocumentError,
    NodeId,
};

/// Which marker attribute declared a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Text content (`data-i18n`)
    Text,
    /// Inner markup (`data-i18n-html`)
    Html,
    /// Named attributes (`data-i18n-attr`)
    Attr,
    /// Document title (`data-i18n-title`)
    Title,
}

impl Marker {
    pub const ALL: [Self; 4] = [Self::Text, Self::Html, Self::Attr, Self::Title];

    /// The configured attribute name of this marker.
    #[must_use]
    pub fn attribute_name(self, markers: &MarkersConfig) -> &str {
        match self {
            Self::Text => &markers.text,
            Self::Html => &markers.html,
            Self::Attr => &markers.attr,
            Self::Title => &markers.title,
        }
    }
}

/// Where a resolved value is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderMode {
    /// Text content of the element
    Text,
    /// Inner markup of the element, written as an opaque fragment
    Markup,
    /// Each named attribute of the element
    Attributes(Vec<String>),
    /// The document title
    Title,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkerError {
    #[error("Marker '{marker}' on {node} has an empty key")]
    EmptyKey { node: NodeId, marker: String },
    #[error("Marker '{marker}' on {node} must look like 'name,name=key', got '{value}'")]
    MissingKeySeparator { node: NodeId, marker: String, value: String },
    #[error("Marker '{marker}' on {node} names no attribute")]
    NoAttributes { node: NodeId, marker: String },
}

/// Content a binding had before the engine first touched it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Original {
    /// Text, markup or title
    Content(String),
    /// One entry per attribute name, `None` when the attribute was absent
    Attributes(Vec<Option<String>>),
}

/// What the binding last put into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Applied {
    /// The original content is in place
    Original,
    /// A resolved value is in place
    Value(String),
    /// The document state is not known; the next apply always writes
    Unknown,
}

/// A node bound to a dictionary key.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Bound element
    node: NodeId,
    /// Marker the binding was read from
    marker: Marker,
    /// Dictionary key to resolve
    key: String,
    /// Where the value goes
    mode: RenderMode,
    /// Content captured at first discovery
    original: Original,
    /// Last thing written, to skip redundant writes
    last: Applied,
}

impl Binding {
    /// Reads the marker `marker` of `node`, capturing the current content as
    /// the original.
    ///
    /// Returns `Ok(None)` when the node does not carry the marker.
    ///
    /// # Errors
    /// When the marker value is malformed.
    pub fn read(
        doc: &Document,
        node: NodeId,
        marker: Marker,
        markers: &MarkersConfig,
    ) -> Result<Option<Self>, MarkerError> {
        let name = marker.attribute_name(markers);
        let Some(value) = doc.attribute(node, name) else {
            return Ok(None);
        };

        let (key, mode) = match marker {
            Marker::Text if doc.tag(node) == Some("title") => (value.trim(), RenderMode::Title),
            Marker::Text => (value.trim(), RenderMode::Text),
            Marker::Html => (value.trim(), RenderMode::Markup),
            Marker::Title => (value.trim(), RenderMode::Title),
            Marker::Attr => {
                let Some((names, key)) = value.split_once('=') else {
                    return Err(MarkerError::MissingKeySeparator {
                        node,
                        marker: name.to_string(),
                        value: value.to_string(),
                    });
                };
                let names: Vec<String> = names
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(ToString::to_string)
                    .collect();
                if names.is_empty() {
                    return Err(MarkerError::NoAttributes { node, marker: name.to_string() });
                }
                (key.trim(), RenderMode::Attributes(names))
            }
        };

        if key.is_empty() {
            return Err(MarkerError::EmptyKey { node, marker: name.to_string() });
        }

        let original = capture(doc, node, &mode);
        Ok(Some(Self {
            node,
            marker,
            key: key.to_string(),
            mode,
            original,
            last: Applied::Original,
        }))
    }

    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub const fn marker(&self) -> Marker {
        self.marker
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub const fn mode(&self) -> &RenderMode {
        &self.mode
    }

    /// Takes over the original content and written state of `previous`, the
    /// binding this one replaces after its marker changed.
    pub(super) fn inherit(&mut self, previous: Self) {
        match (&self.mode, previous.mode) {
            (RenderMode::Attributes(names), RenderMode::Attributes(old_names)) => {
                let (Original::Attributes(current), Original::Attributes(old)) =
                    (&mut self.original, previous.original)
                else {
                    return;
                };
                for (name, slot) in names.iter().zip(current.iter_mut()) {
                    if let Some(pos) = old_names.iter().position(|n| n == name)
                        && let Some(value) = old.get(pos)
                    {
                        slot.clone_from(value);
                    }
                }
                self.last = if *names == old_names { previous.last } else { Applied::Unknown };
            }
            (mode, old_mode) if *mode == old_mode => {
                self.original = previous.original;
                self.last = previous.last;
            }
            _ => self.last = Applied::Unknown,
        }
    }

    /// Brings the node in line with `dict`.
    ///
    /// Writes the resolved value, or the original content when the key does
    /// not resolve to text, and only when that differs from what was last
    /// written. Returns true if the document was written.
    ///
    /// # Errors
    /// When the document rejects the write.
    pub fn apply(&mut self, doc: &mut Document, dict: &DictionaryTree) -> Result<bool, DocumentError> {
        let next = dict
            .resolve_text(&self.key)
            .map_or(Applied::Original, |value| Applied::Value(value.to_string()));
        if next == self.last {
            return Ok(false);
        }

        match &next {
            Applied::Value(value) => self.write_value(doc, value)?,
            Applied::Original | Applied::Unknown => self.restore(doc)?,
        }
        self.last = next;
        Ok(true)
    }

    fn write_value(&self, doc: &mut Document, value: &str) -> Result<(), DocumentError> {
        match &self.mode {
            RenderMode::Text => doc.set_text(self.node, value),
            RenderMode::Markup => doc.set_inner_markup(self.node, value),
            RenderMode::Title => {
                doc.set_title(value);
                Ok(())
            }
            RenderMode::Attributes(names) => {
                for name in names {
                    doc.set_attribute(self.node, name, value)?;
                }
                Ok(())
            }
        }
    }

    fn restore(&self, doc: &mut Document) -> Result<(), DocumentError> {
        match (&self.mode, &self.original) {
            (RenderMode::Text, Original::Content(text)) => doc.set_text(self.node, text),
            (RenderMode::Markup, Original::Content(markup)) => {
                doc.set_inner_markup(self.node, markup)
            }
            (RenderMode::Title, Original::Content(title)) => {
                doc.set_title(title);
                Ok(())
            }
            (RenderMode::Attributes(names), Original::Attributes(values)) => {
                for (name, value) in names.iter().zip(values) {
                    match value {
                        Some(value) => doc.set_attribute(self.node, name, value)?,
                        None => doc.remove_attribute(self.node, name)?,
                    }
                }
                Ok(())
            }
            (_, original) => {
                tracing::debug!(node = %self.node, ?original, "Original content does not fit mode");
                Ok(())
            }
        }
    }
}

fn capture(doc: &Document, node: NodeId, mode: &RenderMode) -> Original {
    match mode {
        RenderMode::Text => Original::Content(doc.text_content(node)),
        RenderMode::Markup => Original::Content(doc.inner_markup(node)),
        RenderMode::Title => Original::Content(doc.title().to_string()),
        RenderMode::Attributes(names) => Original::Attributes(
            names.iter().map(|name| doc.attribute(node, name).map(ToString::to_string)).collect(),
        ),
    }
}
