//! Per-locale dictionaries: loading, caching, lookup and merging.
mod entry;
mod error;
mod source;
mod store;

pub use entry::{
    DEFAULT_FIELDS,
    DictionaryTree,
    Entry,
    Fields,
};
pub use error::{
    DictionaryError,
    SourceError,
};
pub use source::{
    DictionarySource,
    FileSource,
    MemorySource,
    parse_dictionary,
};
pub use store::DictionaryStore;
