//! Declarative bindings between document nodes and dictionary keys.
mod binding;
mod index;

pub use binding::{
    Binding,
    Marker,
    MarkerError,
    RenderMode,
};
pub use index::{
    ApplyStats,
    RenderIndex,
};
