//! Storage strategy layer.
//!
//! Decides where a cache version's bytes live. Each namespace gets one
//! [`NamespaceHandler`], created on first use by the [`HandlerRegistry`],
//! which resolves content paths through the [`PathLayout`] of the chosen
//! strategy as well as the namespace's reference paths:
//!
//! ```text
//! {ns}/data/direct/{id[0:2]}/{id[2:4]}/{file_id}.{ext}
//! {ns}/data/temporal/{YYYY}/{MM}/{DD}/{HH}/{file_id}.{ext}
//! {ns}/data/temporal-latest/{dated | latest}/{file_id}.{ext}
//! {ns}/data/temporal-versioned/{dated | latest | versions/vN}/{file_id}.{ext}
//! {ns}/data/key-based/{semantic_key}/{file_id}.{ext}
//! {ns}/refs/by-hash/{h[0:2]}/{h[2:4]}/{hash}.json
//! {ns}/refs/by-id/{id[0:2]}/{id[2:4]}/{id}.json
//! ```

mod handler;
mod layout;
mod registry;
mod types;

pub use handler::{config_path, metadata_path, NamespaceHandler};
pub use layout::{
    layout_for, DirectLayout, KeyBasedLayout, PathLayout, PathTarget, TemporalLatestLayout,
    TemporalLayout, TemporalVersionedLayout,
};
pub use registry::HandlerRegistry;
pub use types::{StorageStrategy, UnknownStrategyError};
