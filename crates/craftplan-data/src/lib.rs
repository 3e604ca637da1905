//! Craftplan Data -- loads content packs from disk into [`PackData`].
//!
//! A pack directory holds a `manifest` file (RON, TOML or JSON) that names
//! the items, recipe types, recipes and tags files. [`load_pack`] reads them,
//! merges inline recipe items into the catalog and hands back a complete
//! snapshot ready for [`craftplan_core::index::ContentIndex::build`].
//!
//! [`PackData`]: craftplan_core::pack::PackData

pub mod loader;

pub use loader::{PackLoadError, load_pack, load_pack_checked};
