//! Craftplan Core -- requirement planning over game-content packs.
//!
//! Given a validated content snapshot ([`pack::PackData`]) this crate answers
//! "what do I need to produce N units of item X": it indexes items, recipes
//! and tags, expands recipes into a cycle-aware requirement tree, and
//! flattens that tree into a deduplicated production-line graph.
//!
//! # Pipeline
//!
//! Data flows one way and every stage returns a fresh value:
//!
//! 1. **Index** -- [`index::ContentIndex::build`] records items by
//!    fingerprint, recipes by id and type, reverse producer/consumer tables,
//!    and resolved tags.
//! 2. **Decide** -- [`planner::Planner::decisions`] lists the recipe and tag
//!    choices the caller still has to make.
//! 3. **Plan** -- [`planner::Planner::build_tree`] expands the target under
//!    the caller's [`planner::Selections`] into a [`planner::RequirementTree`]
//!    with leaf item, fluid and catalyst totals.
//! 4. **Flatten** -- [`line::build_production_line`] turns the tree into item,
//!    fluid and machine nodes joined by summed flow edges.
//!
//! ```rust,ignore
//! let index = ContentIndex::build(&pack);
//! let planner = Planner::new(&index);
//! let gear = ItemKey::new("gear");
//! assert!(planner.decisions(&gear, &selections).is_empty());
//! let tree = planner.build_tree(&gear, 64.0, &selections);
//! let line = build_production_line(&tree.root, &LineOptions::default());
//! ```
//!
//! # Key Types
//!
//! - [`key::ItemKey`] -- Item identity (id + optional meta + optional nbt)
//!   with a canonical, key-order-independent fingerprint.
//! - [`tags::TagIndex`] -- Resolved tag membership with invalid tags isolated.
//! - [`index::ContentIndex`] -- Read-only lookup tables over one pack.
//! - [`planner::Planner`] -- Decision enumeration and tree construction.
//! - [`line::ProductionLine`] -- Deduplicated node/edge graph.
//!
//! The crate performs no I/O. Loading packs from disk lives in
//! `craftplan-data`.

pub mod index;
pub mod key;
pub mod line;
pub mod pack;
pub mod planner;
pub mod recipe;
pub mod tags;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
