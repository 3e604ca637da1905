//! Tag resolution: turns named, possibly nested item groups into concrete
//! item-id sets.
//!
//! Tag ids are normalized to `namespace:name` (a leading `#` is stripped and
//! the pack's default namespace applied when none is given). Each tag is
//! resolved depth-first with memoization; a tag is **invalid** and resolves
//! to the empty set when it is undefined, part of a reference cycle, lists an
//! unknown item id as required, contains an empty value, or references an
//! invalid tag. Invalid tags never abort resolution of unrelated tags.

use crate::pack::{ItemDef, PackTags, TagDef};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Normalize a tag reference to `namespace:name`. Returns an empty string
/// for an empty reference.
pub fn normalize_tag_id(tag_id: &str, default_namespace: &str) -> String {
    let t = tag_id.strip_prefix('#').unwrap_or(tag_id);
    if t.is_empty() {
        String::new()
    } else if t.contains(':') {
        t.to_string()
    } else {
        format!("{default_namespace}:{t}")
    }
}

/// Why a tag resolved to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTagReason {
    Undefined,
    Cycle,
    UnknownRequiredItem,
    MalformedValue,
    InvalidReference,
}

// ---------------------------------------------------------------------------
// TagIndex
// ---------------------------------------------------------------------------

/// Item sets by tag and tag sets by item, plus the tags found invalid.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    item_ids_by_tag: BTreeMap<String, BTreeSet<String>>,
    tag_ids_by_item: BTreeMap<String, BTreeSet<String>>,
    invalid: BTreeSet<String>,
}

impl TagIndex {
    /// Resolve `tags` against the item catalog. Direct tag declarations on
    /// items are merged into the result.
    pub fn build(items: &[ItemDef], tags: Option<&PackTags>, default_namespace: &str) -> Self {
        let mut index = Self::default();

        for item in items {
            for raw in &item.tags {
                let tag_id = normalize_tag_id(raw, default_namespace);
                if !tag_id.is_empty() {
                    index.link(&tag_id, &item.key.id);
                }
            }
        }

        // First definition wins when two raw ids normalize to the same tag.
        let mut defs: BTreeMap<String, &TagDef> = BTreeMap::new();
        if let Some(tags) = tags {
            for (raw, def) in &tags.item {
                let tag_id = normalize_tag_id(raw, default_namespace);
                if !tag_id.is_empty() {
                    defs.entry(tag_id).or_insert(def);
                }
            }
        }

        let known: HashSet<&str> = items.iter().map(|i| i.key.id.as_str()).collect();
        let mut resolver = TagResolver {
            defs: &defs,
            known_items: &known,
            default_namespace,
            resolved: HashMap::new(),
            invalid: BTreeSet::new(),
            visiting: HashSet::new(),
        };
        for tag_id in defs.keys() {
            resolver.resolve(tag_id);
        }

        let TagResolver {
            resolved, invalid, ..
        } = resolver;
        for (tag_id, item_ids) in resolved {
            for item_id in item_ids {
                index.link(&tag_id, &item_id);
            }
        }
        index.invalid = invalid;
        index
    }

    fn link(&mut self, tag_id: &str, item_id: &str) {
        self.item_ids_by_tag
            .entry(tag_id.to_string())
            .or_default()
            .insert(item_id.to_string());
        self.tag_ids_by_item
            .entry(item_id.to_string())
            .or_default()
            .insert(tag_id.to_string());
    }

    /// Items satisfying a normalized tag id, sorted.
    pub fn items_in(&self, tag_id: &str) -> Option<&BTreeSet<String>> {
        self.item_ids_by_tag.get(tag_id)
    }

    /// Normalized tags an item belongs to, sorted.
    pub fn tags_of(&self, item_id: &str) -> Option<&BTreeSet<String>> {
        self.tag_ids_by_item.get(item_id)
    }

    pub fn is_invalid(&self, tag_id: &str) -> bool {
        self.invalid.contains(tag_id)
    }

    pub fn invalid_tags(&self) -> impl Iterator<Item = &str> {
        self.invalid.iter().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

struct TagResolver<'a> {
    defs: &'a BTreeMap<String, &'a TagDef>,
    known_items: &'a HashSet<&'a str>,
    default_namespace: &'a str,
    resolved: HashMap<String, BTreeSet<String>>,
    invalid: BTreeSet<String>,
    /// Tags on the current resolution path.
    visiting: HashSet<String>,
}

impl TagResolver<'_> {
    fn resolve(&mut self, tag_id: &str) -> BTreeSet<String> {
        if tag_id.is_empty() || self.invalid.contains(tag_id) {
            return BTreeSet::new();
        }
        if let Some(cached) = self.resolved.get(tag_id) {
            return cached.clone();
        }
        if self.visiting.contains(tag_id) {
            return self.reject(tag_id, InvalidTagReason::Cycle);
        }
        let defs = self.defs;
        let Some(def) = defs.get(tag_id).copied() else {
            return self.reject(tag_id, InvalidTagReason::Undefined);
        };

        self.visiting.insert(tag_id.to_string());
        let result = self.resolve_values(def);
        self.visiting.remove(tag_id);

        match result {
            Ok(set) => {
                self.resolved.insert(tag_id.to_string(), set.clone());
                set
            }
            Err(reason) => self.reject(tag_id, reason),
        }
    }

    fn resolve_values(&mut self, def: &TagDef) -> Result<BTreeSet<String>, InvalidTagReason> {
        let mut set = BTreeSet::new();
        for value in &def.values {
            let id = value.id();
            if id.is_empty() {
                return Err(InvalidTagReason::MalformedValue);
            }

            if id.starts_with('#') {
                let ref_id = normalize_tag_id(id, self.default_namespace);
                let items = self.resolve(&ref_id);
                if self.invalid.contains(&ref_id) {
                    return Err(InvalidTagReason::InvalidReference);
                }
                set.extend(items);
                continue;
            }

            if !self.known_items.contains(id) {
                if value.is_required() {
                    return Err(InvalidTagReason::UnknownRequiredItem);
                }
                continue;
            }
            set.insert(id.to_string());
        }
        Ok(set)
    }

    fn reject(&mut self, tag_id: &str, reason: InvalidTagReason) -> BTreeSet<String> {
        debug!(tag = tag_id, ?reason, "tag resolved as invalid");
        self.invalid.insert(tag_id.to_string());
        BTreeSet::new()
    }
}
