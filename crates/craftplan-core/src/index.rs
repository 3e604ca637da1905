//! Read-only lookup tables over a content snapshot.
//!
//! [`ContentIndex::build`] walks a [`PackData`] once and records items by
//! fingerprint, recipes by id and by type, and reverse "which recipes
//! produce / consume this item" tables. Item stacks that carry meta or nbt
//! are indexed under their exact fingerprint; bare stacks are indexed under
//! their id and match every variant of it. The index is never mutated after
//! construction.

use crate::key::ItemKey;
use crate::pack::{ItemDef, PackData, Recipe, RecipeTypeDef, SlotIo, Stack};
use crate::recipe::{RecipeStacks, slot_io};
use crate::tags::{TagIndex, normalize_tag_id};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Reverse index for one direction: exact fingerprints and id wildcards.
#[derive(Debug, Clone, Default)]
struct ReverseIndex {
    by_fingerprint: HashMap<String, Vec<String>>,
    by_item_id: HashMap<String, Vec<String>>,
}

impl ReverseIndex {
    fn insert(&mut self, key: &ItemKey, recipe_id: &str) {
        let list = if key.is_exact() {
            self.by_fingerprint.entry(key.fingerprint()).or_default()
        } else {
            self.by_item_id.entry(key.id.clone()).or_default()
        };
        list.push(recipe_id.to_string());
    }

    /// Exact hits first, then wildcard hits; duplicates removed.
    fn lookup(&self, key: &ItemKey) -> Vec<String> {
        let exact = self.by_fingerprint.get(&key.fingerprint());
        let wildcard = self.by_item_id.get(&key.id);

        let mut seen = HashSet::new();
        exact
            .into_iter()
            .chain(wildcard)
            .flatten()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// ContentIndex
// ---------------------------------------------------------------------------

/// All lookup tables derived from one [`PackData`].
#[derive(Debug, Clone)]
pub struct ContentIndex {
    default_namespace: String,
    items_by_fingerprint: HashMap<String, ItemDef>,
    fingerprints_by_item_id: HashMap<String, Vec<String>>,
    recipe_types_by_key: HashMap<String, RecipeTypeDef>,
    recipes_by_id: HashMap<String, Recipe>,
    recipe_ids_by_type: BTreeMap<String, Vec<String>>,
    producing: ReverseIndex,
    consuming: ReverseIndex,
    tags: TagIndex,
}

impl ContentIndex {
    pub fn build(pack: &PackData) -> Self {
        let default_namespace = pack.manifest.default_namespace().to_string();

        let mut items_by_fingerprint = HashMap::new();
        let mut fingerprints_by_item_id: HashMap<String, Vec<String>> = HashMap::new();
        for item in &pack.items {
            let fp = item.key.fingerprint();
            fingerprints_by_item_id
                .entry(item.key.id.clone())
                .or_default()
                .push(fp.clone());
            items_by_fingerprint.insert(fp, item.clone());
        }

        let recipe_types_by_key: HashMap<String, RecipeTypeDef> = pack
            .recipe_types
            .iter()
            .map(|t| (t.key.clone(), t.clone()))
            .collect();

        let mut recipes_by_id = HashMap::new();
        let mut recipe_ids_by_type: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut producing = ReverseIndex::default();
        let mut consuming = ReverseIndex::default();
        for recipe in &pack.recipes {
            let recipe_type = recipe_types_by_key.get(&recipe.recipe_type);
            for (slot_id, content) in &recipe.slot_contents {
                let target = match slot_io(recipe_type, slot_id) {
                    SlotIo::Output => &mut producing,
                    SlotIo::Input | SlotIo::Catalyst => &mut consuming,
                };
                for stack in content.stacks() {
                    if let Stack::Item(item) = stack {
                        target.insert(&item.key(), &recipe.id);
                    }
                }
            }
            recipe_ids_by_type
                .entry(recipe.recipe_type.clone())
                .or_default()
                .push(recipe.id.clone());
            recipes_by_id.insert(recipe.id.clone(), recipe.clone());
        }

        let tags = TagIndex::build(&pack.items, pack.tags.as_ref(), &default_namespace);

        debug!(
            items = items_by_fingerprint.len(),
            recipe_types = recipe_types_by_key.len(),
            recipes = recipes_by_id.len(),
            invalid_tags = tags.invalid_tags().count(),
            "content index built"
        );

        Self {
            default_namespace,
            items_by_fingerprint,
            fingerprints_by_item_id,
            recipe_types_by_key,
            recipes_by_id,
            recipe_ids_by_type,
            producing,
            consuming,
            tags,
        }
    }

    // -- Lookups --

    /// Namespace applied to unqualified tag ids.
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub fn item(&self, fingerprint: &str) -> Option<&ItemDef> {
        self.items_by_fingerprint.get(fingerprint)
    }

    /// Fingerprints of every known variant of `item_id`, in catalog order.
    pub fn variants_of(&self, item_id: &str) -> &[String] {
        self.fingerprints_by_item_id
            .get(item_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn recipe_type(&self, key: &str) -> Option<&RecipeTypeDef> {
        self.recipe_types_by_key.get(key)
    }

    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes_by_id.get(id)
    }

    /// Recipe ids of a recipe type, in pack order.
    pub fn recipes_of_type(&self, type_key: &str) -> &[String] {
        self.recipe_ids_by_type
            .get(type_key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Recipes with an output stack matching `key`, exact hits first.
    pub fn recipes_producing(&self, key: &ItemKey) -> Vec<String> {
        self.producing.lookup(key)
    }

    /// Recipes with an input or catalyst stack matching `key`.
    pub fn recipes_consuming(&self, key: &ItemKey) -> Vec<String> {
        self.consuming.lookup(key)
    }

    pub fn tags(&self) -> &TagIndex {
        &self.tags
    }

    /// Candidate item ids for a raw tag reference, sorted.
    pub fn tag_candidates(&self, raw_tag_id: &str) -> (String, Vec<String>) {
        let tag_id = normalize_tag_id(raw_tag_id, &self.default_namespace);
        let candidates = self
            .tags
            .items_in(&tag_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        (tag_id, candidates)
    }

    /// The recipe with its type definition and role-split stacks.
    pub fn recipe_stacks(
        &self,
        recipe_id: &str,
    ) -> Option<(&Recipe, Option<&RecipeTypeDef>, RecipeStacks)> {
        let recipe = self.recipe(recipe_id)?;
        let recipe_type = self.recipe_type(&recipe.recipe_type);
        let stacks = RecipeStacks::extract(recipe, recipe_type);
        Some((recipe, recipe_type, stacks))
    }
}
