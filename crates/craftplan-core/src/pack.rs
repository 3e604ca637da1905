//! Typed content snapshot handed to the core by the loading collaborator.
//!
//! These structs mirror the pack's on-disk JSON layout (camelCase field
//! names) so a snapshot can be deserialized directly. The core never mutates
//! a [`PackData`]; indices and plans are derived from it as fresh values.

use crate::key::{ItemKey, Meta, stable_json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

// ===========================================================================
// Items
// ===========================================================================

/// Item metadata keyed by its [`ItemKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDef {
    pub key: ItemKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tags this item declares membership in (raw, possibly unqualified).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ItemDef {
    pub fn new(key: ItemKey) -> Self {
        Self {
            key,
            name: None,
            tags: Vec::new(),
        }
    }
}

// ===========================================================================
// Recipe types
// ===========================================================================

/// Role of a slot within a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotIo {
    Input,
    Output,
    Catalyst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDef {
    pub slot_id: String,
    pub io: SlotIo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// The crafting station a recipe type runs in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineDef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A recipe category with its ordered slot declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeTypeDef {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub slots: Vec<SlotDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<MachineDef>,
}

impl RecipeTypeDef {
    pub fn slot(&self, slot_id: &str) -> Option<&SlotDef> {
        self.slots.iter().find(|s| s.slot_id == slot_id)
    }
}

// ===========================================================================
// Stacks
// ===========================================================================

/// A concrete item requirement or product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStack {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbt: Option<Value>,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl ItemStack {
    pub fn new(id: impl Into<String>, amount: f64) -> Self {
        Self {
            id: id.into(),
            meta: None,
            nbt: None,
            amount,
            unit: None,
        }
    }

    /// The key this stack names. Exact when the stack carries meta or nbt.
    pub fn key(&self) -> ItemKey {
        ItemKey {
            id: self.id.clone(),
            meta: self.meta.clone(),
            nbt: self.nbt.clone(),
        }
    }

    /// Whether this stack satisfies `key`. A wildcard key matches any variant
    /// of the same id; meta and nbt are only compared when the key has them.
    pub fn matches(&self, key: &ItemKey) -> bool {
        if self.id != key.id {
            return false;
        }
        if key.meta.is_some() && self.meta != key.meta {
            return false;
        }
        match (&key.nbt, &self.nbt) {
            (None, _) => true,
            (Some(want), Some(have)) => stable_json(want) == stable_json(have),
            (Some(_), None) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluidStack {
    pub id: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// "Any item satisfying this tag".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagStack {
    pub id: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stack {
    Item(ItemStack),
    Fluid(FluidStack),
    Tag(TagStack),
}

impl Stack {
    pub fn amount(&self) -> f64 {
        match self {
            Stack::Item(s) => s.amount,
            Stack::Fluid(s) => s.amount,
            Stack::Tag(s) => s.amount,
        }
    }
}

/// One stack, or an ordered list of OR-alternatives for the same slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotContent {
    One(Stack),
    Many(Vec<Stack>),
}

impl SlotContent {
    pub fn stacks(&self) -> &[Stack] {
        match self {
            SlotContent::One(stack) => std::slice::from_ref(stack),
            SlotContent::Many(stacks) => stacks,
        }
    }
}

// ===========================================================================
// Recipes
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    #[serde(rename = "type")]
    pub recipe_type: String,
    #[serde(default)]
    pub slot_contents: BTreeMap<String, SlotContent>,
    /// Item definitions referenced by this recipe but absent from the catalog.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inline_items: Vec<ItemDef>,
}

// ===========================================================================
// Tags
// ===========================================================================

/// One entry in a tag definition. A value starting with `#` references
/// another tag; anything else is an item id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Id(String),
    Entry {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        required: Option<bool>,
    },
}

impl TagValue {
    pub fn id(&self) -> &str {
        match self {
            TagValue::Id(id) | TagValue::Entry { id, .. } => id,
        }
    }

    /// Values are required unless explicitly marked `required: false`.
    pub fn is_required(&self) -> bool {
        match self {
            TagValue::Id(_) => true,
            TagValue::Entry { required, .. } => required.unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TagDef {
    #[serde(default)]
    pub values: Vec<TagValue>,
}

/// Raw tag definitions, keyed by (possibly unqualified) tag id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackTags {
    #[serde(default)]
    pub item: BTreeMap<String, TagDef>,
}

// ===========================================================================
// Manifest and snapshot
// ===========================================================================

/// Data file names, relative to the pack directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackFiles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
    pub recipe_types: String,
    pub recipes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackManifest {
    pub pack_id: String,
    /// Game identifier; doubles as the default tag namespace.
    pub game_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub files: PackFiles,
}

impl PackManifest {
    pub fn default_namespace(&self) -> &str {
        &self.game_id
    }
}

/// A complete, already-validated content snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackData {
    pub manifest: PackManifest,
    #[serde(default)]
    pub items: Vec<ItemDef>,
    #[serde(default)]
    pub recipe_types: Vec<RecipeTypeDef>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<PackTags>,
}

/// Fold every recipe's inline item definitions into the catalog.
///
/// Catalog items come first, then inline items in recipe order. On a
/// fingerprint collision the first definition seen wins.
pub fn merge_inline_items(items: Vec<ItemDef>, recipes: &[Recipe]) -> Vec<ItemDef> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(items.len());

    let inline = recipes.iter().flat_map(|r| r.inline_items.iter().cloned());
    for item in items.into_iter().chain(inline) {
        if seen.insert(item.key.fingerprint()) {
            merged.push(item);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stack_kinds_deserialize() {
        let content: SlotContent = serde_json::from_value(json!([
            {"kind": "item", "id": "iron", "amount": 2},
            {"kind": "fluid", "id": "water", "amount": 1000, "unit": "mB"},
            {"kind": "tag", "id": "#logs", "amount": 1}
        ]))
        .unwrap();
        let stacks = content.stacks();
        assert_eq!(stacks.len(), 3);
        assert!(matches!(&stacks[0], Stack::Item(s) if s.id == "iron" && s.amount == 2.0));
        assert!(matches!(&stacks[1], Stack::Fluid(s) if s.unit.as_deref() == Some("mB")));
        assert!(matches!(&stacks[2], Stack::Tag(s) if s.id == "#logs"));
    }

    #[test]
    fn single_stack_slot() {
        let content: SlotContent =
            serde_json::from_value(json!({"kind": "item", "id": "iron", "amount": 1})).unwrap();
        assert_eq!(content.stacks().len(), 1);
    }

    #[test]
    fn recipe_uses_type_field() {
        let recipe: Recipe = serde_json::from_value(json!({
            "id": "r1",
            "type": "crafting",
            "slotContents": {"out": {"kind": "item", "id": "gear", "amount": 1}}
        }))
        .unwrap();
        assert_eq!(recipe.recipe_type, "crafting");
        assert!(recipe.inline_items.is_empty());
    }

    #[test]
    fn tag_value_required_defaults_true() {
        let values: Vec<TagValue> =
            serde_json::from_value(json!(["a", {"id": "b"}, {"id": "c", "required": false}]))
                .unwrap();
        assert!(values[0].is_required());
        assert!(values[1].is_required());
        assert!(!values[2].is_required());
        assert_eq!(values[2].id(), "c");
    }

    #[test]
    fn wildcard_key_matches_any_variant() {
        let mut stack = ItemStack::new("wool", 1.0);
        stack.meta = Some(Meta::Int(3));
        assert!(stack.matches(&ItemKey::new("wool")));
        assert!(stack.matches(&ItemKey::new("wool").with_meta(3)));
        assert!(!stack.matches(&ItemKey::new("wool").with_meta(4)));
        assert!(!stack.matches(&ItemKey::new("cotton")));
    }

    #[test]
    fn nbt_match_ignores_field_order() {
        let mut stack = ItemStack::new("potion", 1.0);
        stack.nbt = Some(json!({"a": 1, "b": 2}));
        assert!(stack.matches(&ItemKey::new("potion").with_nbt(json!({"b": 2, "a": 1}))));
        assert!(!ItemStack::new("potion", 1.0).matches(&ItemKey::new("potion").with_nbt(json!({}))));
    }

    #[test]
    fn merge_inline_first_seen_wins() {
        let mut catalog_stone = ItemDef::new(ItemKey::new("stone"));
        catalog_stone.name = Some("Stone".into());
        let mut inline_stone = ItemDef::new(ItemKey::new("stone"));
        inline_stone.name = Some("Inline Stone".into());

        let recipe = Recipe {
            id: "r".into(),
            recipe_type: "t".into(),
            slot_contents: BTreeMap::new(),
            inline_items: vec![inline_stone, ItemDef::new(ItemKey::new("pebble"))],
        };

        let merged = merge_inline_items(vec![catalog_stone], &[recipe]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name.as_deref(), Some("Stone"));
        assert_eq!(merged[1].key.id, "pebble");
    }
}
