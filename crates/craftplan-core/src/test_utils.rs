//! Pack-building helpers for tests and benchmarks.
//!
//! Compiled for unit tests and, through the `test-utils` feature, for the
//! integration tests and benches. [`PackBuilder`] assembles a [`PackData`]
//! without going through JSON.

use crate::key::{ItemKey, Meta};
use crate::pack::*;
use std::collections::BTreeMap;

// ===========================================================================
// Stack constructors
// ===========================================================================

pub fn item_stack(id: &str, amount: f64) -> Stack {
    Stack::Item(ItemStack::new(id, amount))
}

pub fn item_stack_meta(id: &str, meta: i64, amount: f64) -> Stack {
    let mut stack = ItemStack::new(id, amount);
    stack.meta = Some(Meta::Int(meta));
    Stack::Item(stack)
}

pub fn fluid_stack(id: &str, amount: f64, unit: Option<&str>) -> Stack {
    Stack::Fluid(FluidStack {
        id: id.to_string(),
        amount,
        unit: unit.map(str::to_string),
    })
}

pub fn tag_stack(id: &str, amount: f64) -> Stack {
    Stack::Tag(TagStack {
        id: id.to_string(),
        amount,
        unit: None,
    })
}

// ===========================================================================
// PackBuilder
// ===========================================================================

/// Incrementally assembles a [`PackData`] for tests.
#[derive(Debug)]
pub struct PackBuilder {
    namespace: String,
    items: Vec<ItemDef>,
    recipe_types: Vec<RecipeTypeDef>,
    recipes: Vec<Recipe>,
    tags: BTreeMap<String, TagDef>,
}

impl PackBuilder {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            items: Vec::new(),
            recipe_types: Vec::new(),
            recipes: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn item(&mut self, id: &str) -> &mut Self {
        self.item_key(ItemKey::new(id))
    }

    pub fn item_key(&mut self, key: ItemKey) -> &mut Self {
        self.items.push(ItemDef::new(key));
        self
    }

    pub fn item_with_tags(&mut self, id: &str, tags: &[&str]) -> &mut Self {
        let mut def = ItemDef::new(ItemKey::new(id));
        def.tags = tags.iter().map(|t| t.to_string()).collect();
        self.items.push(def);
        self
    }

    pub fn items(&mut self, ids: &[&str]) -> &mut Self {
        for id in ids {
            self.item(id);
        }
        self
    }

    /// Register a recipe type with declared slots and an optional
    /// `(machine_id, machine_name)`.
    pub fn recipe_type(
        &mut self,
        key: &str,
        slots: &[(&str, SlotIo)],
        machine: Option<(&str, &str)>,
    ) -> &mut Self {
        self.recipe_types.push(RecipeTypeDef {
            key: key.to_string(),
            display_name: None,
            slots: slots
                .iter()
                .map(|(slot_id, io)| SlotDef {
                    slot_id: slot_id.to_string(),
                    io: *io,
                    label: None,
                })
                .collect(),
            machine: machine.map(|(id, name)| MachineDef {
                id: id.to_string(),
                name: Some(name.to_string()),
            }),
        });
        self
    }

    /// Start a recipe. Slots are added through the returned builder.
    pub fn recipe(&mut self, id: &str, recipe_type: &str) -> RecipeBuilder<'_> {
        self.recipes.push(Recipe {
            id: id.to_string(),
            recipe_type: recipe_type.to_string(),
            slot_contents: BTreeMap::new(),
            inline_items: Vec::new(),
        });
        let last = self.recipes.len() - 1;
        RecipeBuilder {
            recipe: &mut self.recipes[last],
            inputs: 0,
            outputs: 0,
        }
    }

    /// A tag whose values are all required item ids or `#tag` references.
    pub fn tag(&mut self, id: &str, values: &[&str]) -> &mut Self {
        let values = values.iter().map(|v| TagValue::Id(v.to_string())).collect();
        self.tag_values(id, values)
    }

    pub fn tag_values(&mut self, id: &str, values: Vec<TagValue>) -> &mut Self {
        self.tags.insert(id.to_string(), TagDef { values });
        self
    }

    pub fn build(&self) -> PackData {
        PackData {
            manifest: PackManifest {
                pack_id: "test".to_string(),
                game_id: self.namespace.clone(),
                display_name: None,
                version: None,
                files: PackFiles {
                    items: Some("items.json".to_string()),
                    recipe_types: "recipe_types.json".to_string(),
                    recipes: "recipes.json".to_string(),
                    tags: (!self.tags.is_empty()).then(|| "tags.json".to_string()),
                },
            },
            items: self.items.clone(),
            recipe_types: self.recipe_types.clone(),
            recipes: self.recipes.clone(),
            tags: (!self.tags.is_empty()).then(|| PackTags {
                item: self.tags.clone(),
            }),
        }
    }
}

/// Adds slots to a recipe registered through [`PackBuilder::recipe`].
///
/// `input` and `output` use generated slot ids (`in0`, `out0`, ...) that the
/// slot-name heuristic classifies correctly when the recipe type declares no
/// slots.
#[derive(Debug)]
pub struct RecipeBuilder<'a> {
    recipe: &'a mut Recipe,
    inputs: usize,
    outputs: usize,
}

impl RecipeBuilder<'_> {
    pub fn input(mut self, stack: Stack) -> Self {
        let slot = format!("in{}", self.inputs);
        self.inputs += 1;
        self.slot(&slot, stack)
    }

    pub fn output(mut self, stack: Stack) -> Self {
        let slot = format!("out{}", self.outputs);
        self.outputs += 1;
        self.slot(&slot, stack)
    }

    /// Put a stack into a named slot. A second stack in the same slot turns
    /// the slot into a list of alternatives.
    pub fn slot(mut self, slot_id: &str, stack: Stack) -> Self {
        let contents = &mut self.recipe.slot_contents;
        let next = match contents.remove(slot_id) {
            None => SlotContent::One(stack),
            Some(SlotContent::One(prev)) => SlotContent::Many(vec![prev, stack]),
            Some(SlotContent::Many(mut list)) => {
                list.push(stack);
                SlotContent::Many(list)
            }
        };
        contents.insert(slot_id.to_string(), next);
        self
    }

    pub fn inline_item(mut self, id: &str) -> Self {
        self.recipe.inline_items.push(ItemDef::new(ItemKey::new(id)));
        self
    }
}
