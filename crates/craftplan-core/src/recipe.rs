//! Slot role classification and per-craft amounts for a single recipe.

use crate::key::ItemKey;
use crate::pack::{ItemStack, Recipe, RecipeTypeDef, SlotIo, Stack};

/// Replace a non-finite or negative quantity with 0.
pub fn sanitize_amount(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { 0.0 }
}

/// Slot role guessed from its id when the recipe type does not declare it:
/// ids starting with `out` or containing `output` are outputs.
pub fn slot_io_fallback(slot_id: &str) -> SlotIo {
    let id = slot_id.to_lowercase();
    if id.starts_with("out") || id.contains("output") {
        SlotIo::Output
    } else {
        SlotIo::Input
    }
}

/// Role of `slot_id`, from the type's declaration when present.
pub fn slot_io(recipe_type: Option<&RecipeTypeDef>, slot_id: &str) -> SlotIo {
    recipe_type
        .and_then(|t| t.slot(slot_id))
        .map(|s| s.io)
        .unwrap_or_else(|| slot_io_fallback(slot_id))
}

/// A recipe's stacks split by role. Catalysts keep item stacks only.
#[derive(Debug, Clone, Default)]
pub struct RecipeStacks {
    pub inputs: Vec<Stack>,
    pub outputs: Vec<Stack>,
    pub catalysts: Vec<ItemStack>,
}

impl RecipeStacks {
    pub fn extract(recipe: &Recipe, recipe_type: Option<&RecipeTypeDef>) -> Self {
        let mut out = Self::default();
        for (slot_id, content) in &recipe.slot_contents {
            let stacks = content.stacks();
            match slot_io(recipe_type, slot_id) {
                SlotIo::Output => out.outputs.extend_from_slice(stacks),
                SlotIo::Input => out.inputs.extend_from_slice(stacks),
                SlotIo::Catalyst => out.catalysts.extend(stacks.iter().filter_map(|s| match s {
                    Stack::Item(item) => Some(item.clone()),
                    _ => None,
                })),
            }
        }
        out
    }

    /// Units of `key` produced by one craft.
    pub fn output_amount_for(&self, key: &ItemKey) -> f64 {
        matching_total(&self.outputs, key)
    }

    /// Units of `key` consumed by one craft.
    pub fn input_amount_for(&self, key: &ItemKey) -> f64 {
        matching_total(&self.inputs, key)
    }
}

fn matching_total(stacks: &[Stack], key: &ItemKey) -> f64 {
    stacks
        .iter()
        .filter_map(|s| match s {
            Stack::Item(item) if item.matches(key) => Some(sanitize_amount(item.amount)),
            _ => None,
        })
        .sum()
}
