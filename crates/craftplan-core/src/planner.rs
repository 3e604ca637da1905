//! Requirement planning: "what do I need to make N of item X".
//!
//! Two operations share one traversal of the recipe graph:
//!
//! - [`Planner::decisions`] lists the choices a caller must make (which
//!   recipe for an item with several producers, which item for a tag with
//!   several members) before a concrete tree is meaningful.
//! - [`Planner::build_tree`] expands recipes into a [`RequirementNode`] tree
//!   under the caller's [`Selections`], accumulating leaf item, leaf fluid
//!   and catalyst totals.
//!
//! # Cycles
//!
//! The tree builder keeps the open ancestor chain. Re-entering an item that
//! is still on the chain produces a cycle node that is never expanded. The
//! chain is used to compute the cycle's growth factor (the product of
//! `output per craft / input consumed` along every edge of the loop). A
//! growing loop is seeded with the amount its immediate predecessor consumes
//! per craft; any other loop is seeded with the amount requested at re-entry.
//! Cycle seeds are always counted as leaf items.
//!
//! # Termination
//!
//! Both traversals stop at [`PlannerConfig::max_depth`]. Beyond it an item is
//! treated as a leaf (tree) or ignored (decisions).

use crate::index::ContentIndex;
use crate::key::ItemKey;
use crate::pack::{ItemStack, Recipe, RecipeTypeDef, Stack, TagStack};
use crate::recipe::{RecipeStacks, sanitize_amount};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for both planner traversals.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Recursion ceiling. The root is at depth 0.
    pub max_depth: usize,
    /// A cycle grows when its factor exceeds `1 + growth_tolerance`.
    pub growth_tolerance: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_depth: 20,
            growth_tolerance: 1e-6,
        }
    }
}

// ---------------------------------------------------------------------------
// Caller choices
// ---------------------------------------------------------------------------

/// Choices supplied by the caller. Absent entries are still ambiguous.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selections {
    /// Chosen recipe id per exact item fingerprint.
    #[serde(default)]
    pub recipe_by_fingerprint: BTreeMap<String, String>,
    /// Chosen item id per normalized tag id.
    #[serde(default)]
    pub item_by_tag: BTreeMap<String, String>,
}

impl Selections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_recipe(mut self, key: &ItemKey, recipe_id: &str) -> Self {
        self.recipe_by_fingerprint
            .insert(key.fingerprint(), recipe_id.to_string());
        self
    }

    /// `tag_id` must already be normalized (`namespace:name`).
    pub fn select_tag_item(mut self, tag_id: &str, item_id: &str) -> Self {
        self.item_by_tag
            .insert(tag_id.to_string(), item_id.to_string());
        self
    }

    pub fn recipe_for(&self, fingerprint: &str) -> Option<&str> {
        self.recipe_by_fingerprint
            .get(fingerprint)
            .map(String::as_str)
    }

    pub fn item_for_tag(&self, tag_id: &str) -> Option<&str> {
        self.item_by_tag.get(tag_id).map(String::as_str)
    }
}

/// A complete planning request, as saved and restored by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    /// Label the caller saved the plan under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub root: ItemKey,
    pub target_amount: f64,
    #[serde(default)]
    pub selections: Selections,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// A choice the caller still has to make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// The item has several producing recipes and none is selected.
    ItemRecipe {
        item_key: ItemKey,
        fingerprint: String,
        recipe_options: Vec<String>,
    },
    /// The tag has several members and none is selected, or it has none at
    /// all (the requirement cannot be satisfied).
    TagItem {
        tag_id: String,
        candidate_item_ids: Vec<String>,
    },
}

/// The recipe an item node is produced by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeUse {
    pub recipe_id: String,
    pub recipe_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_name: Option<String>,
}

/// Values attached to an item node after planning (machine counts computed
/// from crafting times, adjusted cycle seeds, ...). The planner leaves these
/// empty; the production line builder reads them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAnnotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_seed_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_amount_needed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machines: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemNode {
    pub node_id: String,
    pub item_key: ItemKey,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<RecipeUse>,
    #[serde(default)]
    pub children: Vec<RequirementNode>,
    /// Catalysts the chosen recipe requires, not expanded.
    #[serde(default)]
    pub catalysts: Vec<ItemStack>,
    /// Re-entry of an item already on the expansion path.
    #[serde(default)]
    pub cycle: bool,
    /// Set on cycle nodes whose loop grows; the amount is the seed.
    #[serde(default)]
    pub cycle_seed: bool,
    #[serde(default)]
    pub annotations: NodeAnnotations,
}

impl ItemNode {
    fn leaf(node_id: String, item_key: ItemKey, amount: f64) -> Self {
        Self {
            node_id,
            item_key,
            amount,
            unit: None,
            recipe: None,
            children: Vec::new(),
            catalysts: Vec::new(),
            cycle: false,
            cycle_seed: false,
            annotations: NodeAnnotations::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluidNode {
    pub node_id: String,
    pub id: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequirementNode {
    Item(ItemNode),
    Fluid(FluidNode),
}

impl RequirementNode {
    pub fn node_id(&self) -> &str {
        match self {
            RequirementNode::Item(n) => &n.node_id,
            RequirementNode::Fluid(n) => &n.node_id,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            RequirementNode::Item(n) => n.amount,
            RequirementNode::Fluid(n) => n.amount,
        }
    }

    pub fn as_item(&self) -> Option<&ItemNode> {
        match self {
            RequirementNode::Item(n) => Some(n),
            RequirementNode::Fluid(_) => None,
        }
    }

    pub fn children(&self) -> &[RequirementNode] {
        match self {
            RequirementNode::Item(n) => &n.children,
            RequirementNode::Fluid(_) => &[],
        }
    }

    /// Pre-order walk over this node and all descendants.
    pub fn walk<'n>(&'n self, f: &mut impl FnMut(&'n RequirementNode)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }
}

/// A requirement tree with its aggregated totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementTree {
    pub root: RequirementNode,
    /// Summed amount per item id that is not produced inside the tree.
    pub leaf_items: BTreeMap<String, f64>,
    /// Summed amount per fluid id.
    pub leaf_fluids: BTreeMap<String, f64>,
    /// Largest single catalyst requirement per item id.
    pub catalysts: BTreeMap<String, f64>,
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// A recipe resolved for one item under the current selections.
struct ChosenRecipe<'a> {
    recipe_id: String,
    recipe: &'a Recipe,
    recipe_type: Option<&'a RecipeTypeDef>,
    stacks: RecipeStacks,
}

impl ChosenRecipe<'_> {
    fn usage(&self) -> RecipeUse {
        let machine = self.recipe_type.and_then(|t| t.machine.as_ref());
        RecipeUse {
            recipe_id: self.recipe_id.clone(),
            recipe_type: self.recipe.recipe_type.clone(),
            machine_item_id: machine.map(|m| m.id.clone()),
            machine_name: machine.and_then(|m| m.name.clone()),
        }
    }
}

/// Plans requirements against one [`ContentIndex`].
#[derive(Debug, Clone)]
pub struct Planner<'a> {
    index: &'a ContentIndex,
    config: PlannerConfig,
}

impl<'a> Planner<'a> {
    pub fn new(index: &'a ContentIndex) -> Self {
        Self::with_config(index, PlannerConfig::default())
    }

    pub fn with_config(index: &'a ContentIndex, config: PlannerConfig) -> Self {
        Self { index, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Choices still missing before a tree rooted at `root` is unambiguous.
    /// Each item or tag is reported at most once.
    pub fn decisions(&self, root: &ItemKey, selections: &Selections) -> Vec<Decision> {
        let mut walk = DecisionWalk {
            planner: self,
            selections,
            decisions: Vec::new(),
            reported: HashSet::new(),
            visiting: HashSet::new(),
        };
        walk.visit_item(root, 0);
        walk.decisions
    }

    /// Expand `amount` units of `root` into a requirement tree.
    ///
    /// A non-finite `amount` plans for one unit; a negative one for zero.
    pub fn build_tree(&self, root: &ItemKey, amount: f64, selections: &Selections) -> RequirementTree {
        let amount = if amount.is_finite() {
            amount.max(0.0)
        } else {
            1.0
        };
        let mut build = TreeBuild {
            planner: self,
            selections,
            seq: 0,
            leaf_items: BTreeMap::new(),
            leaf_fluids: BTreeMap::new(),
            catalysts: BTreeMap::new(),
            path: Vec::new(),
            on_path: HashSet::new(),
        };
        let root = build.build_item(root.clone(), amount, 0);
        RequirementTree {
            root,
            leaf_items: build.leaf_items,
            leaf_fluids: build.leaf_fluids,
            catalysts: build.catalysts,
        }
    }

    /// Convenience wrapper over [`build_tree`](Self::build_tree).
    pub fn plan(&self, request: &PlanRequest) -> RequirementTree {
        self.build_tree(&request.root, request.target_amount, &request.selections)
    }

    /// Growth factor of a production loop given as its chain of items, each
    /// one consumed by the recipe of the item before it and the first one
    /// consumed by the last. Returns 0 when any step lacks a recipe or has a
    /// non-positive output or input amount.
    pub fn cycle_growth_factor(&self, cycle: &[ItemKey], selections: &Selections) -> f64 {
        if cycle.is_empty() {
            return 0.0;
        }
        let mut factor = 1.0;
        for (i, from) in cycle.iter().enumerate() {
            let to = &cycle[(i + 1) % cycle.len()];
            let Some(chosen) = self.chosen_recipe(from, selections) else {
                return 0.0;
            };
            let out = chosen.stacks.output_amount_for(from);
            let inp = chosen.stacks.input_amount_for(to);
            if out <= 0.0 || inp <= 0.0 {
                return 0.0;
            }
            factor *= out / inp;
        }
        factor
    }

    /// Producing recipe ids for `key` and the one in effect: the selection
    /// if present, else the only option.
    fn recipe_options(&self, key: &ItemKey, selections: &Selections) -> (Vec<String>, Option<String>) {
        let options = self.index.recipes_producing(key);
        let chosen = selections
            .recipe_for(&key.fingerprint())
            .map(str::to_string)
            .or_else(|| match options.as_slice() {
                [only] => Some(only.clone()),
                _ => None,
            });
        (options, chosen)
    }

    fn chosen_recipe(&self, key: &ItemKey, selections: &Selections) -> Option<ChosenRecipe<'a>> {
        let (_, recipe_id) = self.recipe_options(key, selections);
        let recipe_id = recipe_id?;
        let (recipe, recipe_type, stacks) = self.index.recipe_stacks(&recipe_id)?;
        Some(ChosenRecipe {
            recipe_id,
            recipe,
            recipe_type,
            stacks,
        })
    }

    /// The item a tag input resolves to: the selection, else the only member.
    fn tag_choice(&self, tag: &TagStack, selections: &Selections) -> Option<String> {
        let (tag_id, candidates) = self.index.tag_candidates(&tag.id);
        selections
            .item_for_tag(&tag_id)
            .map(str::to_string)
            .or_else(|| match candidates.as_slice() {
                [only] => Some(only.clone()),
                _ => None,
            })
    }
}

// ---------------------------------------------------------------------------
// Decision enumeration
// ---------------------------------------------------------------------------

struct DecisionWalk<'p, 'a> {
    planner: &'p Planner<'a>,
    selections: &'p Selections,
    decisions: Vec<Decision>,
    /// Items (fingerprints) and tags already reported.
    reported: HashSet<String>,
    visiting: HashSet<String>,
}

impl DecisionWalk<'_, '_> {
    fn visit_item(&mut self, key: &ItemKey, depth: usize) {
        if depth > self.planner.config.max_depth {
            debug!(item = %key, depth, "decision walk reached depth ceiling");
            return;
        }
        let fp = key.fingerprint();
        if !self.visiting.insert(fp.clone()) {
            return;
        }
        self.expand_item(key, &fp, depth);
        self.visiting.remove(&fp);
    }

    fn expand_item(&mut self, key: &ItemKey, fp: &str, depth: usize) {
        let (options, chosen) = self.planner.recipe_options(key, self.selections);
        if options.len() > 1 && self.selections.recipe_for(fp).is_none() {
            if self.reported.insert(format!("item:{fp}")) {
                self.decisions.push(Decision::ItemRecipe {
                    item_key: key.clone(),
                    fingerprint: fp.to_string(),
                    recipe_options: options,
                });
            }
            return;
        }

        let Some((_, _, stacks)) = chosen.and_then(|id| self.planner.index.recipe_stacks(&id))
        else {
            return;
        };
        for input in &stacks.inputs {
            match input {
                Stack::Item(item) => self.visit_item(&item.key(), depth + 1),
                Stack::Tag(tag) => self.visit_tag(tag, depth + 1),
                Stack::Fluid(_) => {}
            }
        }
    }

    fn visit_tag(&mut self, tag: &TagStack, depth: usize) {
        if depth > self.planner.config.max_depth {
            return;
        }
        let (tag_id, candidates) = self.planner.index.tag_candidates(&tag.id);
        let unselected = candidates.len() > 1 && self.selections.item_for_tag(&tag_id).is_none();
        if candidates.is_empty() || unselected {
            if self.reported.insert(format!("tag:{tag_id}")) {
                self.decisions.push(Decision::TagItem {
                    tag_id,
                    candidate_item_ids: candidates,
                });
            }
            return;
        }
        if let Some(item_id) = self.planner.tag_choice(tag, self.selections) {
            self.visit_item(&ItemKey::new(item_id), depth + 1);
        }
    }
}

// ---------------------------------------------------------------------------
// Tree construction
// ---------------------------------------------------------------------------

struct TreeBuild<'p, 'a> {
    planner: &'p Planner<'a>,
    selections: &'p Selections,
    seq: usize,
    leaf_items: BTreeMap<String, f64>,
    leaf_fluids: BTreeMap<String, f64>,
    catalysts: BTreeMap<String, f64>,
    /// Open ancestor chain, root first.
    path: Vec<(String, ItemKey)>,
    on_path: HashSet<String>,
}

impl TreeBuild<'_, '_> {
    fn next_node_id(&mut self) -> String {
        self.seq += 1;
        format!("n{}", self.seq)
    }

    fn add_leaf_item(&mut self, item_id: &str, amount: f64) {
        *self.leaf_items.entry(item_id.to_string()).or_insert(0.0) += amount;
    }

    fn add_leaf_fluid(&mut self, fluid_id: &str, amount: f64) {
        *self.leaf_fluids.entry(fluid_id.to_string()).or_insert(0.0) += amount;
    }

    fn add_catalyst(&mut self, item_id: &str, amount: f64) {
        let slot = self.catalysts.entry(item_id.to_string()).or_insert(0.0);
        *slot = slot.max(amount);
    }

    fn leaf(&mut self, node_id: String, key: ItemKey, amount: f64) -> RequirementNode {
        self.add_leaf_item(&key.id, amount);
        RequirementNode::Item(ItemNode::leaf(node_id, key, amount))
    }

    fn build_item(&mut self, key: ItemKey, amount: f64, depth: usize) -> RequirementNode {
        let node_id = self.next_node_id();
        if depth > self.planner.config.max_depth {
            debug!(item = %key, depth, "tree build reached depth ceiling");
            return self.leaf(node_id, key, amount);
        }

        let fp = key.fingerprint();
        if self.on_path.contains(&fp) {
            return self.cycle_node(node_id, key, &fp, amount);
        }

        let Some(chosen) = self.planner.chosen_recipe(&key, self.selections) else {
            return self.leaf(node_id, key, amount);
        };
        let per_craft = chosen.stacks.output_amount_for(&key);
        if per_craft <= 0.0 {
            return self.leaf(node_id, key, amount);
        }
        let multiplier = amount / per_craft;

        for catalyst in &chosen.stacks.catalysts {
            self.add_catalyst(&catalyst.id, sanitize_amount(catalyst.amount));
        }

        self.on_path.insert(fp.clone());
        self.path.push((fp.clone(), key.clone()));

        let mut children = Vec::new();
        for input in &chosen.stacks.inputs {
            let needed = sanitize_amount(input.amount() * multiplier);
            if needed <= 0.0 {
                continue;
            }
            match input {
                Stack::Item(item) => children.push(self.build_item(item.key(), needed, depth + 1)),
                Stack::Tag(tag) => {
                    // Unresolved tags were surfaced by `decisions`.
                    if let Some(item_id) = self.planner.tag_choice(tag, self.selections) {
                        children.push(self.build_item(ItemKey::new(item_id), needed, depth + 1));
                    }
                }
                Stack::Fluid(fluid) => {
                    self.add_leaf_fluid(&fluid.id, needed);
                    children.push(RequirementNode::Fluid(FluidNode {
                        node_id: self.next_node_id(),
                        id: fluid.id.clone(),
                        amount: needed,
                        unit: fluid.unit.clone(),
                    }));
                }
            }
        }

        self.path.pop();
        self.on_path.remove(&fp);

        RequirementNode::Item(ItemNode {
            recipe: Some(chosen.usage()),
            children,
            catalysts: chosen.stacks.catalysts.clone(),
            ..ItemNode::leaf(node_id, key, amount)
        })
    }

    fn cycle_node(&mut self, node_id: String, key: ItemKey, fp: &str, amount: f64) -> RequirementNode {
        let start = self.path.iter().position(|(f, _)| f == fp).unwrap_or(0);
        let cycle: Vec<ItemKey> = self.path[start..].iter().map(|(_, k)| k.clone()).collect();

        let factor = self.planner.cycle_growth_factor(&cycle, self.selections);
        let growing = factor > 1.0 + self.planner.config.growth_tolerance;

        // What the item right before the re-entry consumes per craft.
        let predecessor_demand = cycle
            .last()
            .and_then(|pred| self.planner.chosen_recipe(pred, self.selections))
            .map(|chosen| chosen.stacks.input_amount_for(&key))
            .unwrap_or(0.0);

        let seed = if growing && predecessor_demand > 0.0 {
            predecessor_demand
        } else {
            amount
        };
        debug!(item = %key, factor, growing, seed, "production cycle detected");

        self.add_leaf_item(&key.id, seed);
        let recipe = self
            .planner
            .chosen_recipe(&key, self.selections)
            .map(|chosen| chosen.usage());
        RequirementNode::Item(ItemNode {
            recipe,
            cycle: true,
            cycle_seed: growing,
            ..ItemNode::leaf(node_id, key, seed)
        })
    }
}
