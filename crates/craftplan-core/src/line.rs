//! Production line graph: a deduplicated view of a requirement tree.
//!
//! Every distinct item fingerprint, fluid (id + unit) and (recipe, output)
//! pair becomes one node. Machine nodes are connected to the items they
//! produce and consume by amount-carrying edges; repeated occurrences in the
//! tree merge by summing. Item and fluid node amounts are derived from the
//! edges after construction, not copied from the tree.
//!
//! With [`LineOptions::collapse_intermediate_items`] set, item nodes that
//! merely pass material from one machine to another are removed and their
//! producer is wired straight to the consumers.

use crate::key::ItemKey;
use crate::planner::{ItemNode, RecipeUse, RequirementNode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Production line construction switches.
#[derive(Debug, Clone, Default)]
pub struct LineOptions {
    /// Item marked as root. Defaults to the tree root's item.
    pub root_key: Option<ItemKey>,
    /// Accumulate annotated cycle-seed amounts onto item nodes.
    pub include_cycle_seeds: bool,
    pub collapse_intermediate_items: bool,
}

// ---------------------------------------------------------------------------
// Graph types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub node_id: String,
    pub item_key: ItemKey,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_amount: Option<f64>,
    #[serde(default)]
    pub is_root: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineFluid {
    pub node_id: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub amount: f64,
}

/// One recipe producing one output item, aggregated over the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineMachine {
    pub node_id: String,
    pub recipe_id: String,
    pub recipe_type: String,
    pub output_item_key: ItemKey,
    /// Total output amount across every occurrence.
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machines: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineNode {
    Item(LineItem),
    Fluid(LineFluid),
    Machine(LineMachine),
}

impl LineNode {
    pub fn node_id(&self) -> &str {
        match self {
            LineNode::Item(n) => &n.node_id,
            LineNode::Fluid(n) => &n.node_id,
            LineNode::Machine(n) => &n.node_id,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            LineNode::Item(n) => n.amount,
            LineNode::Fluid(n) => n.amount,
            LineNode::Machine(n) => n.amount,
        }
    }
}

/// What travels along an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Flow {
    Item {
        #[serde(rename = "itemKey")]
        item_key: ItemKey,
    },
    Fluid {
        #[serde(rename = "fluidId")]
        fluid_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEdge {
    /// `e:` followed by the merge identity.
    pub id: String,
    pub source: String,
    pub target: String,
    pub flow: Flow,
    pub amount: f64,
}

impl LineEdge {
    fn new(source: &str, target: &str, flow: Flow, amount: f64) -> Self {
        Self {
            id: format!("e:{}", edge_key(source, target, &flow)),
            source: source.to_string(),
            target: target.to_string(),
            flow,
            amount,
        }
    }

    fn is_item(&self) -> bool {
        matches!(self.flow, Flow::Item { .. })
    }
}

/// Edges between the same endpoints carrying the same thing share a key.
fn edge_key(source: &str, target: &str, flow: &Flow) -> String {
    match flow {
        Flow::Item { item_key } => format!("{source}->{target}:i:{}", item_key.fingerprint()),
        Flow::Fluid { fluid_id, unit } => {
            format!("{source}->{target}:f:{fluid_id}:{}", unit.as_deref().unwrap_or(""))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionLine {
    pub nodes: Vec<LineNode>,
    pub edges: Vec<LineEdge>,
}

impl ProductionLine {
    pub fn node(&self, node_id: &str) -> Option<&LineNode> {
        self.nodes.iter().find(|n| n.node_id() == node_id)
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&LineEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }
}

// -- Node ids --

pub fn item_node_id(key: &ItemKey) -> String {
    format!("i:{}", key.fingerprint())
}

pub fn fluid_node_id(fluid_id: &str, unit: Option<&str>) -> String {
    match unit {
        Some(unit) => format!("f:{fluid_id}:{unit}"),
        None => format!("f:{fluid_id}"),
    }
}

pub fn machine_node_id(recipe_id: &str, output: &ItemKey) -> String {
    format!("m:{recipe_id}:{}", output.fingerprint())
}

fn is_machine(node_id: &str) -> bool {
    node_id.starts_with("m:")
}

fn is_item(node_id: &str) -> bool {
    node_id.starts_with("i:")
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Insertion-ordered map keyed by node or edge id.
#[derive(Debug)]
struct Ordered<T> {
    slots: Vec<T>,
    by_key: HashMap<String, usize>,
}

impl<T> Default for Ordered<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            by_key: HashMap::new(),
        }
    }
}

impl<T> Ordered<T> {
    fn get_or_insert_with(&mut self, key: &str, make: impl FnOnce() -> T) -> &mut T {
        let idx = match self.by_key.get(key) {
            Some(&idx) => idx,
            None => {
                self.slots.push(make());
                self.by_key.insert(key.to_string(), self.slots.len() - 1);
                self.slots.len() - 1
            }
        };
        &mut self.slots[idx]
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        let idx = *self.by_key.get(key)?;
        self.slots.get_mut(idx)
    }

    fn into_values(self) -> Vec<T> {
        self.slots
    }
}

/// Merge-by-identity edge set.
#[derive(Debug, Default)]
struct EdgeSet(Ordered<LineEdge>);

impl EdgeSet {
    fn add(&mut self, edge: LineEdge) {
        let amount = edge.amount;
        let slot = self.0.get_or_insert_with(&edge.id.clone(), || LineEdge {
            amount: 0.0,
            ..edge
        });
        slot.amount += amount;
    }

    fn into_vec(self) -> Vec<LineEdge> {
        self.0.into_values()
    }
}

struct LineBuilder<'o> {
    options: &'o LineOptions,
    root_fingerprint: Option<String>,
    items: Ordered<LineItem>,
    fluids: Ordered<LineFluid>,
    machines: Ordered<LineMachine>,
    edges: EdgeSet,
}

impl LineBuilder<'_> {
    fn ensure_item(&mut self, key: &ItemKey) -> String {
        let node_id = item_node_id(key);
        let is_root = self.root_fingerprint.as_deref() == Some(key.fingerprint().as_str());
        self.items.get_or_insert_with(&node_id, || LineItem {
            node_id: node_id.clone(),
            item_key: key.clone(),
            amount: 0.0,
            seed_amount: None,
            is_root,
        });
        node_id
    }

    fn ensure_fluid(&mut self, fluid_id: &str, unit: Option<&str>) -> String {
        let unit = unit.filter(|u| !u.is_empty());
        let node_id = fluid_node_id(fluid_id, unit);
        self.fluids.get_or_insert_with(&node_id, || LineFluid {
            node_id: node_id.clone(),
            id: fluid_id.to_string(),
            unit: unit.map(str::to_string),
            amount: 0.0,
        });
        node_id
    }

    fn ensure_machine(&mut self, node: &ItemNode, recipe: &RecipeUse) -> String {
        let node_id = machine_node_id(&recipe.recipe_id, &node.item_key);
        let machine = self.machines.get_or_insert_with(&node_id, || LineMachine {
            node_id: node_id.clone(),
            recipe_id: recipe.recipe_id.clone(),
            recipe_type: recipe.recipe_type.clone(),
            output_item_key: node.item_key.clone(),
            amount: 0.0,
            machine_item_id: None,
            machine_name: None,
            machine_count: None,
            machines: None,
        });
        if machine.machine_item_id.is_none() {
            machine.machine_item_id = recipe.machine_item_id.clone();
        }
        if machine.machine_name.is_none() {
            machine.machine_name = recipe.machine_name.clone();
        }

        machine.amount += finite_or_zero(node.amount);
        let notes = &node.annotations;
        if let Some(count) = notes.machine_count.map(finite_or_zero).filter(|c| *c > 0.0) {
            *machine.machine_count.get_or_insert(0.0) += count;
        }
        if let Some(count) = notes.machines.map(finite_or_zero).filter(|c| *c > 0.0) {
            *machine.machines.get_or_insert(0.0) += count;
        }
        node_id
    }

    fn walk(&mut self, node: &RequirementNode) {
        let item = match node {
            RequirementNode::Fluid(fluid) => {
                self.ensure_fluid(&fluid.id, fluid.unit.as_deref());
                return;
            }
            RequirementNode::Item(item) => item,
        };

        let item_id = self.ensure_item(&item.item_key);
        let seed = item
            .annotations
            .cycle_seed_amount
            .map(finite_or_zero)
            .unwrap_or(0.0);
        if self.options.include_cycle_seeds && item.cycle_seed && seed > 0.0 {
            if let Some(slot) = self.items.get_mut(&item_id) {
                *slot.seed_amount.get_or_insert(0.0) += seed;
            }
        }

        if let Some(recipe) = item.recipe.as_ref().filter(|_| !item.cycle) {
            let machine_id = self.ensure_machine(item, recipe);
            self.edges.add(LineEdge::new(
                &machine_id,
                &item_id,
                Flow::Item {
                    item_key: item.item_key.clone(),
                },
                finite_or_zero(item.amount),
            ));
            for child in &item.children {
                self.add_input_edge(child, &machine_id);
            }
        }

        for child in &item.children {
            self.walk(child);
        }
    }

    fn add_input_edge(&mut self, child: &RequirementNode, machine_id: &str) {
        match child {
            RequirementNode::Item(c) => {
                let child_id = self.ensure_item(&c.item_key);
                let needed = c
                    .annotations
                    .cycle_amount_needed
                    .map(finite_or_zero)
                    .unwrap_or(0.0);
                let amount = if c.cycle_seed && needed > 0.0 {
                    needed
                } else {
                    finite_or_zero(c.amount)
                };
                self.edges.add(LineEdge::new(
                    &child_id,
                    machine_id,
                    Flow::Item {
                        item_key: c.item_key.clone(),
                    },
                    amount,
                ));
            }
            RequirementNode::Fluid(f) => {
                let unit = f.unit.clone().filter(|u| !u.is_empty());
                let child_id = self.ensure_fluid(&f.id, unit.as_deref());
                self.edges.add(LineEdge::new(
                    &child_id,
                    machine_id,
                    Flow::Fluid {
                        fluid_id: f.id.clone(),
                        unit,
                    },
                    finite_or_zero(f.amount),
                ));
            }
        }
    }

    fn finish(self) -> ProductionLine {
        let edges = self.edges.into_vec();
        let mut nodes: Vec<LineNode> = self
            .items
            .into_values()
            .into_iter()
            .map(LineNode::Item)
            .chain(self.fluids.into_values().into_iter().map(LineNode::Fluid))
            .chain(self.machines.into_values().into_iter().map(LineNode::Machine))
            .collect();
        apply_edge_amounts(&mut nodes, &edges);
        ProductionLine { nodes, edges }
    }
}

/// Item and fluid amounts are the flow across the item/machine boundary:
/// machine outputs count toward the item they feed, item inputs toward the
/// item that is consumed, fluid edges toward the fluid.
fn apply_edge_amounts(nodes: &mut [LineNode], edges: &[LineEdge]) {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for edge in edges {
        let node_id = match edge.flow {
            Flow::Item { .. } if is_machine(&edge.source) && is_item(&edge.target) => &edge.target,
            Flow::Item { .. } if is_item(&edge.source) && is_machine(&edge.target) => &edge.source,
            Flow::Item { .. } => continue,
            Flow::Fluid { .. } => &edge.source,
        };
        *totals.entry(node_id.as_str()).or_insert(0.0) += edge.amount;
    }
    for node in nodes {
        match node {
            LineNode::Item(n) => n.amount = totals.get(n.node_id.as_str()).copied().unwrap_or(0.0),
            LineNode::Fluid(n) => n.amount = totals.get(n.node_id.as_str()).copied().unwrap_or(0.0),
            LineNode::Machine(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Collapse
// ---------------------------------------------------------------------------

/// Remove pass-through item nodes and connect their producer machine to
/// each consumer machine directly.
fn collapse_intermediate_items(line: ProductionLine) -> ProductionLine {
    let mut incoming: HashMap<&str, Vec<&LineEdge>> = HashMap::new();
    let mut outgoing: HashMap<&str, Vec<&LineEdge>> = HashMap::new();
    for edge in line.edges.iter().filter(|e| e.is_item()) {
        if is_machine(&edge.source) && is_item(&edge.target) {
            incoming.entry(edge.target.as_str()).or_default().push(edge);
        }
        if is_item(&edge.source) && is_machine(&edge.target) {
            outgoing.entry(edge.source.as_str()).or_default().push(edge);
        }
    }

    let mut removed_nodes: HashSet<&str> = HashSet::new();
    let mut removed_edges: HashSet<&str> = HashSet::new();
    let mut rewired = Vec::new();
    for node in &line.nodes {
        let LineNode::Item(item) = node else { continue };
        let producers = incoming.get(item.node_id.as_str()).map(Vec::as_slice).unwrap_or_default();
        let consumers = outgoing.get(item.node_id.as_str()).map(Vec::as_slice).unwrap_or_default();
        let seeded = item.seed_amount.is_some_and(|s| s > 0.0);
        if item.is_root || seeded || producers.is_empty() || consumers.is_empty() {
            continue;
        }

        // Highest amount wins; the earliest edge breaks ties.
        let mut producer = producers[0];
        for &edge in &producers[1..] {
            if edge.amount > producer.amount {
                producer = edge;
            }
        }

        removed_nodes.insert(item.node_id.as_str());
        removed_edges.extend(producers.iter().map(|e| e.id.as_str()));
        removed_edges.extend(consumers.iter().map(|e| e.id.as_str()));
        for consumer in consumers {
            rewired.push(LineEdge::new(
                &producer.source,
                &consumer.target,
                consumer.flow.clone(),
                consumer.amount,
            ));
        }
        debug!(item = %item.item_key, consumers = consumers.len(), "collapsed intermediate item");
    }

    let mut edges = EdgeSet::default();
    for edge in &line.edges {
        let touches_removed =
            removed_nodes.contains(edge.source.as_str()) || removed_nodes.contains(edge.target.as_str());
        if removed_edges.contains(edge.id.as_str()) || touches_removed {
            continue;
        }
        edges.add(edge.clone());
    }
    for edge in rewired {
        edges.add(edge);
    }

    let edges = edges.into_vec();
    let mut nodes: Vec<LineNode> = line
        .nodes
        .iter()
        .filter(|n| !removed_nodes.contains(n.node_id()))
        .cloned()
        .collect();
    apply_edge_amounts(&mut nodes, &edges);
    ProductionLine { nodes, edges }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Flatten a requirement tree into a production line graph.
pub fn build_production_line(root: &RequirementNode, options: &LineOptions) -> ProductionLine {
    let root_key = options
        .root_key
        .clone()
        .or_else(|| root.as_item().map(|n| n.item_key.clone()));
    let mut builder = LineBuilder {
        options,
        root_fingerprint: root_key.map(|k| k.fingerprint()),
        items: Ordered::default(),
        fluids: Ordered::default(),
        machines: Ordered::default(),
        edges: EdgeSet::default(),
    };
    builder.walk(root);
    let mut line = builder.finish();
    if options.collapse_intermediate_items {
        line = collapse_intermediate_items(line);
    }
    debug!(
        nodes = line.nodes.len(),
        edges = line.edges.len(),
        "production line built"
    );
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ContentIndex;
    use crate::planner::{Planner, RequirementTree, Selections};
    use crate::test_utils::*;

    fn plan(pack: &PackBuilder, root: &str, amount: f64) -> RequirementTree {
        let index = ContentIndex::build(&pack.build());
        Planner::new(&index).build_tree(&ItemKey::new(root), amount, &Selections::new())
    }

    fn key(id: &str) -> ItemKey {
        ItemKey::new(id)
    }

    fn item_node<'l>(line: &'l ProductionLine, id: &str) -> Option<&'l LineItem> {
        match line.node(&item_node_id(&key(id))) {
            Some(LineNode::Item(n)) => Some(n),
            _ => None,
        }
    }

    fn for_each_item_mut(node: &mut RequirementNode, f: &mut impl FnMut(&mut ItemNode)) {
        if let RequirementNode::Item(item) = node {
            f(item);
            for child in &mut item.children {
                for_each_item_mut(child, f);
            }
        }
    }

    #[test]
    fn repeated_inputs_merge_into_one_edge() {
        let mut pack = PackBuilder::new("mc");
        pack.recipe("gear", "crafting")
            .input(item_stack("iron", 5.0))
            .input(item_stack("iron", 3.0))
            .output(item_stack("gear", 1.0));
        let tree = plan(&pack, "gear", 1.0);
        let line = build_production_line(&tree.root, &LineOptions::default());

        let machine = machine_node_id("gear", &key("gear"));
        let iron = item_node_id(&key("iron"));
        let edges: Vec<_> = line.edges.iter().filter(|e| e.source == iron).collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, machine);
        assert_eq!(edges[0].amount, 8.0);
        assert_eq!(item_node(&line, "iron").unwrap().amount, 8.0);
        assert_eq!(item_node(&line, "gear").unwrap().amount, 1.0);
        assert!(item_node(&line, "gear").unwrap().is_root);
    }

    #[test]
    fn repeated_subtrees_share_nodes() {
        let mut pack = PackBuilder::new("mc");
        pack.recipe("top", "crafting")
            .input(item_stack("gear", 2.0))
            .input(item_stack("rod", 1.0))
            .output(item_stack("top", 1.0));
        pack.recipe("gear", "crafting")
            .input(item_stack("plate", 2.0))
            .output(item_stack("gear", 1.0));
        pack.recipe("rod", "crafting")
            .input(item_stack("plate", 1.0))
            .output(item_stack("rod", 2.0));
        pack.recipe("press", "press")
            .input(item_stack("ingot", 1.0))
            .output(item_stack("plate", 1.0));
        let tree = plan(&pack, "top", 2.0);
        let line = build_production_line(&tree.root, &LineOptions::default());

        let press = machine_node_id("press", &key("plate"));
        let presses: Vec<_> = line.nodes.iter().filter(|n| n.node_id() == press).collect();
        assert_eq!(presses.len(), 1);
        // gear needs 8 plates, rod needs 1.
        assert_eq!(presses[0].amount(), 9.0);
        // Intermediates count both the flow in and the flow out.
        assert_eq!(item_node(&line, "plate").unwrap().amount, 18.0);
        assert_eq!(item_node(&line, "ingot").unwrap().amount, 9.0);
    }

    #[test]
    fn collapse_rewires_producer_to_every_consumer() {
        let mut pack = PackBuilder::new("mc");
        pack.recipe("top", "crafting")
            .input(item_stack("gear", 1.0))
            .input(item_stack("rod", 1.0))
            .output(item_stack("top", 1.0));
        pack.recipe("gear", "crafting")
            .input(item_stack("plate", 2.0))
            .output(item_stack("gear", 1.0));
        pack.recipe("rod", "crafting")
            .input(item_stack("plate", 1.0))
            .output(item_stack("rod", 2.0));
        pack.recipe("press", "press")
            .input(item_stack("ingot", 1.0))
            .output(item_stack("plate", 1.0));
        let tree = plan(&pack, "top", 2.0);
        let options = LineOptions {
            collapse_intermediate_items: true,
            ..LineOptions::default()
        };
        let line = build_production_line(&tree.root, &options);

        let press = machine_node_id("press", &key("plate"));
        let gear = machine_node_id("gear", &key("gear"));
        let rod = machine_node_id("rod", &key("rod"));
        assert!(item_node(&line, "plate").is_none());
        assert_eq!(line.edge(&press, &gear).unwrap().amount, 4.0);
        assert_eq!(line.edge(&press, &rod).unwrap().amount, 1.0);

        // Sources and the root stay.
        assert_eq!(item_node(&line, "ingot").unwrap().amount, 5.0);
        assert!(item_node(&line, "top").is_some());
        assert!(line.edges.iter().all(|e| e.source != item_node_id(&key("plate"))));
    }

    #[test]
    fn root_is_never_collapsed() {
        let mut pack = PackBuilder::new("mc");
        pack.recipe("a_from_b", "crafting")
            .input(item_stack("b", 1.0))
            .output(item_stack("a", 2.0));
        pack.recipe("b_from_a", "crafting")
            .input(item_stack("a", 1.0))
            .output(item_stack("b", 1.0));
        let tree = plan(&pack, "a", 10.0);
        let options = LineOptions {
            collapse_intermediate_items: true,
            ..LineOptions::default()
        };
        let line = build_production_line(&tree.root, &options);

        assert!(item_node(&line, "a").unwrap().is_root);
        assert!(item_node(&line, "b").is_none());
        let a_machine = machine_node_id("a_from_b", &key("a"));
        let b_machine = machine_node_id("b_from_a", &key("b"));
        assert_eq!(line.edge(&b_machine, &a_machine).unwrap().amount, 5.0);
        // The cycle node itself gets no machine.
        assert_eq!(
            line.nodes
                .iter()
                .filter(|n| matches!(n, LineNode::Machine(_)))
                .count(),
            2
        );
    }

    #[test]
    fn seeded_items_survive_collapse() {
        let mut pack = PackBuilder::new("mc");
        pack.recipe("top", "crafting")
            .input(item_stack("a", 1.0))
            .output(item_stack("top", 1.0));
        pack.recipe("a_from_b", "crafting")
            .input(item_stack("b", 1.0))
            .output(item_stack("a", 2.0));
        pack.recipe("b_from_a", "crafting")
            .input(item_stack("a", 1.0))
            .output(item_stack("b", 1.0));
        let mut tree = plan(&pack, "top", 4.0);
        for_each_item_mut(&mut tree.root, &mut |n| {
            if n.cycle_seed {
                n.annotations.cycle_seed_amount = Some(1.0);
                n.annotations.cycle_amount_needed = Some(3.0);
            }
        });

        let options = LineOptions {
            include_cycle_seeds: true,
            collapse_intermediate_items: true,
            ..LineOptions::default()
        };
        let line = build_production_line(&tree.root, &options);
        let a = item_node(&line, "a").unwrap();
        assert_eq!(a.seed_amount, Some(1.0));
        assert!(!a.is_root);

        let b_machine = machine_node_id("b_from_a", &key("b"));
        let a_id = item_node_id(&key("a"));
        // The seed child feeds its consumer with the annotated amount.
        assert_eq!(line.edge(&a_id, &b_machine).unwrap().amount, 3.0);

        let plain = build_production_line(&tree.root, &LineOptions::default());
        assert_eq!(item_node(&plain, "a").unwrap().seed_amount, None);
    }

    #[test]
    fn machine_annotations_are_summed() {
        let mut pack = PackBuilder::new("mc");
        pack.recipe_type("press", &[], Some(("press_block", "Press")));
        pack.recipe("top", "crafting")
            .input(item_stack("plate", 1.0))
            .input(item_stack("wire", 1.0))
            .output(item_stack("top", 1.0));
        pack.recipe("wire", "crafting")
            .input(item_stack("plate", 1.0))
            .output(item_stack("wire", 1.0));
        pack.recipe("press", "press")
            .input(item_stack("ingot", 1.0))
            .output(item_stack("plate", 1.0));
        let mut tree = plan(&pack, "top", 1.0);
        for_each_item_mut(&mut tree.root, &mut |n| {
            if n.item_key.id == "plate" {
                n.annotations.machine_count = Some(0.5);
                n.annotations.machines = Some(f64::NAN);
            }
        });
        let line = build_production_line(&tree.root, &LineOptions::default());
        let press = machine_node_id("press", &key("plate"));
        let Some(LineNode::Machine(m)) = line.node(&press) else {
            panic!("press machine missing");
        };
        assert_eq!(m.machine_count, Some(1.0));
        assert_eq!(m.machines, None);
        assert_eq!(m.machine_item_id.as_deref(), Some("press_block"));
        assert_eq!(m.machine_name.as_deref(), Some("Press"));
        assert_eq!(m.amount, 2.0);
    }

    #[test]
    fn fluids_are_keyed_by_id_and_unit() {
        let mut pack = PackBuilder::new("mc");
        pack.recipe("concrete", "mixer")
            .input(fluid_stack("water", 250.0, Some("mB")))
            .input(item_stack("powder", 1.0))
            .output(item_stack("concrete", 1.0));
        let tree = plan(&pack, "concrete", 2.0);
        let line = build_production_line(&tree.root, &LineOptions::default());

        let water = fluid_node_id("water", Some("mB"));
        assert_eq!(water, "f:water:mB");
        let Some(LineNode::Fluid(f)) = line.node(&water) else {
            panic!("fluid node missing");
        };
        assert_eq!(f.amount, 500.0);
        let edge = line
            .edge(&water, &machine_node_id("concrete", &key("concrete")))
            .unwrap();
        assert!(edge.id.ends_with(":f:water:mB"));
    }

    #[test]
    fn explicit_root_key_overrides_tree_root() {
        let mut pack = PackBuilder::new("mc");
        pack.recipe("gear", "crafting")
            .input(item_stack("iron", 1.0))
            .output(item_stack("gear", 1.0));
        let tree = plan(&pack, "gear", 1.0);
        let options = LineOptions {
            root_key: Some(key("iron")),
            ..LineOptions::default()
        };
        let line = build_production_line(&tree.root, &options);
        assert!(item_node(&line, "iron").unwrap().is_root);
        assert!(!item_node(&line, "gear").unwrap().is_root);
    }
}
