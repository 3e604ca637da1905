//! Plan a small production chain with a self-feeding loop.
//!
//! Circuits need copper wire and an iron plate; copper is grown from a seed
//! that is also one of the recipe's own outputs, so the planner reports a
//! growing cycle and seeds it with one unit. The example prints the open
//! decisions, the requirement tree and the collapsed production line.
//!
//! Run with: `cargo run -p craftplan-core --example plan_chain`

use craftplan_core::index::ContentIndex;
use craftplan_core::key::ItemKey;
use craftplan_core::line::{LineNode, LineOptions, build_production_line};
use craftplan_core::pack::PackData;
use craftplan_core::planner::{Planner, RequirementNode, Selections};
use serde_json::json;

fn pack() -> PackData {
    serde_json::from_value(json!({
        "manifest": {
            "packId": "chain-demo",
            "gameId": "demo",
            "displayName": "Chain demo",
            "files": { "recipeTypes": "recipe_types.json", "recipes": "recipes.json" }
        },
        "recipeTypes": [
            { "key": "assembler", "machine": { "id": "assembler", "name": "Assembler" } },
            { "key": "greenhouse", "machine": { "id": "greenhouse", "name": "Greenhouse" } }
        ],
        "recipes": [
            {
                "id": "circuit",
                "type": "assembler",
                "slotContents": {
                    "in0": { "kind": "item", "id": "copper_wire", "amount": 3 },
                    "in1": { "kind": "item", "id": "iron_plate", "amount": 1 },
                    "in2": { "kind": "fluid", "id": "solder", "amount": 10, "unit": "mB" },
                    "out": { "kind": "item", "id": "circuit", "amount": 1 }
                }
            },
            {
                "id": "wire",
                "type": "assembler",
                "slotContents": {
                    "in0": { "kind": "item", "id": "copper", "amount": 1 },
                    "out": { "kind": "item", "id": "copper_wire", "amount": 2 }
                }
            },
            {
                "id": "grow_copper",
                "type": "greenhouse",
                "slotContents": {
                    "in0": { "kind": "item", "id": "copper_seed", "amount": 1 },
                    "out": { "kind": "item", "id": "copper", "amount": 4 }
                }
            },
            {
                "id": "seed_from_copper",
                "type": "greenhouse",
                "slotContents": {
                    "in0": { "kind": "item", "id": "copper", "amount": 1 },
                    "out": { "kind": "item", "id": "copper_seed", "amount": 1 }
                }
            }
        ]
    }))
    .expect("demo pack is well-formed")
}

fn print_tree(node: &RequirementNode, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        RequirementNode::Item(item) => {
            let via = item
                .recipe
                .as_ref()
                .map(|r| format!(" via {}", r.recipe_id))
                .unwrap_or_default();
            let cycle = match (item.cycle, item.cycle_seed) {
                (true, true) => " [cycle seed]",
                (true, false) => " [cycle]",
                _ => "",
            };
            println!("{indent}{} x{}{via}{cycle}", item.item_key, item.amount);
        }
        RequirementNode::Fluid(fluid) => {
            let unit = fluid.unit.as_deref().unwrap_or("");
            println!("{indent}{} {}{unit}", fluid.id, fluid.amount);
        }
    }
    for child in node.children() {
        print_tree(child, depth + 1);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .without_time()
        .init();

    let index = ContentIndex::build(&pack());
    let planner = Planner::new(&index);
    let circuit = ItemKey::new("circuit");
    let selections = Selections::new();

    let decisions = planner.decisions(&circuit, &selections);
    println!("--- Open decisions: {} ---", decisions.len());

    let tree = planner.build_tree(&circuit, 8.0, &selections);
    println!("\n--- Requirement tree ---");
    print_tree(&tree.root, 0);

    println!("\n--- Raw materials ---");
    for (id, amount) in &tree.leaf_items {
        println!("  {id}: {amount}");
    }
    for (id, amount) in &tree.leaf_fluids {
        println!("  {id} (fluid): {amount}");
    }

    let line = build_production_line(
        &tree.root,
        &LineOptions {
            collapse_intermediate_items: true,
            ..LineOptions::default()
        },
    );
    println!("\n--- Production line ---");
    for node in &line.nodes {
        match node {
            LineNode::Machine(m) => println!(
                "  machine {} ({}) -> {} x{}",
                m.recipe_id,
                m.machine_name.as_deref().unwrap_or("-"),
                m.output_item_key,
                m.amount
            ),
            LineNode::Item(i) => println!("  item {} x{}", i.item_key, i.amount),
            LineNode::Fluid(f) => println!("  fluid {} x{}", f.id, f.amount),
        }
    }
    for edge in &line.edges {
        println!("  {} -> {} : {}", edge.source, edge.target, edge.amount);
    }
}
