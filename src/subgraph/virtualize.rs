//! Folding similarity-equivalent vertices into virtual nodes.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::model::{Record, Rid};
use crate::subgraph::components::DisjointSet;
use crate::subgraph::{Subgraph, VEdge, VNode, VirtualGraph};

/// Sort value assumed for records without a `source.sort`.
const SORT_SENTINEL: i64 = 99_999;

fn sort_value(record: &Record) -> i64 {
    record
        .get_path("source.sort")
        .and_then(Value::as_i64)
        .unwrap_or(SORT_SENTINEL)
}

/// Collapses the similarity-connected vertices of an assembled subgraph.
///
/// Each equivalence class becomes one virtual node identified by the RID of
/// its preferred record; the hierarchy edges of the real graph are re-derived
/// between virtual nodes, collapsing duplicates.
pub fn virtualize(
    graph: &Subgraph,
    similarity_edges: &[String],
    tree_edges: &[String],
    directed_adjacency: bool,
    allow_self_loops: bool,
) -> VirtualGraph {
    let rids: Vec<&Rid> = graph.nodes.keys().collect();
    let index_of: FxHashMap<&Rid, usize> = rids
        .iter()
        .enumerate()
        .map(|(index, rid)| (*rid, index))
        .collect();

    let mut sets = DisjointSet::new(rids.len());
    let mut deprecated = vec![false; rids.len()];
    let mut aliasing = vec![false; rids.len()];
    for edge in graph.edges.values() {
        let (Some(out), Some(in_)) = (edge.out_rid(), edge.in_rid()) else {
            continue;
        };
        let (Some(&out_index), Some(&in_index)) = (index_of.get(&out), index_of.get(&in_)) else {
            continue;
        };
        if similarity_edges.iter().any(|class| class == edge.class()) {
            sets.union(out_index, in_index);
        }
        // The tie-break flags are tied to two specific similarity
        // semantics: being the deprecated or the aliased-away record.
        match edge.class() {
            "DeprecatedBy" => deprecated[out_index] = true,
            "AliasOf" => aliasing[out_index] = true,
            _ => {}
        }
    }

    // Group members by root, keeping the node insertion order within and
    // across groups.
    let mut members_of_root: IndexMap<usize, Vec<usize>> = IndexMap::new();
    for index in 0..rids.len() {
        members_of_root
            .entry(sets.find(index))
            .or_default()
            .push(index);
    }

    let mut v_nodes: IndexMap<Rid, VNode> = IndexMap::new();
    let mut g_to_v: IndexMap<Rid, Rid> = IndexMap::new();
    let mut v_to_g: IndexMap<Rid, Vec<Rid>> = IndexMap::new();
    for members in members_of_root.values() {
        let Some(representative) = members.iter().copied().min_by_key(|&index| {
            let record = &graph.nodes[rids[index]];
            (
                deprecated[index],
                aliasing[index],
                sort_value(record),
                rids[index].clone(),
            )
        }) else {
            continue;
        };
        let virtual_id = rids[representative].clone();
        let record = &graph.nodes[&virtual_id];
        let label = record
            .name()
            .or_else(|| record.display_name())
            .map(str::to_string)
            .unwrap_or_else(|| virtual_id.to_string());

        let mut records: Vec<Rid> = members.iter().map(|&index| rids[index].clone()).collect();
        records.sort();
        for rid in &records {
            g_to_v.insert(rid.clone(), virtual_id.clone());
        }
        v_to_g.insert(virtual_id.clone(), records.clone());
        v_nodes.insert(virtual_id, VNode { label, records });
    }

    let mut v_edges: IndexMap<String, VEdge> = IndexMap::new();
    for edge in graph.edges.values() {
        if !tree_edges.iter().any(|class| class == edge.class()) {
            continue;
        }
        let (Some(out), Some(in_)) = (edge.out_rid(), edge.in_rid()) else {
            continue;
        };
        let (Some(v_out), Some(v_in)) = (g_to_v.get(&out), g_to_v.get(&in_)) else {
            continue;
        };
        if v_out == v_in && !allow_self_loops {
            continue;
        }
        v_edges
            .entry(format!("{v_out}-{v_in}"))
            .or_insert_with(|| VEdge {
                in_: v_in.clone(),
                out: v_out.clone(),
            });
    }

    let mut adjacency: IndexMap<Rid, BTreeSet<Rid>> = v_nodes
        .keys()
        .map(|rid| (rid.clone(), BTreeSet::new()))
        .collect();
    for v_edge in v_edges.values() {
        if let Some(neighbors) = adjacency.get_mut(&v_edge.out) {
            neighbors.insert(v_edge.in_.clone());
        }
        if !directed_adjacency {
            if let Some(neighbors) = adjacency.get_mut(&v_edge.in_) {
                neighbors.insert(v_edge.out.clone());
            }
        }
    }

    let components = virtual_components(&v_nodes, &v_edges);
    VirtualGraph {
        v_nodes,
        v_edges,
        g_to_v,
        v_to_g,
        adjacency,
        components,
    }
}

fn virtual_components(
    v_nodes: &IndexMap<Rid, VNode>,
    v_edges: &IndexMap<String, VEdge>,
) -> Vec<BTreeSet<Rid>> {
    let index_of: FxHashMap<&Rid, usize> = v_nodes
        .keys()
        .enumerate()
        .map(|(index, rid)| (rid, index))
        .collect();
    let mut sets = DisjointSet::new(v_nodes.len());
    for v_edge in v_edges.values() {
        if let (Some(&a), Some(&b)) = (index_of.get(&v_edge.out), index_of.get(&v_edge.in_)) {
            sets.union(a, b);
        }
    }
    let mut component_of_root: FxHashMap<usize, usize> = FxHashMap::default();
    let mut components: Vec<BTreeSet<Rid>> = Vec::new();
    for (index, rid) in v_nodes.keys().enumerate() {
        let root = sets.find(index);
        let slot = *component_of_root.entry(root).or_insert_with(|| {
            components.push(BTreeSet::new());
            components.len() - 1
        });
        components[slot].insert(rid.clone());
    }
    components
}
