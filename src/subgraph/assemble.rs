//! Input validation, primitive dispatch and subgraph assembly.

use std::collections::BTreeSet;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{GraphKbError, Result};
use crate::model::{Record, Rid};
use crate::schema::{SchemaRegistry, ONTOLOGY_BASE};
use crate::store::{Params, Session};
use crate::subgraph::components::DisjointSet;
use crate::subgraph::traversal::{self, Side, TraversalContext};
use crate::subgraph::{
    Direction, RecordMap, Subgraph, SubgraphKind, SubgraphResult, TraverseOptions,
    DEFAULT_MAX_DEPTH, DEFAULT_PROJECTION,
};

/// Runs one subgraph request end to end.
///
/// Dispatch follows the requested direction: no direction walks similarity
/// only; ascending or descending walk the hierarchy one generation
/// (`first_generation_only`) or transitively; `split` unions both transitive
/// walks; `both` returns the whole ontology and is the only shape that does
/// not need seeds.
pub async fn traverse(
    session: &Session,
    registry: &SchemaRegistry,
    ontology: &str,
    opts: &TraverseOptions,
) -> Result<SubgraphResult> {
    validate_ontology(registry, ontology)?;
    validate_edge_classes(registry, &opts.edges)?;
    validate_edge_classes(registry, &opts.tree_edges)?;

    let max_depth = if opts.max_depth <= 0 {
        DEFAULT_MAX_DEPTH
    } else {
        opts.max_depth
    };
    let ctx = TraversalContext {
        ontology,
        edges: &opts.edges,
        tree_edges: &opts.tree_edges,
        max_depth,
        projection: projection_for(registry, ontology, &opts.return_properties)?,
    };

    let needs_base = opts.direction != Some(Direction::Both);
    if needs_base {
        if opts.base.is_empty() {
            return Err(GraphKbError::Validation(
                "a non-empty base is required for every subgraph except the complete one".into(),
            ));
        }
        validate_base(session, registry, ontology, &opts.base).await?;
    }

    let records = match (opts.direction, opts.first_generation_only) {
        (None, _) => traversal::similarity(session, &ctx, &opts.base).await?,
        (Some(Direction::Both), _) => traversal::composition(session, &ctx).await?,
        (Some(Direction::Split), _) => {
            let mut merged =
                traversal::transitive(session, &ctx, &opts.base, Side::Out).await?;
            merged.extend(traversal::transitive(session, &ctx, &opts.base, Side::In).await?);
            merged
        }
        (Some(direction), first_generation) => {
            let side = Side::from_direction(direction)
                .ok_or_else(|| GraphKbError::Internal("unmapped direction".into()))?;
            if first_generation {
                traversal::immediate(session, &ctx, &opts.base, side).await?
            } else {
                traversal::transitive(session, &ctx, &opts.base, side).await?
            }
        }
    };

    let real = assemble(registry, ontology, records, opts.directed_adjacency);
    debug!(
        nodes = real.nodes.len(),
        edges = real.edges.len(),
        components = real.components.len(),
        "assembled subgraph"
    );

    let virtualized = match opts.subgraph {
        SubgraphKind::Real => None,
        SubgraphKind::Virtual | SubgraphKind::Both => Some(super::virtualize(
            &real,
            &opts.edges,
            &opts.tree_edges,
            opts.directed_adjacency,
            opts.allow_self_loops,
        )),
    };
    Ok(SubgraphResult {
        real: match opts.subgraph {
            SubgraphKind::Virtual => None,
            _ => Some(real),
        },
        virtualized,
    })
}

fn validate_ontology(registry: &SchemaRegistry, ontology: &str) -> Result<()> {
    if !registry.contains(ontology) || !registry.descends_from(ontology, ONTOLOGY_BASE) {
        return Err(GraphKbError::Validation(format!(
            "{ontology} is not an ontology class"
        )));
    }
    Ok(())
}

fn validate_edge_classes(registry: &SchemaRegistry, classes: &[String]) -> Result<()> {
    for class in classes {
        if !registry.is_edge_class(class) {
            return Err(GraphKbError::Validation(format!(
                "{class} is not an edge class"
            )));
        }
    }
    Ok(())
}

/// The fixed projection defaults unioned with the validated caller list.
fn projection_for(
    registry: &SchemaRegistry,
    ontology: &str,
    requested: &[String],
) -> Result<Vec<String>> {
    let (accepted, rejected) = registry.validate_properties(ontology, requested)?;
    if !rejected.is_empty() {
        return Err(GraphKbError::Validation(format!(
            "unknown projection properties: {}",
            rejected.join(", ")
        )));
    }
    let mut projection: IndexSet<String> = DEFAULT_PROJECTION
        .iter()
        .map(|prop| prop.to_string())
        .collect();
    projection.extend(accepted);
    Ok(projection.into_iter().collect())
}

/// Every seed must resolve to a live record of the requested ontology.
async fn validate_base(
    session: &Session,
    registry: &SchemaRegistry,
    ontology: &str,
    base: &[Rid],
) -> Result<()> {
    let text = format!(
        "SELECT @rid, @class, deletedAt FROM [{}]",
        base.iter()
            .map(Rid::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    let rows = session.query(&text, &Params::new()).await?;
    let mut found: FxHashMap<&Rid, &Record> = FxHashMap::default();
    for row in &rows {
        found.insert(row.rid(), row);
    }
    for rid in base {
        let Some(record) = found.get(rid) else {
            return Err(GraphKbError::NotFound(format!("record {rid}")));
        };
        if record.is_deleted() {
            return Err(GraphKbError::Validation(format!(
                "record {rid} has been deleted"
            )));
        }
        if !registry.descends_from(record.class(), ontology) {
            return Err(GraphKbError::Validation(format!(
                "record {rid} is a {} record, not {ontology}",
                record.class()
            )));
        }
    }
    Ok(())
}

/// Partitions traversal results and derives adjacency and components.
fn assemble(
    registry: &SchemaRegistry,
    ontology: &str,
    records: RecordMap,
    directed: bool,
) -> Subgraph {
    let mut nodes: IndexMap<Rid, Record> = IndexMap::new();
    let mut edge_candidates: Vec<Record> = Vec::new();
    for (rid, record) in records {
        if record.is_deleted() {
            continue;
        }
        if registry.is_edge_class(record.class()) {
            edge_candidates.push(record);
        } else if registry.descends_from(record.class(), ontology) {
            nodes.insert(rid, record);
        }
    }

    // An edge whose far endpoint fell outside the walk cannot appear in the
    // induced graph.
    let mut edges: IndexMap<Rid, Record> = IndexMap::new();
    for record in edge_candidates {
        let endpoints = (record.out_rid(), record.in_rid());
        if let (Some(out), Some(in_)) = endpoints {
            if nodes.contains_key(&out) && nodes.contains_key(&in_) {
                edges.insert(record.rid().clone(), record);
            }
        }
    }

    let adjacency = build_adjacency(&nodes, &edges, directed);
    let components = connected_components(&nodes, &edges);
    Subgraph {
        nodes,
        edges,
        adjacency,
        components,
    }
}

fn build_adjacency(
    nodes: &IndexMap<Rid, Record>,
    edges: &IndexMap<Rid, Record>,
    directed: bool,
) -> IndexMap<Rid, BTreeSet<Rid>> {
    let mut adjacency: IndexMap<Rid, BTreeSet<Rid>> = nodes
        .keys()
        .map(|rid| (rid.clone(), BTreeSet::new()))
        .collect();
    for edge in edges.values() {
        let (Some(out), Some(in_)) = (edge.out_rid(), edge.in_rid()) else {
            continue;
        };
        if let Some(neighbors) = adjacency.get_mut(&out) {
            neighbors.insert(in_.clone());
        }
        if !directed {
            if let Some(neighbors) = adjacency.get_mut(&in_) {
                neighbors.insert(out);
            }
        }
    }
    adjacency
}

/// Connected components of the undirected graph, emitted in the order their
/// first member appears in `nodes`.
fn connected_components(
    nodes: &IndexMap<Rid, Record>,
    edges: &IndexMap<Rid, Record>,
) -> Vec<BTreeSet<Rid>> {
    let index_of: FxHashMap<&Rid, usize> = nodes
        .keys()
        .enumerate()
        .map(|(index, rid)| (rid, index))
        .collect();
    let mut sets = DisjointSet::new(nodes.len());
    for edge in edges.values() {
        let (Some(out), Some(in_)) = (edge.out_rid(), edge.in_rid()) else {
            continue;
        };
        if let (Some(&a), Some(&b)) = (index_of.get(&out), index_of.get(&in_)) {
            sets.union(a, b);
        }
    }

    let mut component_of_root: FxHashMap<usize, usize> = FxHashMap::default();
    let mut components: Vec<BTreeSet<Rid>> = Vec::new();
    for (index, rid) in nodes.keys().enumerate() {
        let root = sets.find(index);
        let slot = *component_of_root.entry(root).or_insert_with(|| {
            components.push(BTreeSet::new());
            components.len() - 1
        });
        components[slot].insert(rid.clone());
    }
    components
}
