//! Query composition and dispatch for the four traversal primitives.
//!
//! Every class name interpolated into query text comes from the validated
//! traversal context, never from raw user input; seed RIDs are parsed
//! [`Rid`]s and depth bounds are bound as named parameters.

use serde_json::json;

use crate::error::Result;
use crate::model::{Record, Rid};
use crate::store::{params, Params, Session};
use crate::subgraph::{Direction, RecordMap};

/// Validated inputs shared by the primitives.
pub(super) struct TraversalContext<'a> {
    pub ontology: &'a str,
    pub edges: &'a [String],
    pub tree_edges: &'a [String],
    pub max_depth: i64,
    /// Validated projection properties, in emission order.
    pub projection: Vec<String>,
}

/// Which endpoint a hierarchy walk follows.
///
/// `SubClassOf` points child to parent, so ascending follows the outgoing
/// side. Every tree edge class shares this orientation; a class oriented
/// the other way would need per-class metadata this mapping does not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Side {
    Out,
    In,
}

impl Side {
    pub fn from_direction(direction: Direction) -> Option<Side> {
        match direction {
            Direction::Ascending => Some(Side::Out),
            Direction::Descending => Some(Side::In),
            Direction::Both | Direction::Split => None,
        }
    }

    fn vertex_step(&self) -> &'static str {
        match self {
            Side::Out => "out",
            Side::In => "in",
        }
    }

    fn edge_step(&self) -> &'static str {
        match self {
            Side::Out => "outE",
            Side::In => "inE",
        }
    }
}

fn quoted(classes: &[String]) -> String {
    classes
        .iter()
        .map(|class| format!("'{class}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn rid_list(rids: &[Rid]) -> String {
    rids.iter()
        .map(Rid::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn step_functions(steps: &[(&str, &[String])]) -> String {
    steps
        .iter()
        .map(|(function, classes)| format!("{function}({})", quoted(classes)))
        .collect::<Vec<_>>()
        .join(", ")
}

impl TraversalContext<'_> {
    fn projection_clause(&self) -> String {
        self.projection.join(", ")
    }

    /// The traversal stop condition: stay on the walked edge classes and the
    /// ontology's vertices, skip soft-deleted records, bound the depth.
    fn while_clause(&self, walked: &[String]) -> String {
        let mut classes = walked.to_vec();
        classes.push(self.ontology.to_string());
        format!(
            "(@class IN [{classes}]) AND (in IS NULL OR in.@class = '{ontology}') \
             AND (out IS NULL OR out.@class = '{ontology}') AND (deletedAt IS NULL) \
             AND ($depth <= :maxDepth)",
            classes = quoted(&classes),
            ontology = self.ontology,
        )
    }

    fn traverse_query(
        &self,
        steps: &[(&str, &[String])],
        walked: &[String],
        seeds: &[Rid],
        max_depth: i64,
    ) -> (String, Params) {
        let text = format!(
            "SELECT {projection} FROM (TRAVERSE {functions} FROM [{seeds}] WHILE {condition})",
            projection = self.projection_clause(),
            functions = step_functions(steps),
            seeds = rid_list(seeds),
            condition = self.while_clause(walked),
        );
        (text, params([("maxDepth", json!(max_depth))]))
    }
}

pub(super) fn similarity_query(ctx: &TraversalContext<'_>, base: &[Rid]) -> (String, Params) {
    ctx.traverse_query(
        &[("both", ctx.edges), ("bothE", ctx.edges)],
        ctx.edges,
        base,
        ctx.max_depth,
    )
}

pub(super) fn hierarchy_query(
    ctx: &TraversalContext<'_>,
    seeds: &[Rid],
    side: Side,
    max_depth: i64,
) -> (String, Params) {
    ctx.traverse_query(
        &[
            (side.vertex_step(), ctx.tree_edges),
            (side.edge_step(), ctx.tree_edges),
        ],
        ctx.tree_edges,
        seeds,
        max_depth,
    )
}

pub(super) fn transitive_query(
    ctx: &TraversalContext<'_>,
    base: &[Rid],
    side: Side,
) -> (String, Params) {
    let mut walked = ctx.edges.to_vec();
    walked.extend(ctx.tree_edges.iter().cloned());
    ctx.traverse_query(
        &[
            ("both", ctx.edges),
            ("bothE", ctx.edges),
            (side.vertex_step(), ctx.tree_edges),
            (side.edge_step(), ctx.tree_edges),
        ],
        &walked,
        base,
        ctx.max_depth,
    )
}

pub(super) fn vertex_scan_query(ctx: &TraversalContext<'_>) -> (String, Params) {
    (
        format!(
            "SELECT {projection} FROM {ontology} WHERE deletedAt IS NULL",
            projection = ctx.projection_clause(),
            ontology = ctx.ontology,
        ),
        Params::new(),
    )
}

pub(super) fn edge_scan_query(ctx: &TraversalContext<'_>, edge_class: &str) -> (String, Params) {
    (
        format!(
            "SELECT {projection} FROM {edge_class} WHERE in.@class = '{ontology}' \
             AND out.@class = '{ontology}' AND deletedAt IS NULL",
            projection = ctx.projection_clause(),
            ontology = ctx.ontology,
        ),
        Params::new(),
    )
}

fn collect(records: Vec<Record>) -> RecordMap {
    let mut map = RecordMap::new();
    for record in records {
        map.insert(record.rid().clone(), record);
    }
    map
}

/// RIDs of the ontology vertices inside a result map.
///
/// The stop condition restricts traversed vertices to the ontology class,
/// so a class comparison is enough to tell vertices from edges here.
fn vertex_rids(ctx: &TraversalContext<'_>, records: &RecordMap) -> Vec<Rid> {
    records
        .values()
        .filter(|record| record.class() == ctx.ontology)
        .map(|record| record.rid().clone())
        .collect()
}

/// Walks similarity edges in both directions from the seeds.
pub(super) async fn similarity(
    session: &Session,
    ctx: &TraversalContext<'_>,
    base: &[Rid],
) -> Result<RecordMap> {
    if base.is_empty() {
        return Ok(RecordMap::new());
    }
    let (text, query_params) = similarity_query(ctx, base);
    Ok(collect(session.query(&text, &query_params).await?))
}

/// Similarity, one hierarchy generation, then similarity again.
///
/// Each phase seeds from the vertex RIDs of the previous one; the phases
/// are sequential because of that data dependency.
pub(super) async fn immediate(
    session: &Session,
    ctx: &TraversalContext<'_>,
    base: &[Rid],
    side: Side,
) -> Result<RecordMap> {
    let mut result = similarity(session, ctx, base).await?;

    let hop_seeds = vertex_rids(ctx, &result);
    if hop_seeds.is_empty() {
        return Ok(result);
    }
    let (text, query_params) = hierarchy_query(ctx, &hop_seeds, side, 1);
    let generation = collect(session.query(&text, &query_params).await?);

    let closure_seeds = vertex_rids(ctx, &generation);
    result.extend(generation);
    result.extend(similarity(session, ctx, &closure_seeds).await?);
    Ok(result)
}

/// One combined walk over similarity (both directions) and hierarchy along
/// the chosen side, bounded by the context depth.
pub(super) async fn transitive(
    session: &Session,
    ctx: &TraversalContext<'_>,
    base: &[Rid],
    side: Side,
) -> Result<RecordMap> {
    if base.is_empty() {
        return Ok(RecordMap::new());
    }
    let (text, query_params) = transitive_query(ctx, base, side);
    Ok(collect(session.query(&text, &query_params).await?))
}

/// The whole ontology: a paginated scan of the vertex class plus one
/// paginated scan per edge class restricted to endpoints of that class.
pub(super) async fn composition(
    session: &Session,
    ctx: &TraversalContext<'_>,
) -> Result<RecordMap> {
    let page = crate::store::PageOpts::default();
    let mut result = RecordMap::new();

    let (text, query_params) = vertex_scan_query(ctx);
    result.extend(collect(session.query_paged(&text, &query_params, page).await?));

    let mut edge_classes: Vec<&String> = ctx.edges.iter().collect();
    for tree_edge in ctx.tree_edges {
        if !edge_classes.contains(&tree_edge) {
            edge_classes.push(tree_edge);
        }
    }
    for edge_class in edge_classes {
        let (text, query_params) = edge_scan_query(ctx, edge_class);
        result.extend(collect(session.query_paged(&text, &query_params, page).await?));
    }
    Ok(result)
}
