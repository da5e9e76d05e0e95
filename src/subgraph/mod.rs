//! Ontology subgraph traversal and virtualization.
//!
//! Given an ontology class and a set of seed records, the engine walks
//! similarity edges in both directions and hierarchy edges in one chosen
//! direction, assembles the induced subgraph (records, adjacency, connected
//! components) and can fold similarity-equivalent vertices into a virtual
//! graph whose edges summarize the hierarchy between equivalence classes.

mod assemble;
mod components;
mod traversal;
mod virtualize;

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::{Record, Rid};
use crate::schema::{SIMILARITY_EDGES, TREE_EDGES};

pub use assemble::traverse;
pub use components::DisjointSet;
pub use virtualize::virtualize;

/// Default bound on traversal depth.
pub const DEFAULT_MAX_DEPTH: i64 = 50;

/// Projection properties always fetched, whatever the caller asks for.
pub const DEFAULT_PROJECTION: [&str; 6] = ["@rid", "@class", "in", "out", "name", "source.sort"];

/// Result rows of a traversal primitive, keyed by RID.
pub type RecordMap = IndexMap<Rid, Record>;

/// Hierarchy traversal direction.
///
/// `Ascending` walks towards parents (the outgoing side of `SubClassOf`),
/// `Descending` towards children; `Split` unions both transitive walks;
/// `Both` means the whole ontology, without seeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
    Both,
    Split,
}

/// Which of the two graphs the caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubgraphKind {
    Real,
    Virtual,
    Both,
}

/// Caller-facing names for the dispatch table rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubgraphType {
    SimilarTo,
    Parents,
    Ancestors,
    Children,
    Descendants,
    Tree,
    Complete,
}

impl SubgraphType {
    /// The `(direction, first generation only)` pair the type stands for.
    pub fn dispatch(&self) -> (Option<Direction>, bool) {
        match self {
            SubgraphType::SimilarTo => (None, false),
            SubgraphType::Parents => (Some(Direction::Ascending), true),
            SubgraphType::Ancestors => (Some(Direction::Ascending), false),
            SubgraphType::Children => (Some(Direction::Descending), true),
            SubgraphType::Descendants => (Some(Direction::Descending), false),
            SubgraphType::Tree => (Some(Direction::Split), false),
            SubgraphType::Complete => (Some(Direction::Both), false),
        }
    }
}

/// Options accepted by [`traverse`].
#[derive(Debug, Clone)]
pub struct TraverseOptions {
    pub direction: Option<Direction>,
    pub first_generation_only: bool,
    pub subgraph: SubgraphKind,
    pub base: Vec<Rid>,
    /// Similarity edge classes, walked in both directions.
    pub edges: Vec<String>,
    /// Hierarchy edge classes, walked along `direction`.
    pub tree_edges: Vec<String>,
    pub max_depth: i64,
    /// Extra projection properties, unioned with [`DEFAULT_PROJECTION`].
    pub return_properties: Vec<String>,
    /// Emit directed adjacency (`out -> in` only) instead of undirected.
    pub directed_adjacency: bool,
    /// Keep virtual self-edges produced by hierarchy inside one
    /// equivalence class.
    pub allow_self_loops: bool,
}

impl Default for TraverseOptions {
    fn default() -> Self {
        TraverseOptions {
            direction: None,
            first_generation_only: false,
            subgraph: SubgraphKind::Real,
            base: Vec::new(),
            edges: SIMILARITY_EDGES.iter().map(|e| e.to_string()).collect(),
            tree_edges: TREE_EDGES.iter().map(|e| e.to_string()).collect(),
            max_depth: DEFAULT_MAX_DEPTH,
            return_properties: Vec::new(),
            directed_adjacency: false,
            allow_self_loops: true,
        }
    }
}

/// The induced subgraph over real records.
#[derive(Debug, Clone, Serialize)]
pub struct Subgraph {
    pub nodes: IndexMap<Rid, Record>,
    pub edges: IndexMap<Rid, Record>,
    pub adjacency: IndexMap<Rid, BTreeSet<Rid>>,
    pub components: Vec<BTreeSet<Rid>>,
}

/// A virtual node: one equivalence class of similarity-connected records.
#[derive(Debug, Clone, Serialize)]
pub struct VNode {
    pub label: String,
    pub records: Vec<Rid>,
}

/// A hierarchy edge between two virtual nodes.
#[derive(Debug, Clone, Serialize)]
pub struct VEdge {
    #[serde(rename = "in")]
    pub in_: Rid,
    pub out: Rid,
}

/// The folded graph over virtual nodes.
#[derive(Debug, Clone, Serialize)]
pub struct VirtualGraph {
    #[serde(rename = "vNodes")]
    pub v_nodes: IndexMap<Rid, VNode>,
    #[serde(rename = "vEdges")]
    pub v_edges: IndexMap<String, VEdge>,
    pub g_to_v: IndexMap<Rid, Rid>,
    pub v_to_g: IndexMap<Rid, Vec<Rid>>,
    pub adjacency: IndexMap<Rid, BTreeSet<Rid>>,
    pub components: Vec<BTreeSet<Rid>>,
}

/// What [`traverse`] hands back: the real graph, the virtual graph, or both.
#[derive(Debug, Clone, Serialize)]
pub struct SubgraphResult {
    #[serde(rename = "g", skip_serializing_if = "Option::is_none")]
    pub real: Option<Subgraph>,
    #[serde(rename = "v", skip_serializing_if = "Option::is_none")]
    pub virtualized: Option<VirtualGraph>,
}
