//! Canonical in-memory description of the knowledge-base schema.
//!
//! The registry is built once at startup and read-only afterwards. It is the
//! single source of every class and property name that ever appears literally
//! in query text; raw user input never reaches the store without being
//! checked against it.

mod builtin;
mod registry;

pub use builtin::graphkb;
pub use registry::{
    ClassDef, IndexDef, IndexType, InheritOpts, PropertyDef, PropertyType, SchemaRegistry,
};

/// Root vertex class every vertex descends from.
pub const VERTEX_BASE: &str = "V";
/// Root edge class every edge descends from.
pub const EDGE_BASE: &str = "E";
/// Abstract superclass of every controlled-vocabulary vertex class.
pub const ONTOLOGY_BASE: &str = "Ontology";

/// Similarity edge classes walked in both directions by the subgraph engine.
pub const SIMILARITY_EDGES: [&str; 5] = [
    "AliasOf",
    "CrossReferenceOf",
    "DeprecatedBy",
    "ElementOf",
    "GeneralizationOf",
];

/// Hierarchy edge classes walked in one chosen direction.
pub const TREE_EDGES: [&str; 1] = ["SubClassOf"];
