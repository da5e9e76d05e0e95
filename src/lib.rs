//! # GraphKB - Graph Knowledge Base Core
//!
//! GraphKB links biomedical variants, diseases, therapies, publications and
//! supporting statements through a property graph store. This crate holds
//! the two engineering cores of the service:
//!
//! - the **subgraph engine**: walks similarity edges in both directions and
//!   hierarchy edges in one chosen direction from a set of seed records,
//!   assembles the induced subgraph (records, adjacency, connected
//!   components) and optionally folds similarity-equivalent vertices into a
//!   virtual graph;
//! - the **migration runner**: compares the schema version recorded in the
//!   store against the version this build declares and executes the ordered
//!   chain of migration steps that closes the gap, with an append-only audit
//!   log.
//!
//! The graph store itself is a black box behind [`store::Backend`]; a
//! session pool, cursor pagination and the DDL helpers sit on top of it, and
//! a thin axum surface exposes `POST /subgraphs/{ontology}`.

pub mod config;
pub mod error;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod schema;
pub mod server;
pub mod store;
pub mod subgraph;

// Re-export the main public API
pub use crate::config::Config;
pub use crate::error::{GraphKbError, Result};
pub use crate::migrate::{MigrateOptions, MigrationRunner};
pub use crate::model::{Record, Rid};
pub use crate::schema::SchemaRegistry;
pub use crate::store::{Backend, RestBackend, Session, SessionPool};
pub use crate::subgraph::{
    traverse, Subgraph, SubgraphResult, SubgraphType, TraverseOptions, VirtualGraph,
};
