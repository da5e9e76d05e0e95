//! Typed surface over the graph store.
//!
//! The store itself is a black box reached through [`Backend`]; everything
//! else in the crate talks to it through a pooled [`Session`], which owns
//! parameter binding, cursor pagination and the DDL helpers.

mod backend;
mod pool;
mod rest;

pub use backend::{params, Backend, Params};
pub use pool::{PageOpts, PoolOpts, Session, SessionPool};
pub use rest::RestBackend;

#[cfg(test)]
pub(crate) use backend::testing;
