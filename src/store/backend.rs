use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

/// Named query parameters, bound server-side as `:name`.
pub type Params = Map<String, Value>;

/// Convenience constructor for a parameter map.
pub fn params<const N: usize>(pairs: [(&str, Value); N]) -> Params {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Transport boundary to the graph store.
///
/// One command in, raw result rows out. Implementations must be safe to
/// share across tasks; the session pool hands the same backend to every
/// session it vends.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Executes a single statement with named parameters and returns the
    /// raw result rows.
    async fn command(&self, text: &str, params: &Params) -> Result<Vec<Value>>;
}
