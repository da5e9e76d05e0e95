//! Shared scripted store for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use graphkb::store::{Backend, Params, PoolOpts, SessionPool};
use graphkb::Result;
use parking_lot::Mutex;
use serde_json::{json, Value};

/// In-memory backend scripted with `(needle, rows)` routes.
///
/// The first route whose needle appears in the statement text wins, so
/// register the most specific needles first. Unmatched statements return no
/// rows; everything is logged for assertions.
pub struct FakeBackend {
    routes: Vec<(String, Vec<Value>)>,
    pub log: Mutex<Vec<(String, Params)>>,
}

impl FakeBackend {
    pub fn new() -> FakeBackend {
        FakeBackend {
            routes: Vec::new(),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn route(mut self, needle: &str, rows: Vec<Value>) -> FakeBackend {
        self.routes.push((needle.to_string(), rows));
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().iter().map(|(text, _)| text.clone()).collect()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn command(&self, text: &str, params: &Params) -> Result<Vec<Value>> {
        self.log.lock().push((text.to_string(), params.clone()));
        for (needle, rows) in &self.routes {
            if text.contains(needle.as_str()) {
                return Ok(rows.clone());
            }
        }
        Ok(Vec::new())
    }
}

pub fn pool_over(backend: Arc<FakeBackend>) -> SessionPool {
    SessionPool::new(backend, PoolOpts::default())
}

pub fn vertex(rid: &str, class: &str, name: &str) -> Value {
    json!({
        "@rid": rid,
        "@class": class,
        "name": name,
        "deletedAt": null,
    })
}

pub fn vertex_with_sort(rid: &str, class: &str, name: &str, sort: i64) -> Value {
    json!({
        "@rid": rid,
        "@class": class,
        "name": name,
        "source.sort": sort,
        "deletedAt": null,
    })
}

pub fn edge(rid: &str, class: &str, out: &str, in_: &str) -> Value {
    json!({
        "@rid": rid,
        "@class": class,
        "out": out,
        "in": in_,
        "deletedAt": null,
    })
}

pub fn resolvable(rid: &str, class: &str) -> Value {
    json!({
        "@rid": rid,
        "@class": class,
        "deletedAt": null,
    })
}
