//! Cursor pagination behavior of the store adapter.

mod support;

use std::sync::Arc;

use async_trait::async_trait;
use graphkb::store::{Backend, PageOpts, Params, PoolOpts, SessionPool};
use graphkb::Result;
use parking_lot::Mutex;
use serde_json::{json, Value};

use support::vertex;

/// Serves slices of a fixed row set, honouring `:lowerRid` and `:limit`
/// the way the store would.
struct PagingBackend {
    rows: Vec<Value>,
    pub queries: Mutex<Vec<Params>>,
}

impl PagingBackend {
    fn with_rows(count: usize) -> PagingBackend {
        let rows = (0..count)
            .map(|index| vertex(&format!("#14:{index}"), "Disease", &format!("row{index}")))
            .collect();
        PagingBackend {
            rows,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Backend for PagingBackend {
    async fn command(&self, _text: &str, params: &Params) -> Result<Vec<Value>> {
        self.queries.lock().push(params.clone());
        let lower = params
            .get("lowerRid")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let limit = params
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(u64::MAX) as usize;
        let mut page: Vec<Value> = self
            .rows
            .iter()
            .filter(|row| {
                row["@rid"]
                    .as_str()
                    .is_some_and(|rid| rid.to_string() > lower)
            })
            .cloned()
            .collect();
        page.sort_by_key(|row| row["@rid"].as_str().map(str::to_string));
        page.truncate(limit);
        Ok(page)
    }
}

async fn paged(count: usize, opts: PageOpts) -> (usize, usize) {
    let backend = Arc::new(PagingBackend::with_rows(count));
    let pool = SessionPool::new(backend.clone(), PoolOpts::default());
    let session = pool.acquire().await.expect("session");
    let rows = session
        .query_paged(
            "SELECT @rid, @class, name FROM Disease WHERE deletedAt IS NULL",
            &Params::new(),
            opts,
        )
        .await
        .expect("paged query");
    let pages = backend.queries.lock().len();
    (rows.len(), pages)
}

#[tokio::test]
async fn short_first_page_ends_iteration() {
    let (rows, pages) = paged(
        3,
        PageOpts {
            page_size: 10,
            max_size: 1_000,
        },
    )
    .await;
    assert_eq!(rows, 3);
    assert_eq!(pages, 1);
}

#[tokio::test]
async fn pages_concatenate_without_duplicates() {
    let (rows, pages) = paged(
        25,
        PageOpts {
            page_size: 10,
            max_size: 1_000,
        },
    )
    .await;
    assert_eq!(rows, 25);
    // Two full pages, one short page.
    assert_eq!(pages, 3);
}

#[tokio::test]
async fn exact_multiple_needs_one_extra_probe() {
    let (rows, pages) = paged(
        20,
        PageOpts {
            page_size: 10,
            max_size: 1_000,
        },
    )
    .await;
    assert_eq!(rows, 20);
    // The third page comes back empty and stops the loop.
    assert_eq!(pages, 3);
}

#[tokio::test]
async fn max_size_caps_the_result() {
    let (rows, _) = paged(
        30,
        PageOpts {
            page_size: 10,
            max_size: 15,
        },
    )
    .await;
    assert_eq!(rows, 15);
}

#[tokio::test]
async fn cursor_advances_past_the_last_row_of_each_page() {
    let backend = Arc::new(PagingBackend::with_rows(12));
    let pool = SessionPool::new(backend.clone(), PoolOpts::default());
    let session = pool.acquire().await.expect("session");
    session
        .query_paged(
            "SELECT @rid FROM Disease WHERE deletedAt IS NULL",
            &Params::new(),
            PageOpts {
                page_size: 10,
                max_size: 100,
            },
        )
        .await
        .expect("paged query");
    let cursors: Vec<String> = backend
        .queries
        .lock()
        .iter()
        .map(|params| {
            params
                .get("lowerRid")
                .and_then(Value::as_str)
                .expect("cursor")
                .to_string()
        })
        .collect();
    assert_eq!(cursors[0], "#-1:-1");
    assert!(cursors[1].starts_with("#14:"));
}
