use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::error::{GraphKbError, Result};
use crate::model::{Record, RID_FLOOR};
use crate::schema::{ClassDef, IndexDef, IndexType, PropertyDef};
use crate::store::backend::{params, Backend, Params};

/// Pool sizing and deadline options.
#[derive(Debug, Clone)]
pub struct PoolOpts {
    pub size: usize,
    pub query_timeout: Duration,
}

impl Default for PoolOpts {
    fn default() -> Self {
        PoolOpts {
            size: 25,
            query_timeout: Duration::from_secs(30),
        }
    }
}

/// Pagination bounds for [`Session::query_paged`].
#[derive(Debug, Clone, Copy)]
pub struct PageOpts {
    pub page_size: usize,
    pub max_size: usize,
}

impl Default for PageOpts {
    fn default() -> Self {
        PageOpts {
            page_size: 5_000,
            max_size: 1_000_000,
        }
    }
}

/// Bounded pool of store sessions.
///
/// A request owns exactly one session for its lifetime; the permit returns
/// to the pool when the session drops, on every exit path.
pub struct SessionPool {
    backend: Arc<dyn Backend>,
    permits: Arc<Semaphore>,
    query_timeout: Duration,
}

impl SessionPool {
    pub fn new(backend: Arc<dyn Backend>, opts: PoolOpts) -> SessionPool {
        SessionPool {
            backend,
            permits: Arc::new(Semaphore::new(opts.size)),
            query_timeout: opts.query_timeout,
        }
    }

    /// Acquires a session, suspending until one is free.
    pub async fn acquire(&self) -> Result<Session> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GraphKbError::Connection("session pool is shut down".into()))?;
        Ok(Session {
            backend: self.backend.clone(),
            query_timeout: self.query_timeout,
            _permit: permit,
        })
    }

    /// Closes the pool; subsequent `acquire` calls fail.
    pub fn drain(&self) {
        self.permits.close();
    }
}

/// One leased connection to the store.
pub struct Session {
    backend: Arc<dyn Backend>,
    query_timeout: Duration,
    _permit: OwnedSemaphorePermit,
}

/// Appends the pagination cursor predicate, picking `AND` when the statement
/// already filters and `WHERE` otherwise.
fn with_cursor(text: &str) -> String {
    if text.contains(" WHERE ") {
        format!("{text} AND @rid > :lowerRid LIMIT :limit")
    } else {
        format!("{text} WHERE @rid > :lowerRid LIMIT :limit")
    }
}

impl Session {
    /// Executes a statement and returns the raw rows. DDL statements and
    /// inserts go through here; reads usually want [`Session::query`].
    pub async fn command(&self, text: &str, params: &Params) -> Result<Vec<Value>> {
        let deadline_ms = self.query_timeout.as_millis() as u64;
        tokio::time::timeout(self.query_timeout, self.backend.command(text, params))
            .await
            .map_err(|_| GraphKbError::Timeout(deadline_ms))?
    }

    /// Executes a query and parses every row into a [`Record`].
    pub async fn query(&self, text: &str, params: &Params) -> Result<Vec<Record>> {
        let rows = self.command(text, params).await?;
        rows.into_iter().map(Record::from_value).collect()
    }

    /// Cursor-paginates a query on `@rid` and concatenates the pages.
    ///
    /// Iterates until a page comes back short or `max_size` rows have been
    /// collected.
    pub async fn query_paged(
        &self,
        text: &str,
        params: &Params,
        opts: PageOpts,
    ) -> Result<Vec<Record>> {
        let paged_text = with_cursor(text);
        let mut cursor = RID_FLOOR.to_string();
        let mut collected: Vec<Record> = Vec::new();
        loop {
            let remaining = opts.max_size - collected.len();
            let limit = opts.page_size.min(remaining);
            if limit == 0 {
                warn!(
                    max_size = opts.max_size,
                    "paged query hit its row cap; result truncated"
                );
                break;
            }
            let mut page_params = params.clone();
            page_params.insert("lowerRid".into(), json!(cursor));
            page_params.insert("limit".into(), json!(limit));
            let page = self.query(&paged_text, &page_params).await?;
            let short = page.len() < limit;
            if let Some(last) = page.last() {
                cursor = last.rid().as_str().to_string();
            }
            collected.extend(page);
            if short {
                break;
            }
        }
        Ok(collected)
    }

    /// Creates a class. Returns the class name as its handle.
    pub async fn create_class(
        &self,
        name: &str,
        extends: &[&str],
        is_abstract: bool,
    ) -> Result<String> {
        let mut text = format!("CREATE CLASS {name}");
        if !extends.is_empty() {
            text.push_str(&format!(" EXTENDS {}", extends.join(", ")));
        }
        if is_abstract {
            text.push_str(" ABSTRACT");
        }
        self.command(&text, &Params::new()).await?;
        Ok(name.to_string())
    }

    /// Looks up a class handle, failing with `NotFoundError` when the store
    /// does not know the class.
    pub async fn get_class(&self, name: &str) -> Result<String> {
        let rows = self
            .command(
                "SELECT name FROM (SELECT expand(classes) FROM metadata:schema) WHERE name = :name",
                &params([("name", json!(name))]),
            )
            .await?;
        if rows.is_empty() {
            return Err(GraphKbError::NotFound(format!("class {name}")));
        }
        Ok(name.to_string())
    }

    async fn existing_property(&self, class: &str, prop: &str) -> Result<Option<Value>> {
        let rows = self
            .command(
                "SELECT FROM (SELECT expand(properties) FROM (SELECT expand(classes) FROM metadata:schema) WHERE name = :className) WHERE name = :propName",
                &params([
                    ("className", json!(class)),
                    ("propName", json!(prop)),
                ]),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Creates a property on a class.
    ///
    /// Idempotent: a pre-existing property with the same type and linked
    /// class is accepted silently; any other pre-existing property is a
    /// `ConflictError`.
    pub async fn create_property(&self, class: &str, def: &PropertyDef) -> Result<()> {
        let ddl_type = def.prop_type.ddl_name(def.iterable);
        if let Some(existing) = self.existing_property(class, &def.name).await? {
            let same_type = existing
                .get("type")
                .and_then(Value::as_str)
                .is_some_and(|t| t.eq_ignore_ascii_case(ddl_type));
            let same_link = existing.get("linkedClass").and_then(Value::as_str)
                == def.linked_class.as_deref();
            if same_type && same_link {
                debug!(class, property = %def.name, "property already present");
                return Ok(());
            }
            return Err(GraphKbError::Conflict(format!(
                "property {class}.{} exists with a different shape",
                def.name
            )));
        }

        let mut text = format!("CREATE PROPERTY {class}.{} {ddl_type}", def.name);
        if let Some(linked) = &def.linked_class {
            text.push_str(&format!(" {linked}"));
        }
        self.command(&text, &Params::new()).await?;

        if def.mandatory {
            self.command(
                &format!("ALTER PROPERTY {class}.{} MANDATORY TRUE", def.name),
                &Params::new(),
            )
            .await?;
        }
        if !def.nullable {
            self.command(
                &format!("ALTER PROPERTY {class}.{} NOTNULL TRUE", def.name),
                &Params::new(),
            )
            .await?;
        }
        if let Some(default) = &def.default {
            self.command(
                &format!("ALTER PROPERTY {class}.{} DEFAULT {default}", def.name),
                &Params::new(),
            )
            .await?;
        }
        Ok(())
    }

    /// Creates an index.
    ///
    /// Unique indices over iterable properties are refused with a logged
    /// warning and a `false` return; with `graceful`, a pre-existing index
    /// of the same name counts as success.
    pub async fn create_index(
        &self,
        class: &ClassDef,
        def: &IndexDef,
        graceful: bool,
    ) -> Result<bool> {
        if def.index_type == IndexType::Unique {
            let iterable = def.properties.iter().any(|prop| {
                class
                    .properties
                    .get(prop)
                    .is_some_and(|property| property.iterable)
            });
            if iterable {
                warn!(
                    index = %def.name,
                    "refusing unique index over an iterable property"
                );
                return Ok(false);
            }
        }

        if graceful {
            let rows = self
                .command(
                    "SELECT name FROM (SELECT expand(indexes) FROM metadata:indexmanager) WHERE name = :name",
                    &params([("name", json!(def.name))]),
                )
                .await?;
            if !rows.is_empty() {
                debug!(index = %def.name, "index already present");
                return Ok(true);
            }
        }

        let mut text = format!(
            "CREATE INDEX {} ON {} ({}) {}",
            def.name,
            def.class_name,
            def.properties.join(", "),
            def.index_type.ddl_name()
        );
        if let Some(engine) = &def.engine {
            text.push_str(&format!(" ENGINE {engine}"));
        }
        self.command(&text, &Params::new()).await?;
        Ok(true)
    }

    /// Drops an index by name, tolerating its absence.
    pub async fn drop_index(&self, name: &str) -> Result<()> {
        self.command(&format!("DROP INDEX {name} IF EXISTS"), &Params::new())
            .await?;
        Ok(())
    }
}
