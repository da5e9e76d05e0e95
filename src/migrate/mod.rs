//! Schema migration runner.
//!
//! The store records every schema version it has been migrated to in the
//! append-only `SchemaHistory` class; the build declares the version it
//! expects. When the two drift apart by more than a patch level, the runner
//! walks an ordered chain of migration steps, logging one history row per
//! executed step. There is no rollback: a failing step leaves the store at
//! the last successfully logged intermediate version.

mod steps;

use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use semver::Version;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{GraphKbError, Result};
use crate::store::{params, Params, Session};

pub use steps::Permission;

/// Schema version this build expects, injected at compile time.
pub const TARGET_VERSION: &str = env!("CARGO_PKG_VERSION");

const HISTORY_NAME: &str = env!("CARGO_PKG_NAME");
const HISTORY_URL: &str = "https://graphkb.bcgsc.ca";

// One migration per process; operators guarantee one process migrates at a
// time across the deployment.
static MIGRATION_LOCK: Mutex<()> = Mutex::const_new(());

/// Boxed future returned by a migration step.
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// A single migration step: an async function over a session.
pub type StepFn = for<'a> fn(&'a Session) -> StepFuture<'a>;

/// One entry of the migration table, covering `>= min, < max`.
pub struct Migration {
    pub min: Version,
    pub max: Version,
    pub name: &'static str,
    pub run: StepFn,
}

/// Options for [`MigrationRunner::migrate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrateOptions {
    /// Report instead of act: fail with `MigrationRequiredError` when the
    /// store needs migrating.
    pub check_only: bool,
}

/// Executes the migration chain against a store session.
pub struct MigrationRunner {
    table: Vec<Migration>,
    target: Version,
}

fn epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

impl MigrationRunner {
    /// Runner over the built-in table, targeting the build's declared
    /// version.
    pub fn from_build() -> Result<MigrationRunner> {
        Ok(MigrationRunner {
            table: steps::builtin_table(),
            target: Version::parse(TARGET_VERSION)?,
        })
    }

    /// Runner over an explicit table and target.
    pub fn new(table: Vec<Migration>, target: Version) -> MigrationRunner {
        MigrationRunner { table, target }
    }

    /// Same table, different target. Used by deployments pinned below the
    /// build version and by tests.
    pub fn with_target(mut self, target: Version) -> MigrationRunner {
        self.target = target;
        self
    }

    pub fn target(&self) -> &Version {
        &self.target
    }

    /// `~MAJOR.MINOR` compatibility: patch-level differences never trigger
    /// migration.
    pub fn compatible(a: &Version, b: &Version) -> bool {
        a.major == b.major && a.minor == b.minor
    }

    /// Whether the gap between `current` and `target` requires migrating.
    pub fn requires_migration(current: &Version, target: &Version) -> bool {
        !Self::compatible(current, target)
    }

    /// Reads the current schema version: the `SchemaHistory` row with the
    /// greatest `createdAt`.
    pub async fn current_version(&self, session: &Session) -> Result<Version> {
        let rows = session
            .query(
                "SELECT * FROM SchemaHistory ORDER BY createdAt DESC LIMIT 1",
                &Params::new(),
            )
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| GraphKbError::NotFound("schema history".into()))?;
        let raw = row
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphKbError::Internal("schema history row has no version".into()))?;
        Ok(Version::parse(raw)?)
    }

    async fn append_history(&self, session: &Session, version: &Version) -> Result<()> {
        session
            .command(
                "INSERT INTO SchemaHistory SET name = :name, version = :version, url = :url, createdAt = :createdAt",
                &params([
                    ("name", json!(HISTORY_NAME)),
                    ("version", json!(version.to_string())),
                    ("url", json!(HISTORY_URL)),
                    ("createdAt", json!(epoch_ms())),
                ]),
            )
            .await?;
        Ok(())
    }

    /// Brings the store's schema up to the target version.
    ///
    /// Compatible versions return without touching the store. Otherwise each
    /// matching table entry runs in order, each followed by a history row at
    /// the entry's upper bound; a final row records the exact target when it
    /// differs from the last bound reached.
    pub async fn migrate(&self, session: &Session, opts: MigrateOptions) -> Result<Version> {
        let _guard = MIGRATION_LOCK.lock().await;
        let mut current = self.current_version(session).await?;
        if Self::compatible(&current, &self.target) {
            debug!(version = %current, "schema is current");
            return Ok(current);
        }
        if opts.check_only {
            return Err(GraphKbError::MigrationRequired {
                current,
                target: self.target.clone(),
            });
        }
        while !Self::compatible(&current, &self.target) {
            let step = self
                .table
                .iter()
                .find(|entry| entry.min <= current && current < entry.max)
                .ok_or_else(|| GraphKbError::NoMigrationPath {
                    current: current.clone(),
                    target: self.target.clone(),
                })?;
            info!(from = %current, to = %step.max, step = step.name, "running migration step");
            (step.run)(session).await?;
            self.append_history(session, &step.max).await?;
            current = step.max.clone();
        }
        if current != self.target {
            self.append_history(session, &self.target).await?;
            current = self.target.clone();
        }
        info!(version = %current, "schema migration complete");
        Ok(current)
    }
}
