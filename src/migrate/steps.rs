//! The ordered migration table and its step functions.
//!
//! Steps must tolerate partial prior execution: property creation is
//! check-first, index creation is graceful, and data updates are guarded so
//! re-running a step after a crash converges instead of failing.

use std::time::{SystemTime, UNIX_EPOCH};

use bitflags::bitflags;
use semver::Version;
use serde_json::json;
use tracing::info;

use crate::error::Result;
use crate::migrate::{Migration, StepFuture};
use crate::schema::{self, InheritOpts, PropertyDef, PropertyType, SchemaRegistry, ONTOLOGY_BASE};
use crate::store::{params, Params, Session};

bitflags! {
    /// Per-class operation mask stored on user groups.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permission: u8 {
        const READ = 0b0001;
        const CREATE = 0b0010;
        const UPDATE = 0b0100;
        const DELETE = 0b1000;
    }
}

impl Permission {
    /// Default mask for a class: edges are linkable but not editable,
    /// abstract classes are read-only, everything else is fully open.
    pub fn default_for(is_edge: bool, is_abstract: bool) -> Permission {
        if is_edge {
            Permission::READ | Permission::CREATE | Permission::DELETE
        } else if is_abstract {
            Permission::READ
        } else {
            Permission::all()
        }
    }
}

fn entry(min: &str, max: &str, name: &'static str, run: super::StepFn) -> Migration {
    Migration {
        min: Version::parse(min).expect("static version bound"),
        max: Version::parse(max).expect("static version bound"),
        name,
        run,
    }
}

/// The migration table, ordered by ascending lower bound.
pub(super) fn builtin_table() -> Vec<Migration> {
    vec![
        entry("1.6.0", "1.7.0", "backfill ontology indices", migrate_1_6_to_1_7),
        entry("1.7.0", "1.8.0", "add displayName", migrate_1_7_to_1_8),
        entry("1.8.0", "1.9.0", "retype Source.sort", migrate_1_8_to_1_9),
        entry("1.9.0", "2.0.0", "rename sourceVersion", migrate_1_9_to_2_0),
        entry("2.0.0", "3.0.0", "2.x to 3.x", migrate_2_x_to_3_0),
        entry("3.0.0", "3.1.0", "group permissions and license", migrate_3_0_to_3_1),
    ]
}

fn concrete_ontology_classes(registry: &SchemaRegistry) -> Result<Vec<String>> {
    Ok(registry
        .classes_inheriting(
            ONTOLOGY_BASE,
            InheritOpts {
                include_abstract: false,
                include_self: false,
            },
        )?
        .into_iter()
        .map(str::to_string)
        .collect())
}

/// Ontology classes predate their covering indices; create what is missing.
fn migrate_1_6_to_1_7(session: &Session) -> StepFuture<'_> {
    Box::pin(async move {
        let registry = schema::graphkb()?;
        for name in concrete_ontology_classes(&registry)? {
            let class = registry.get(&name)?;
            for index in &class.indices {
                session.create_index(class, index, true).await?;
            }
        }
        Ok(())
    })
}

/// Adds `displayName` to the ontology root and seeds it from `name`.
fn migrate_1_7_to_1_8(session: &Session) -> StepFuture<'_> {
    Box::pin(async move {
        let registry = schema::graphkb()?;
        session
            .create_property(
                ONTOLOGY_BASE,
                &PropertyDef::new("displayName", PropertyType::String),
            )
            .await?;
        for name in concrete_ontology_classes(&registry)? {
            session
                .command(
                    &format!("UPDATE {name} SET displayName = name WHERE displayName IS NULL"),
                    &Params::new(),
                )
                .await?;
        }
        Ok(())
    })
}

/// `Source.sort` was stored as a string; convert it to an integer in place.
/// The property cannot be altered while populated: copy to a temporary,
/// drop the original with its index, rename the temporary back, rebuild.
fn migrate_1_8_to_1_9(session: &Session) -> StepFuture<'_> {
    Box::pin(async move {
        let registry = schema::graphkb()?;
        let source = registry.get("Source")?;
        session
            .create_property("Source", &PropertyDef::new("tmpSort", PropertyType::Integer))
            .await?;
        session
            .command(
                "UPDATE Source SET tmpSort = sort.asInteger() WHERE sort IS NOT NULL",
                &Params::new(),
            )
            .await?;
        session.drop_index("Source_sort_notunique").await?;
        session
            .command("DROP PROPERTY Source.sort FORCE", &Params::new())
            .await?;
        session
            .command("ALTER PROPERTY Source.tmpSort NAME sort", &Params::new())
            .await?;
        for index in &source.indices {
            session.create_index(source, index, true).await?;
        }
        Ok(())
    })
}

/// Renames `sourceVersion` to `sourceIdVersion` and re-points records.
fn migrate_1_9_to_2_0(session: &Session) -> StepFuture<'_> {
    Box::pin(async move {
        let registry = schema::graphkb()?;
        session
            .create_property(
                ONTOLOGY_BASE,
                &PropertyDef::new("sourceIdVersion", PropertyType::String),
            )
            .await?;
        for name in concrete_ontology_classes(&registry)? {
            session
                .command(
                    &format!(
                        "UPDATE {name} SET sourceIdVersion = sourceVersion WHERE sourceVersion IS NOT NULL AND sourceIdVersion IS NULL"
                    ),
                    &Params::new(),
                )
                .await?;
        }
        session
            .command(
                &format!("DROP PROPERTY {ONTOLOGY_BASE}.sourceVersion FORCE"),
                &Params::new(),
            )
            .await?;
        Ok(())
    })
}

/// Schema 3.0 changed nothing at the storage level; the entry exists so the
/// version chain stays contiguous.
fn migrate_2_x_to_3_0(session: &Session) -> StepFuture<'_> {
    Box::pin(async move {
        let _ = session;
        info!("no storage changes between 2.x and 3.0");
        Ok(())
    })
}

/// Introduces per-group permission masks, rebuilds the fulltext indices and
/// seeds the default end-user license.
fn migrate_3_0_to_3_1(session: &Session) -> StepFuture<'_> {
    Box::pin(async move {
        let registry = schema::graphkb()?;
        session
            .create_property(
                "UserGroup",
                &PropertyDef::new("permissions", PropertyType::Embedded),
            )
            .await?;
        for class in registry.classes() {
            let mask = Permission::default_for(
                registry.is_edge_class(&class.name),
                class.is_abstract,
            );
            session
                .command(
                    &format!("UPDATE UserGroup SET permissions.{} = :mask", class.name),
                    &params([("mask", json!(mask.bits()))]),
                )
                .await?;
        }
        for name in concrete_ontology_classes(&registry)? {
            let class = registry.get(&name)?;
            for index in &class.indices {
                if index.index_type == schema::IndexType::FullText {
                    session.drop_index(&index.name).await?;
                    session.create_index(class, index, false).await?;
                }
            }
        }
        let existing = session
            .command("SELECT FROM LicenseAgreement LIMIT 1", &Params::new())
            .await?;
        if existing.is_empty() {
            let enacted = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_millis() as i64)
                .unwrap_or(0);
            session
                .command(
                    "INSERT INTO LicenseAgreement SET content = :content, enactedAt = :enactedAt",
                    &params([
                        ("content", json!(DEFAULT_LICENSE)),
                        ("enactedAt", json!(enacted)),
                    ]),
                )
                .await?;
        }
        Ok(())
    })
}

const DEFAULT_LICENSE: &str = "GraphKB is intended for research purposes only. \
Redistribution of its content requires the agreement of the data sources it \
aggregates; users must accept these terms before querying the knowledge base.";
