//! Migration runner scenarios over a scripted store.

mod support;

use std::sync::Arc;

use graphkb::migrate::{MigrateOptions, MigrationRunner};
use graphkb::GraphKbError;
use semver::Version;
use serde_json::{json, Value};

use support::{pool_over, FakeBackend};

fn history_row(version: &str) -> Value {
    json!({
        "@rid": "#50:0",
        "@class": "SchemaHistory",
        "name": "graphkb",
        "version": version,
        "url": "https://graphkb.bcgsc.ca",
        "createdAt": 1_600_000_000_000_i64,
    })
}

fn inserted_versions(backend: &FakeBackend) -> Vec<String> {
    backend
        .log
        .lock()
        .iter()
        .filter(|(text, _)| text.starts_with("INSERT INTO SchemaHistory"))
        .map(|(_, params)| {
            params
                .get("version")
                .and_then(Value::as_str)
                .expect("version param")
                .to_string()
        })
        .collect()
}

fn runner_to(target: &str) -> MigrationRunner {
    MigrationRunner::from_build()
        .expect("runner")
        .with_target(Version::parse(target).expect("target"))
}

#[tokio::test]
async fn upgrade_appends_one_row_per_step_in_order() {
    let backend = Arc::new(
        FakeBackend::new().route("SELECT * FROM SchemaHistory", vec![history_row("1.6.2")]),
    );
    let pool = pool_over(backend.clone());
    let session = pool.acquire().await.expect("session");
    let runner = runner_to("1.9.0");

    let reached = runner
        .migrate(&session, MigrateOptions::default())
        .await
        .expect("migrate");
    assert_eq!(reached, Version::parse("1.9.0").expect("version"));
    assert_eq!(inserted_versions(&backend), vec!["1.7.0", "1.8.0", "1.9.0"]);
}

#[tokio::test]
async fn patch_gap_appends_nothing() {
    let backend = Arc::new(
        FakeBackend::new().route("SELECT * FROM SchemaHistory", vec![history_row("1.8.0")]),
    );
    let pool = pool_over(backend.clone());
    let session = pool.acquire().await.expect("session");
    let runner = runner_to("1.8.3");

    let reached = runner
        .migrate(&session, MigrateOptions::default())
        .await
        .expect("migrate");
    assert_eq!(reached, Version::parse("1.8.0").expect("version"));
    assert!(inserted_versions(&backend).is_empty());
    // No DDL either: the version probe is the only statement.
    assert_eq!(backend.statements().len(), 1);
}

#[tokio::test]
async fn full_builtin_chain_reaches_the_build_version() {
    let backend = Arc::new(
        FakeBackend::new().route("SELECT * FROM SchemaHistory", vec![history_row("1.6.0")]),
    );
    let pool = pool_over(backend.clone());
    let session = pool.acquire().await.expect("session");
    let runner = MigrationRunner::from_build().expect("runner");

    let reached = runner
        .migrate(&session, MigrateOptions::default())
        .await
        .expect("migrate");
    assert_eq!(&reached, runner.target());
    let versions = inserted_versions(&backend);
    assert_eq!(
        versions,
        vec!["1.7.0", "1.8.0", "1.9.0", "2.0.0", "3.0.0", "3.1.0"]
    );
    // The permissions step ran against every class of the schema.
    assert!(backend
        .statements()
        .iter()
        .any(|text| text.starts_with("UPDATE UserGroup SET permissions.Disease")));
    // The license row was seeded.
    assert!(backend
        .statements()
        .iter()
        .any(|text| text.starts_with("INSERT INTO LicenseAgreement")));
}

#[tokio::test]
async fn check_only_fails_instead_of_migrating() {
    let backend = Arc::new(
        FakeBackend::new().route("SELECT * FROM SchemaHistory", vec![history_row("1.6.2")]),
    );
    let pool = pool_over(backend.clone());
    let session = pool.acquire().await.expect("session");
    let runner = runner_to("1.9.0");

    let err = runner
        .migrate(&session, MigrateOptions { check_only: true })
        .await
        .expect_err("check only");
    assert!(matches!(err, GraphKbError::MigrationRequired { .. }));
    assert_eq!(backend.statements().len(), 1);
}

#[tokio::test]
async fn versions_below_the_table_have_no_path() {
    let backend = Arc::new(
        FakeBackend::new().route("SELECT * FROM SchemaHistory", vec![history_row("0.9.0")]),
    );
    let pool = pool_over(backend.clone());
    let session = pool.acquire().await.expect("session");
    let runner = MigrationRunner::from_build().expect("runner");

    let err = runner
        .migrate(&session, MigrateOptions::default())
        .await
        .expect_err("no path");
    assert!(matches!(err, GraphKbError::NoMigrationPath { .. }));
}
