//! End-to-end subgraph scenarios over a scripted store.
//!
//! One small `Disease` ontology drives every test:
//!
//! ```text
//! v0 -SubClassOf-> v1 -SubClassOf-> v2
//! v4 -SubClassOf-> v1      v3 -AliasOf-> v4 (v4 carries source.sort 0)
//! v8 -SubClassOf-> v2      v5 -DeprecatedBy-> v6 -SubClassOf-> v2
//! v7 isolated
//! ```

mod support;

use std::collections::BTreeSet;
use std::sync::Arc;

use graphkb::subgraph::{Direction, SubgraphKind, TraverseOptions};
use graphkb::{schema, traverse, GraphKbError, Rid};
use serde_json::Value;

use support::{edge, pool_over, resolvable, vertex, vertex_with_sort, FakeBackend};

fn rid(raw: &str) -> Rid {
    Rid::parse(raw).expect("rid")
}

fn rid_set(raw: &[&str]) -> BTreeSet<Rid> {
    raw.iter().map(|r| rid(r)).collect()
}

fn disease(index: usize) -> Value {
    vertex(&format!("#14:{index}"), "Disease", &format!("v{index}"))
}

fn all_tree_edges() -> Vec<Value> {
    vec![
        edge("#30:0", "SubClassOf", "#14:0", "#14:1"),
        edge("#30:1", "SubClassOf", "#14:1", "#14:2"),
        edge("#30:2", "SubClassOf", "#14:4", "#14:1"),
        edge("#30:3", "SubClassOf", "#14:8", "#14:2"),
        edge("#30:4", "SubClassOf", "#14:6", "#14:2"),
    ]
}

fn options(
    direction: Option<Direction>,
    first_generation_only: bool,
    base: &[&str],
) -> TraverseOptions {
    TraverseOptions {
        direction,
        first_generation_only,
        base: base.iter().map(|r| rid(r)).collect(),
        ..TraverseOptions::default()
    }
}

async fn run(
    backend: FakeBackend,
    opts: &TraverseOptions,
) -> graphkb::Result<graphkb::SubgraphResult> {
    let registry = schema::graphkb().expect("schema");
    let backend = Arc::new(backend);
    let pool = pool_over(backend);
    let session = pool.acquire().await.expect("session");
    traverse(&session, &registry, "Disease", opts).await
}

#[tokio::test]
async fn similar_to_walks_similarity_only() {
    let backend = FakeBackend::new()
        .route(
            "SELECT @rid, @class, deletedAt FROM [#14:3]",
            vec![resolvable("#14:3", "Disease")],
        )
        .route(
            "TRAVERSE both(",
            vec![
                disease(3),
                vertex_with_sort("#14:4", "Disease", "v4", 0),
                edge("#31:0", "AliasOf", "#14:3", "#14:4"),
            ],
        );
    let result = run(backend, &options(None, false, &["#14:3"]))
        .await
        .expect("traverse");
    let graph = result.real.expect("real graph");

    assert_eq!(
        graph.nodes.keys().cloned().collect::<BTreeSet<_>>(),
        rid_set(&["#14:3", "#14:4"])
    );
    assert_eq!(graph.edges.len(), 1);
    assert!(graph.edges.contains_key(&rid("#31:0")));
    assert_eq!(graph.components, vec![rid_set(&["#14:3", "#14:4"])]);
}

#[tokio::test]
async fn ancestors_follow_the_hierarchy_upwards() {
    let backend = FakeBackend::new()
        .route(
            "SELECT @rid, @class, deletedAt FROM [#14:0]",
            vec![resolvable("#14:0", "Disease")],
        )
        .route(
            "TRAVERSE both(",
            vec![
                disease(0),
                disease(1),
                disease(2),
                edge("#30:0", "SubClassOf", "#14:0", "#14:1"),
                edge("#30:1", "SubClassOf", "#14:1", "#14:2"),
            ],
        );
    let result = run(
        backend,
        &options(Some(Direction::Ascending), false, &["#14:0"]),
    )
    .await
    .expect("traverse");
    let graph = result.real.expect("real graph");

    assert_eq!(
        graph.nodes.keys().cloned().collect::<BTreeSet<_>>(),
        rid_set(&["#14:0", "#14:1", "#14:2"])
    );
    assert_eq!(graph.components.len(), 1);
    assert_eq!(graph.adjacency[&rid("#14:0")], rid_set(&["#14:1"]));
    assert_eq!(
        graph.adjacency[&rid("#14:1")],
        rid_set(&["#14:0", "#14:2"])
    );
    assert_eq!(graph.adjacency[&rid("#14:2")], rid_set(&["#14:1"]));
}

fn descendants_of_v2() -> Vec<Value> {
    let mut rows = vec![
        disease(2),
        disease(1),
        disease(0),
        vertex_with_sort("#14:4", "Disease", "v4", 0),
        disease(3),
        disease(8),
        disease(6),
        disease(5),
    ];
    rows.extend(all_tree_edges());
    rows.push(edge("#31:0", "AliasOf", "#14:3", "#14:4"));
    rows.push(edge("#32:0", "DeprecatedBy", "#14:5", "#14:6"));
    rows
}

#[tokio::test]
async fn descendants_pull_in_similarity_neighbours() {
    let backend = FakeBackend::new()
        .route(
            "SELECT @rid, @class, deletedAt FROM [#14:2]",
            vec![resolvable("#14:2", "Disease")],
        )
        .route("in('SubClassOf'), inE('SubClassOf')", descendants_of_v2());
    let result = run(
        backend,
        &options(Some(Direction::Descending), false, &["#14:2"]),
    )
    .await
    .expect("traverse");
    let graph = result.real.expect("real graph");

    assert_eq!(
        graph.nodes.keys().cloned().collect::<BTreeSet<_>>(),
        rid_set(&[
            "#14:0", "#14:1", "#14:2", "#14:3", "#14:4", "#14:5", "#14:6", "#14:8"
        ])
    );
    // Similarity stitches every hierarchy branch into one component.
    assert_eq!(graph.components.len(), 1);
}

#[tokio::test]
async fn parents_walk_one_generation_through_three_phases() {
    let backend = FakeBackend::new()
        .route(
            "SELECT @rid, @class, deletedAt FROM [#14:0]",
            vec![resolvable("#14:0", "Disease")],
        )
        .route(
            "out('SubClassOf'), outE('SubClassOf') FROM [#14:0] WHILE",
            vec![
                disease(0),
                edge("#30:0", "SubClassOf", "#14:0", "#14:1"),
                disease(1),
            ],
        )
        .route("FROM [#14:0, #14:1] WHILE", vec![disease(0), disease(1)])
        .route("FROM [#14:0] WHILE", vec![disease(0)]);
    let result = run(
        backend,
        &options(Some(Direction::Ascending), true, &["#14:0"]),
    )
    .await
    .expect("traverse");
    let graph = result.real.expect("real graph");

    assert_eq!(
        graph.nodes.keys().cloned().collect::<BTreeSet<_>>(),
        rid_set(&["#14:0", "#14:1"])
    );
    assert_eq!(graph.edges.len(), 1);
    assert!(graph.edges.contains_key(&rid("#30:0")));
}

#[tokio::test]
async fn ancestors_contain_parents() {
    let parents_backend = FakeBackend::new()
        .route(
            "SELECT @rid, @class, deletedAt FROM [#14:0]",
            vec![resolvable("#14:0", "Disease")],
        )
        .route(
            "out('SubClassOf'), outE('SubClassOf') FROM [#14:0] WHILE",
            vec![
                disease(0),
                edge("#30:0", "SubClassOf", "#14:0", "#14:1"),
                disease(1),
            ],
        )
        .route("FROM [#14:0, #14:1] WHILE", vec![disease(0), disease(1)])
        .route("FROM [#14:0] WHILE", vec![disease(0)]);
    let parents = run(
        parents_backend,
        &options(Some(Direction::Ascending), true, &["#14:0"]),
    )
    .await
    .expect("parents")
    .real
    .expect("real graph");

    let ancestors_backend = FakeBackend::new()
        .route(
            "SELECT @rid, @class, deletedAt FROM [#14:0]",
            vec![resolvable("#14:0", "Disease")],
        )
        .route(
            "TRAVERSE both(",
            vec![
                disease(0),
                disease(1),
                disease(2),
                edge("#30:0", "SubClassOf", "#14:0", "#14:1"),
                edge("#30:1", "SubClassOf", "#14:1", "#14:2"),
            ],
        );
    let ancestors = run(
        ancestors_backend,
        &options(Some(Direction::Ascending), false, &["#14:0"]),
    )
    .await
    .expect("ancestors")
    .real
    .expect("real graph");

    for node in parents.nodes.keys() {
        assert!(ancestors.nodes.contains_key(node), "{node} missing");
    }
}

#[tokio::test]
async fn virtualization_folds_similarity_classes() {
    let backend = FakeBackend::new()
        .route(
            "SELECT @rid, @class, deletedAt FROM [#14:2]",
            vec![resolvable("#14:2", "Disease")],
        )
        .route("in('SubClassOf'), inE('SubClassOf')", descendants_of_v2());
    let mut opts = options(Some(Direction::Descending), false, &["#14:2"]);
    opts.subgraph = SubgraphKind::Both;
    let result = run(backend, &opts).await.expect("traverse");
    let folded = result.virtualized.expect("virtual graph");

    // {v3, v4} folds onto v4 (source.sort 0) and {v5, v6} onto v6 (v5 is
    // the deprecated record); the rest stay singletons.
    assert_eq!(folded.v_nodes.len(), 6);
    assert_eq!(folded.g_to_v[&rid("#14:3")], rid("#14:4"));
    assert_eq!(folded.g_to_v[&rid("#14:5")], rid("#14:6"));
    assert_eq!(folded.v_nodes[&rid("#14:4")].label, "v4");
    assert_eq!(
        folded.v_nodes[&rid("#14:4")].records,
        vec![rid("#14:3"), rid("#14:4")]
    );

    let expected_edges: BTreeSet<String> = [
        "#14:4-#14:1",
        "#14:1-#14:2",
        "#14:0-#14:1",
        "#14:8-#14:2",
        "#14:6-#14:2",
    ]
    .iter()
    .map(|key| key.to_string())
    .collect();
    assert_eq!(
        folded.v_edges.keys().cloned().collect::<BTreeSet<_>>(),
        expected_edges
    );

    // Inverse mappings agree.
    for (real, virtual_id) in &folded.g_to_v {
        assert!(folded.v_to_g[virtual_id].contains(real));
    }
}

#[tokio::test]
async fn complete_scans_the_whole_ontology() {
    let mut vertices: Vec<Value> = (0..9)
        .map(|index| {
            if index == 4 {
                vertex_with_sort("#14:4", "Disease", "v4", 0)
            } else {
                disease(index)
            }
        })
        .collect();
    vertices.sort_by_key(|row| row["@rid"].as_str().map(str::to_string));
    let backend = FakeBackend::new()
        .route("FROM Disease WHERE deletedAt IS NULL", vertices)
        .route(
            "FROM AliasOf WHERE",
            vec![edge("#31:0", "AliasOf", "#14:3", "#14:4")],
        )
        .route(
            "FROM DeprecatedBy WHERE",
            vec![edge("#32:0", "DeprecatedBy", "#14:5", "#14:6")],
        )
        .route("FROM SubClassOf WHERE", all_tree_edges());
    let result = run(backend, &options(Some(Direction::Both), false, &[]))
        .await
        .expect("traverse");
    let graph = result.real.expect("real graph");

    assert_eq!(graph.nodes.len(), 9);
    assert_eq!(graph.edges.len(), 7);
    // Everything connects except the isolated v7.
    assert_eq!(graph.components.len(), 2);
    assert!(graph
        .components
        .iter()
        .any(|component| component == &rid_set(&["#14:7"])));
}

#[tokio::test]
async fn unknown_ontology_is_a_validation_error() {
    let backend = FakeBackend::new();
    let registry = schema::graphkb().expect("schema");
    let pool = pool_over(Arc::new(backend));
    let session = pool.acquire().await.expect("session");
    let err = traverse(
        &session,
        &registry,
        "NotARealClass",
        &options(None, false, &["#14:0"]),
    )
    .await
    .expect_err("bad ontology");
    assert!(matches!(err, GraphKbError::Validation(_)));
}

#[tokio::test]
async fn missing_base_is_a_validation_error() {
    let err = run(FakeBackend::new(), &options(None, false, &[]))
        .await
        .expect_err("missing base");
    assert!(matches!(err, GraphKbError::Validation(_)));
}

#[tokio::test]
async fn unresolvable_base_is_not_found() {
    let backend = FakeBackend::new();
    let err = run(backend, &options(None, false, &["#14:99"]))
        .await
        .expect_err("missing record");
    assert!(matches!(err, GraphKbError::NotFound(_)));
}

#[tokio::test]
async fn deleted_base_records_are_rejected() {
    let backend = FakeBackend::new().route(
        "SELECT @rid, @class, deletedAt FROM [#14:3]",
        vec![serde_json::json!({
            "@rid": "#14:3", "@class": "Disease", "deletedAt": 1000,
        })],
    );
    let err = run(backend, &options(None, false, &["#14:3"]))
        .await
        .expect_err("deleted record");
    assert!(matches!(err, GraphKbError::Validation(_)));
}
