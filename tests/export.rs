//! Export back-end tests: JSONL streaming shape, SQLite round-trip,
//! Cypher and graph document structure, fed from a real chunking run.

use code_chunker::engine::IntelligentChunker;
use code_chunker::export::{
    DotExporter, GraphmlExporter, JsonExporter, JsonlExporter, Neo4jExporter, PostgresExporter,
    SqliteExporter, StructuredExporter,
};
use code_chunker::grammar::GrammarRegistry;
use code_chunker::{Chunk, ChunkRelationship, RelationshipKind, RelationshipTracker};
use std::sync::Arc;

fn sample_data() -> (Vec<Chunk>, Vec<ChunkRelationship>) {
    let chunks: Vec<Chunk> = (0..3)
        .map(|i| {
            let content = format!("def f{i}():\n    return {i}\n");
            let start = i * 30;
            Chunk::new(
                "python",
                "sample.py",
                "function_definition",
                content.clone(),
                start,
                start + content.len(),
                i * 3 + 1,
                i * 3 + 2,
            )
        })
        .collect();

    let relationships = vec![
        ChunkRelationship::new(
            chunks[0].chunk_id.clone(),
            chunks[1].chunk_id.clone(),
            RelationshipKind::Calls,
        ),
        ChunkRelationship::new(
            chunks[1].chunk_id.clone(),
            chunks[2].chunk_id.clone(),
            RelationshipKind::References,
        ),
    ];

    (chunks, relationships)
}

#[test]
fn jsonl_streaming_writes_exactly_six_records_in_order() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("stream.jsonl");
    let (chunks, relationships) = sample_data();

    JsonlExporter::new()
        .export_streaming(
            &mut chunks.into_iter(),
            &mut relationships.into_iter(),
            &path,
        )
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let records: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(records.len(), 6);
    let types: Vec<&str> = records
        .iter()
        .map(|r| r["type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        vec![
            "metadata",
            "chunk",
            "chunk",
            "chunk",
            "relationship",
            "relationship"
        ]
    );
}

#[test]
fn json_document_preserves_all_chunk_fields() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("full.json");
    let (chunks, relationships) = sample_data();

    JsonExporter::new()
        .export(&chunks, &relationships, &path, None)
        .unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    let first = &value["chunks"][0];
    for field in [
        "chunk_id",
        "language",
        "file_path",
        "node_type",
        "start_line",
        "end_line",
        "byte_start",
        "byte_end",
        "content",
    ] {
        assert!(first.get(field).is_some(), "missing field {field}");
    }
    assert_eq!(value["metadata"]["relationship_count"], 2);
}

#[test]
fn sqlite_round_trip_preserves_counts_and_content() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("chunks.db");
    let (chunks, relationships) = sample_data();

    SqliteExporter::new()
        .export(&chunks, &relationships, &path, None)
        .unwrap();

    let conn = rusqlite::Connection::open(&path).unwrap();
    let chunk_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))
        .unwrap();
    let relationship_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM relationships", [], |r| r.get(0))
        .unwrap();
    let metadata_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM export_metadata", [], |r| r.get(0))
        .unwrap();

    assert_eq!(chunk_count, 3);
    assert_eq!(relationship_count, 2);
    assert_eq!(metadata_count, 1);

    // Indexes exist for the documented query paths
    let index_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert!(index_count >= 6);
}

#[test]
fn postgres_script_is_transactional_and_escaped() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("out.sql");

    let chunk = Chunk::new(
        "text",
        "weird.txt",
        "text",
        "content with 'quotes' in it",
        0,
        27,
        1,
        1,
    );
    PostgresExporter::new()
        .export(&[chunk], &[], &path, None)
        .unwrap();

    let script = std::fs::read_to_string(&path).unwrap();
    assert!(script.contains("BEGIN;"));
    assert!(script.contains("COMMIT;"));
    assert!(script.contains("'content with ''quotes'' in it'"));
    assert!(script.contains("USING GIN"));
}

#[test]
fn neo4j_groups_relationships_by_type() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("graph.cypher");
    let (chunks, relationships) = sample_data();

    Neo4jExporter::new()
        .export(&chunks, &relationships, &path, None)
        .unwrap();

    let script = std::fs::read_to_string(&path).unwrap();
    assert!(script.contains("REQUIRE c.chunk_id IS UNIQUE"));
    assert!(script.contains("MERGE (source)-[r:CALLS]->(target);"));
    assert!(script.contains("MERGE (source)-[r:REFERENCES]->(target);"));
}

#[test]
fn graph_documents_mirror_the_edge_list() {
    let dir = tempfile::TempDir::new().unwrap();
    let (chunks, relationships) = sample_data();

    let graphml_path = dir.path().join("g.graphml");
    GraphmlExporter::new()
        .export(&chunks, &relationships, &graphml_path, None)
        .unwrap();
    let graphml = std::fs::read_to_string(&graphml_path).unwrap();
    assert_eq!(graphml.matches("<node ").count(), chunks.len());
    assert_eq!(graphml.matches("<edge ").count(), relationships.len());

    let dot_path = dir.path().join("g.dot");
    DotExporter::new()
        .export(&chunks, &relationships, &dot_path, None)
        .unwrap();
    let dot = std::fs::read_to_string(&dot_path).unwrap();
    assert_eq!(dot.matches(" -> ").count(), relationships.len());
}

#[test]
fn full_pipeline_from_source_to_jsonl() {
    let source = "def alpha():\n    return beta()\n\ndef beta():\n    return 42\n";

    let registry_dir = tempfile::TempDir::new().unwrap();
    let registry =
        Arc::new(GrammarRegistry::with_cache_dir(registry_dir.keep()).expect("registry"));
    let outcome = IntelligentChunker::new(registry)
        .chunk_text(source, "pipeline.py", Some("python"))
        .expect("chunking succeeds");

    let relationships = RelationshipTracker::infer(&outcome.chunks);
    assert!(
        relationships
            .iter()
            .any(|r| r.kind == RelationshipKind::Calls),
        "alpha calls beta"
    );

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("pipeline.jsonl");
    JsonlExporter::new()
        .export(&outcome.chunks, &relationships, &path, None)
        .unwrap();

    let lines = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        lines.lines().count(),
        1 + outcome.chunks.len() + relationships.len()
    );
}
