//! End-to-end adapter scenarios over the in-memory block-blob service
//!
//! Each test drives the public facade only and checks what a caller of the
//! filesystem contract would observe.

use std::sync::Arc;

use adapter_core::telemetry::init_tracing;
use adapter_core::{AdapterConfig, Error, RecordKind, StorageRecord, Visibility};
use anyhow::Result;
use bytes::Bytes;
use storage::{BlobAdapter, BlockId, DeleteDirOutcome, FaultOp, MemoryBlobClient, WriteOptions};

const CONTAINER: &str = "integration";

fn setup(prefix: &str, chunk_size: usize) -> Result<(Arc<MemoryBlobClient>, BlobAdapter)> {
    init_tracing("storage=debug,integration_test=info");

    let client = Arc::new(MemoryBlobClient::new());
    let mut config = AdapterConfig::new(CONTAINER).with_chunk_size(chunk_size);
    if !prefix.is_empty() {
        config = config.with_prefix(prefix);
    }
    let adapter = BlobAdapter::new(client.clone(), config)?;
    Ok((client, adapter))
}

#[tokio::test]
async fn test_slugged_chunked_write_scenario() -> Result<()> {
    let (client, adapter) = setup("prefix", 2000)?;
    let content: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();

    // 1. Write through the facade
    let record = adapter
        .write("Folder/My File.TXT", Bytes::from(content.clone()), WriteOptions::private())
        .await?;
    assert_eq!(record.visibility, Some(Visibility::Private));
    assert_eq!(record.size, Some(5000));

    // 2. The store holds one object at the slugged, prefixed key
    let key = adapter.object_key("Folder/My File.TXT");
    assert_eq!(key, "prefix/folder/my_file.txt");
    assert_eq!(client.object_count(CONTAINER), 1);

    // 3. Committed as three ordered blocks
    let blocks = client.committed_blocks(CONTAINER, &key).expect("object committed");
    assert_eq!(
        blocks,
        vec![BlockId::sequence(1), BlockId::sequence(2), BlockId::sequence(3)]
    );

    // 4. Reading back through the original path returns the same bytes
    let out = adapter.read("Folder/My File.TXT").await?;
    assert_eq!(out.contents.as_ref(), content.as_slice());

    Ok(())
}

#[tokio::test]
async fn test_write_metadata_visibility_round_trip() -> Result<()> {
    let (_client, adapter) = setup("", 1024)?;
    let content = Bytes::from_static(b"round trip payload");

    adapter
        .write("reports/q1.csv", content.clone(), WriteOptions::public())
        .await?;

    let meta = adapter.get_metadata("reports/q1.csv").await?;
    assert_eq!(meta.size, Some(content.len() as u64));
    assert_eq!(meta.kind, RecordKind::File);
    assert_eq!(meta.mimetype.as_deref(), Some("text/csv"));
    assert_eq!(adapter.get_visibility("reports/q1.csv").await, Visibility::Public);

    Ok(())
}

#[tokio::test]
async fn test_repeated_write_is_idempotent() -> Result<()> {
    let (client, adapter) = setup("prefix", 4)?;
    let content = Bytes::from_static(b"same content twice");

    adapter.write("twice.txt", content.clone(), WriteOptions::private()).await?;
    adapter.write("twice.txt", content.clone(), WriteOptions::private()).await?;

    assert_eq!(client.object_count(CONTAINER), 1);
    assert_eq!(adapter.read("twice.txt").await?.contents, content);
    Ok(())
}

#[tokio::test]
async fn test_chunk_boundaries() -> Result<()> {
    let (client, adapter) = setup("", 100)?;

    adapter
        .write("exact.bin", Bytes::from(vec![1u8; 300]), WriteOptions::default())
        .await?;
    let blocks = client.committed_blocks(CONTAINER, "exact.bin").expect("committed");
    let ids: Vec<_> = blocks.iter().map(|b| b.decode()).collect();
    assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);

    adapter
        .write("empty.bin", Bytes::new(), WriteOptions::default())
        .await?;
    assert_eq!(client.committed_blocks(CONTAINER, "empty.bin"), Some(Vec::new()));
    assert_eq!(adapter.get_metadata("empty.bin").await?.size, Some(0));

    Ok(())
}

#[tokio::test]
async fn test_directory_emulation() -> Result<()> {
    let (_client, adapter) = setup("prefix", 64)?;
    assert!(adapter.list_contents().await?.is_empty());

    adapter
        .write("a/b.txt", Bytes::from_static(b"b"), WriteOptions::default())
        .await?;

    let listed = adapter.list_contents().await?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0], StorageRecord::dir("a"));
    assert_eq!(listed[1].path, "a/b.txt");
    assert!(listed[1].is_file());

    let json = serde_json::to_value(&listed[0])?;
    assert_eq!(json, serde_json::json!({"path": "a", "type": "dir"}));

    Ok(())
}

#[tokio::test]
async fn test_listed_paths_are_addressable() -> Result<()> {
    let (_client, adapter) = setup("prefix", 64)?;
    adapter
        .write("Mixed Case/File Name.md", Bytes::from_static(b"x"), WriteOptions::default())
        .await?;

    // Listings return slugged paths; feeding them back resolves to the same object.
    let listed = adapter.list_contents().await?;
    let file = listed.iter().find(|r| r.is_file()).expect("file listed");
    assert_eq!(file.path, "mixed_case/file_name.md");
    assert_eq!(adapter.read(&file.path).await?.contents, Bytes::from_static(b"x"));

    Ok(())
}

#[tokio::test]
async fn test_rename_saga() -> Result<()> {
    let (client, adapter) = setup("prefix", 64)?;
    adapter
        .write("draft.txt", Bytes::from_static(b"draft"), WriteOptions::public())
        .await?;

    // Successful rename moves the object and keeps its visibility
    let moved = adapter.rename("draft.txt", "final/published.txt").await?;
    assert_eq!(moved.path, "final/published.txt");
    assert!(!adapter.has("draft.txt").await);
    assert_eq!(adapter.get_visibility("final/published.txt").await, Visibility::Public);

    // A failed delete step leaves the object at both paths
    client.inject_fault(FaultOp::DeleteObject, "connection reset");
    let err = adapter
        .rename("final/published.txt", "archive/published.txt")
        .await
        .expect_err("delete step should fail");
    assert!(matches!(err, Error::PartialOperation { .. }));
    assert!(adapter.has("final/published.txt").await);
    assert!(adapter.has("archive/published.txt").await);

    Ok(())
}

#[tokio::test]
async fn test_rename_between_paths_sharing_a_key() -> Result<()> {
    let (client, adapter) = setup("prefix", 64)?;
    adapter
        .write("Report.PDF", Bytes::from_static(b"%PDF-1.7"), WriteOptions::default())
        .await?;

    // Both paths slug to prefix/report.pdf, so the object must survive
    let record = adapter.rename("Report.PDF", "report.pdf").await?;
    assert_eq!(record.path, "report.pdf");
    assert_eq!(client.object_count(CONTAINER), 1);
    assert_eq!(
        adapter.read("report.pdf").await?.contents,
        Bytes::from_static(b"%PDF-1.7")
    );

    Ok(())
}

#[tokio::test]
async fn test_missing_paths_are_not_found() -> Result<()> {
    let (_client, adapter) = setup("prefix", 64)?;

    for result in [
        adapter.get_metadata("nope.txt").await.map(|_| ()),
        adapter.read("nope.txt").await.map(|_| ()),
        adapter.delete("nope.txt").await,
    ] {
        match result {
            Err(Error::NotFound { path }) => assert_eq!(path, "nope.txt"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    assert!(!adapter.has("nope.txt").await);
    assert_eq!(adapter.get_visibility("nope.txt").await, Visibility::Private);
    Ok(())
}

#[tokio::test]
async fn test_delete_dir_and_create_dir() -> Result<()> {
    let (client, adapter) = setup("prefix", 64)?;

    let dir = adapter.create_dir("photos");
    assert!(dir.is_dir());
    assert_eq!(client.object_count(CONTAINER), 0);

    for name in ["photos/1.jpg", "photos/2019/2.jpg", "photosets/3.jpg"] {
        adapter
            .write(name, Bytes::from_static(b"jpg"), WriteOptions::default())
            .await?;
    }

    match adapter.delete_dir("photos").await {
        DeleteDirOutcome::Completed { deleted } => assert_eq!(deleted, 2),
        DeleteDirOutcome::Interrupted { error } => panic!("unexpected failure: {error}"),
    }
    assert!(adapter.has("photosets/3.jpg").await);

    Ok(())
}

#[tokio::test]
async fn test_stream_large_file() -> Result<()> {
    let (client, adapter) = setup("prefix", 64 * 1024)?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("large.dat");
    let content: Vec<u8> = (0..200_000u32).map(|i| (i % 97) as u8).collect();
    tokio::fs::write(&path, &content).await?;

    let file = tokio::fs::File::open(&path).await?;
    let record = adapter
        .write_stream("uploads/large.dat", file, WriteOptions::private())
        .await?;
    assert_eq!(record.size, Some(200_000));

    let blocks = client
        .committed_blocks(CONTAINER, "prefix/uploads/large.dat")
        .expect("committed");
    assert_eq!(blocks.len(), 4);

    let out = adapter.read("uploads/large.dat").await?;
    assert_eq!(out.contents.as_ref(), content.as_slice());
    Ok(())
}

#[tokio::test]
async fn test_failed_upload_after_pre_delete_leaves_nothing() -> Result<()> {
    let (client, adapter) = setup("prefix", 4)?;
    adapter
        .write("config.json", Bytes::from_static(b"{\"v\":1}"), WriteOptions::default())
        .await?;

    // The old object is removed before the first block is staged, so a
    // failing block upload leaves no object behind rather than the old one.
    client.inject_fault(FaultOp::PutBlock, "service unavailable");
    let err = adapter
        .write("config.json", Bytes::from_static(b"{\"v\":2}"), WriteOptions::default())
        .await
        .expect_err("block upload should fail");
    assert!(matches!(err, Error::Service { .. }));
    assert!(!adapter.has("config.json").await);

    // Retrying the whole upload succeeds from block 1
    let record = adapter
        .write("config.json", Bytes::from_static(b"{\"v\":2}"), WriteOptions::default())
        .await?;
    assert_eq!(record.mimetype.as_deref(), Some("application/json"));
    tracing::info!(size = ?record.size, "Upload retried");

    Ok(())
}
