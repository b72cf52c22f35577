use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use embed_service::{HashEmbedder, PassthroughReranker, ProviderContext};
use kb_store::{KbConfig, KnowledgeBase, MemoryStore, QueryMode, SearchRequest, VectorStore};
use md_chunker::{ChunkOptions, Document};

const REDIS: &str = "---
title: Redis failover
confidence: high
tags: [redis, ops]
source_repo: https://git.example.com/ops
---
## Detect

Watch sentinel logs for the switch-master event.

### Promote

Promote the replica and update the service endpoint.
";

const ADR: &str = "---
title: Choose Postgres
---
# Context

We need transactional storage for billing records.
";

fn write_corpus(root: &Path) -> PathBuf {
    let docs = root.join("docs");
    fs::create_dir_all(docs.join("runbook")).unwrap();
    fs::create_dir_all(docs.join("adr")).unwrap();
    fs::write(docs.join("runbook/redis.md"), REDIS).unwrap();
    fs::write(docs.join("adr/0001-postgres.md"), ADR).unwrap();
    docs
}

fn kb(store: MemoryStore) -> KnowledgeBase {
    let mut cfg = KbConfig::new_default("http://localhost:6334", "kb-test");
    cfg.embedding.dim = 64;
    let providers = ProviderContext::with_providers(
        Arc::new(HashEmbedder::new(64)),
        Arc::new(PassthroughReranker),
    );
    KnowledgeBase::with_parts(cfg, Arc::new(store), providers)
}

#[tokio::test]
async fn index_search_and_reindex_are_stable() {
    let dir = tempfile::tempdir().unwrap();
    let docs = write_corpus(dir.path());
    let store = MemoryStore::new("kb-test");
    let kb = kb(store.clone());

    let report = kb.index_full(&[docs.clone()]).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.indexed.len(), 2);
    let points = store.count(None).await.unwrap();
    assert_eq!(points as usize, report.chunks_indexed());

    let req = SearchRequest::new("promote the replica", 3);
    let first = kb.search(&req).await;
    assert!(!first.is_error(), "{:?}", first.error);
    assert_eq!(first.mode, Some(QueryMode::DenseSparse));
    assert!(first.results[0].path.ends_with("runbook/redis.md"));
    assert_eq!(first.results[0].title, "Redis failover");
    assert!(first.note.is_some());

    let again = kb.index_full(&[docs]).await.unwrap();
    assert_eq!(again.chunks_indexed(), report.chunks_indexed());
    assert_eq!(store.count(None).await.unwrap(), points);
    let second = kb.search(&req).await;
    assert_eq!(first.results, second.results);
}

#[tokio::test]
async fn scope_keyword_search_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let docs = write_corpus(dir.path());
    let kb = kb(MemoryStore::new("kb-test"));
    kb.index_full(&[docs]).await.unwrap();

    let scoped = kb
        .search(&SearchRequest::new("storage", 5).with_scope("adr"))
        .await;
    assert!(!scoped.results.is_empty());
    assert!(scoped.results.iter().all(|h| h.path.contains("/adr/")));

    let hits = kb.keyword_search("sentinel", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Redis failover");
    assert!(hits[0].text.chars().count() <= 500);
    assert!(kb.keyword_search("   ", 10).await.unwrap().is_empty());

    let status = kb.status().await.unwrap();
    assert_eq!(status.collection, "kb-test");
    assert_eq!(status.documents.len(), 2);
    assert!(status.documents.iter().all(|d| d.has_sections));
    assert_eq!(status.stats.point_count as usize, status.sampled_points);
}

#[tokio::test]
async fn deletes_and_drop() {
    let dir = tempfile::tempdir().unwrap();
    let docs = write_corpus(dir.path());
    let store = MemoryStore::new("kb-test");
    let kb = kb(store.clone());
    kb.index_full(&[docs]).await.unwrap();

    let removed = kb.delete_by_source("https://git.example.com/ops").await.unwrap();
    assert!(removed > 0);
    assert_eq!(kb.delete_by_source("https://git.example.com/ops").await.unwrap(), 0);

    let remaining = kb.status().await.unwrap();
    assert_eq!(remaining.documents.len(), 1);
    kb.delete_doc(&remaining.documents[0].doc_id).await.unwrap();
    assert_eq!(store.count(None).await.unwrap(), 0);

    kb.drop_collection().await.unwrap();
    kb.drop_collection().await.unwrap();
    assert!(kb.status().await.is_err());
}

#[tokio::test]
async fn raw_chunk_json_is_indexed() {
    let doc = Document::parse("docs/faq.md", "## Q\n\nanswer\n", &ChunkOptions::default()).unwrap();
    let json = serde_json::to_string(&doc.to_chunks(3200)).unwrap();
    let store = MemoryStore::new("kb-test");
    let kb = kb(store.clone());

    let report = kb.index_chunks_json(&json).await.unwrap();
    assert_eq!(report.chunks_indexed(), 1);
    assert_eq!(store.count(None).await.unwrap(), 1);
    assert!(kb.index_chunks_json("{not json").await.is_err());
}

#[tokio::test]
async fn relative_and_absolute_paths_share_one_document() {
    // cargo runs integration tests from the package root
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    let dir = tempfile::tempdir_in(manifest).unwrap();
    let notes = dir.path().join("notes");
    fs::create_dir_all(&notes).unwrap();
    fs::write(notes.join("a.md"), ADR).unwrap();
    let rel_notes = notes.strip_prefix(manifest).unwrap().to_path_buf();

    let store = MemoryStore::new("kb-test");
    let kb = kb(store.clone());
    kb.index_full(&[rel_notes.clone()]).await.unwrap();
    let after_full = store.count(None).await.unwrap();
    assert!(after_full > 0);

    let report = kb.index_changed(&[notes.join("a.md")]).await.unwrap();
    assert_eq!(report.indexed.len(), 1);
    assert_eq!(store.count(None).await.unwrap(), after_full);

    fs::remove_file(notes.join("a.md")).unwrap();
    let report = kb.index_changed(&[rel_notes.join("a.md")]).await.unwrap();
    assert_eq!(report.deleted.len(), 1);
    assert_eq!(store.count(None).await.unwrap(), 0);
}
