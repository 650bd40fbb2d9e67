use std::sync::Arc;
use study_index::{HashingEmbedder, IndexStore, RagIndex, DEFAULT_TOP_K};
use study_models::{ChunkingConfig, StudyError};
use tempfile::tempdir;

fn chunking() -> ChunkingConfig {
    ChunkingConfig {
        max_chars: 1200,
        overlap: 200,
        min_break: 200,
    }
}

async fn memory_index(collection: &str) -> RagIndex {
    let store = IndexStore::connect("sqlite::memory:").await.unwrap();
    RagIndex::open(store, Arc::new(HashingEmbedder::default()), collection, chunking())
        .await
        .unwrap()
}

#[tokio::test]
async fn collection_name_is_required() {
    let store = IndexStore::connect("sqlite::memory:").await.unwrap();
    let result = RagIndex::open(store, Arc::new(HashingEmbedder::default()), "  ", chunking()).await;
    assert!(matches!(result, Err(StudyError::InvalidRequest { .. })));
}

#[tokio::test]
async fn add_document_counts_chunks_and_skips_empty_text() {
    let index = memory_index("job-1").await;
    assert_eq!(index.add_document("job-1", "empty.txt", "   ").await.unwrap(), 0);

    let long = "Ownership moves values between bindings. ".repeat(80);
    let count = index.add_document("job-1", "notes.md", &long).await.unwrap();
    assert!(count > 1);

    let (docs, metas) = index.get_all_for_docset("job-1", None).await.unwrap();
    assert_eq!(docs.len(), count);
    assert!(metas.iter().enumerate().all(|(i, m)| m.chunk == i as i64 && m.source == "notes.md"));
}

#[tokio::test]
async fn reindexing_the_same_source_overwrites() {
    let index = memory_index("job-2").await;
    index.add_document("job-2", "a.txt", "first version").await.unwrap();
    index.add_document("job-2", "a.txt", "second version").await.unwrap();

    let (docs, _) = index.get_all_for_docset("job-2", None).await.unwrap();
    assert_eq!(docs, vec!["second version".to_string()]);
}

#[tokio::test]
async fn query_ranks_by_similarity() {
    let index = memory_index("job-3").await;
    index
        .add_document("job-3", "bio.txt", "Photosynthesis converts light into chemical energy in plants")
        .await
        .unwrap();
    index
        .add_document("job-3", "rust.txt", "The borrow checker validates references and lifetimes")
        .await
        .unwrap();

    let hits = index
        .query("job-3", "how does the borrow checker treat references", DEFAULT_TOP_K)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].source, "rust.txt");
    assert!(hits[0].score > hits[1].score);

    let top_one = index.query("job-3", "plants and light", 1).await.unwrap();
    assert_eq!(top_one.len(), 1);
    assert_eq!(top_one[0].source, "bio.txt");
}

#[tokio::test]
async fn limit_and_docset_filter() {
    let index = memory_index("job-4").await;
    for i in 0..3 {
        index
            .add_document("job-4", &format!("f{}.txt", i), &format!("file number {}", i))
            .await
            .unwrap();
    }
    index.add_document("other", "x.txt", "foreign docset").await.unwrap();

    let (docs, metas) = index.get_all_for_docset("job-4", Some(2)).await.unwrap();
    assert_eq!(docs, vec!["file number 0".to_string(), "file number 1".to_string()]);
    assert_eq!(metas[1].source, "f1.txt");

    let (docs, _) = index.get_all_for_docset("missing", None).await.unwrap();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn delete_collection_removes_chunks() {
    let tmp = tempdir().unwrap();
    let store = IndexStore::open(tmp.path()).await.unwrap();
    assert!(tmp.path().join("chroma/index.sqlite3").exists());

    let index = RagIndex::open(store.clone(), Arc::new(HashingEmbedder::default()), "job-5", chunking())
        .await
        .unwrap();
    index.add_document("job-5", "a.txt", "some text").await.unwrap();
    assert_eq!(store.list_collections().await.unwrap(), vec!["job-5".to_string()]);

    assert!(index.delete_collection().await.unwrap());
    assert!(store.list_collections().await.unwrap().is_empty());
    assert!(store.docset_chunks("job-5", "job-5", None).await.unwrap().is_empty());
    assert!(!store.delete_collection("job-5").await.unwrap());
}
