//! End-to-end tests of the ingestion and question-answering pipeline over
//! the SQLite storage layer, with deterministic fake providers.

mod common;

use std::sync::Arc;
use tempfile::TempDir;

use common::{pdf_with_pages, sqlite_service, text_upload, HashEmbedder, RecordingGenerator};
use ragdesk::ingest::Upload;
use ragdesk::sqlite_index::SqliteIndex;
use ragdesk::{db, loader, migrate};
use ragdesk_core::chunk;
use ragdesk_core::embedding::Embedder;
use ragdesk_core::index::VectorIndex;
use ragdesk_core::models::{ContentType, TenantId, TextSegment};
use ragdesk_core::RagError;

const ORCHARD: &str = "The orchard grows pomegranate trees along the southern wall. \
Each autumn the pomegranate harvest is sorted by size and colour. \
Irrigation runs at dawn so the roots stay cool through the afternoon. \
Pruning happens in late winter, before the buds swell. \
The oldest tree was planted ninety years ago and still fruits every season.";

const GARAGE: &str = "The garage stores two bicycles and a workbench. \
Chain lubricant sits on the top shelf next to the tyre levers. \
Spare inner tubes are folded in the blue drawer under the bench.";

fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

#[tokio::test]
async fn upload_then_ask_is_grounded_and_recorded() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(RecordingGenerator::default());
    let service = sqlite_service(tmp.path(), Arc::new(HashEmbedder::new(64)), generator.clone(), None).await;
    let alice = tenant("alice");

    let receipt = service
        .submit_document(&alice, text_upload("orchard.txt", ORCHARD))
        .await
        .unwrap();
    assert!(receipt.chunk_count > 1);
    assert_eq!(service.indexed_chunks(&alice).await.unwrap(), receipt.chunk_count);

    let answer = service.ask(&alice, "When is the pomegranate harvest?").await.unwrap();
    assert!(answer.grounded);
    assert!(!answer.chunk_ids.is_empty());
    assert_eq!(answer.text, "generated answer");
    assert!(generator.last_prompt().contains("pomegranate harvest"));
    assert!(generator.last_prompt().contains("Question: When is the pomegranate harvest?"));

    let files = service.list_documents(&alice).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename, "orchard.txt");
    assert_eq!(files[0].content_type, ContentType::Text);
    assert_eq!(files[0].chunk_count, receipt.chunk_count);

    let history = service.list_history(&alice).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].question, "When is the pomegranate harvest?");
    assert_eq!(history[0].answer, "generated answer");
    assert_eq!(history[0].chunk_ids, answer.chunk_ids);
}

#[tokio::test]
async fn reingesting_identical_bytes_keeps_index_content() {
    let tmp = TempDir::new().unwrap();
    let service = sqlite_service(
        tmp.path(),
        Arc::new(HashEmbedder::new(64)),
        Arc::new(RecordingGenerator::default()),
        None,
    )
    .await;
    let alice = tenant("alice");

    let first = service
        .submit_document(&alice, text_upload("orchard.txt", ORCHARD))
        .await
        .unwrap();
    let after_first = service.indexed_chunks(&alice).await.unwrap();

    let second = service
        .submit_document(&alice, text_upload("orchard-copy.txt", ORCHARD))
        .await
        .unwrap();

    assert_ne!(first.document_id, second.document_id);
    assert_eq!(first.chunk_count, second.chunk_count);
    assert_eq!(service.indexed_chunks(&alice).await.unwrap(), after_first);
    assert_eq!(service.list_documents(&alice).await.unwrap().len(), 2);
}

#[tokio::test]
async fn asking_with_no_documents_is_ungrounded() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(RecordingGenerator::default());
    let service = sqlite_service(tmp.path(), Arc::new(HashEmbedder::new(64)), generator.clone(), None).await;
    let carol = tenant("carol");

    let answer = service.ask(&carol, "What grows in the orchard?").await.unwrap();
    assert!(!answer.grounded);
    assert!(answer.chunk_ids.is_empty());
    assert!(generator.last_prompt().contains("Context: (empty)"));
    assert_eq!(service.list_history(&carol).await.unwrap().len(), 1);
}

#[tokio::test]
async fn blank_question_is_rejected_and_not_recorded() {
    let tmp = TempDir::new().unwrap();
    let service = sqlite_service(
        tmp.path(),
        Arc::new(HashEmbedder::new(64)),
        Arc::new(RecordingGenerator::default()),
        None,
    )
    .await;
    let alice = tenant("alice");

    let err = service.ask(&alice, "   ").await.unwrap_err();
    assert_eq!(err, RagError::EmptyQuestion);
    assert!(service.list_history(&alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn tenants_never_see_each_others_documents() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(RecordingGenerator::default());
    let service = sqlite_service(tmp.path(), Arc::new(HashEmbedder::new(64)), generator.clone(), None).await;
    let alice = tenant("alice");
    let bob = tenant("bob");

    service
        .submit_document(&alice, text_upload("orchard.txt", ORCHARD))
        .await
        .unwrap();
    service
        .submit_document(&bob, text_upload("garage.txt", GARAGE))
        .await
        .unwrap();

    let answer = service.ask(&bob, "When is the pomegranate harvest?").await.unwrap();
    assert!(answer.grounded);
    let prompt = generator.last_prompt();
    assert!(!prompt.contains("orchard"));
    assert!(prompt.contains("garage") || prompt.contains("bench"));

    let bob_files: Vec<String> = service
        .list_documents(&bob)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.filename)
        .collect();
    assert_eq!(bob_files, vec!["garage.txt"]);
    assert_eq!(service.list_history(&alice).await.unwrap().len(), 0);
}

#[tokio::test]
async fn wrong_dimension_write_leaves_index_unchanged_and_faults_it() {
    let tmp = TempDir::new().unwrap();
    let alice = tenant("alice");

    let wide = sqlite_service(
        tmp.path(),
        Arc::new(HashEmbedder::new(16)),
        Arc::new(RecordingGenerator::default()),
        Some(8),
    )
    .await;
    let err = wide
        .submit_document(&alice, text_upload("orchard.txt", ORCHARD))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RagError::EmbeddingDimensionMismatch {
            expected: 8,
            actual: 16
        }
    );
    assert_eq!(wide.indexed_chunks(&alice).await.unwrap(), 0);
    assert!(wide.list_documents(&alice).await.unwrap().is_empty());

    // A correctly configured writer is still refused until the fault is cleared.
    let narrow = sqlite_service(
        tmp.path(),
        Arc::new(HashEmbedder::new(8)),
        Arc::new(RecordingGenerator::default()),
        None,
    )
    .await;
    let err = narrow
        .submit_document(&alice, text_upload("garage.txt", GARAGE))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmbeddingDimensionMismatch { .. }));

    narrow.clear_index_fault().await.unwrap();
    narrow
        .submit_document(&alice, text_upload("garage.txt", GARAGE))
        .await
        .unwrap();
    assert!(narrow.indexed_chunks(&alice).await.unwrap() > 0);
}

#[tokio::test]
async fn index_refuses_a_different_embedding_model() {
    let tmp = TempDir::new().unwrap();
    let config = common::test_config(tmp.path());
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();

    SqliteIndex::open(pool.clone(), "model-a", Some(4)).await.unwrap();
    let err = SqliteIndex::open(pool.clone(), "model-b", Some(4))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RagError::Storage(_)));

    let err = SqliteIndex::open(pool.clone(), "model-a", Some(5))
        .await
        .err()
        .unwrap();
    assert_eq!(
        err,
        RagError::EmbeddingDimensionMismatch {
            expected: 4,
            actual: 5
        }
    );

    let index = SqliteIndex::open(pool, "model-a", None).await.unwrap();
    assert_eq!(index.dims().await.unwrap(), Some(4));
    assert_eq!(index.fault().await.unwrap(), None);
    assert_eq!(index.total().await.unwrap(), 0);
}

#[tokio::test]
async fn oversized_and_unsupported_uploads_store_nothing() {
    let tmp = TempDir::new().unwrap();
    let service = sqlite_service(
        tmp.path(),
        Arc::new(HashEmbedder::new(64)),
        Arc::new(RecordingGenerator::default()),
        None,
    )
    .await;
    let alice = tenant("alice");

    let err = service
        .submit_document(&alice, text_upload("big.txt", &"a".repeat(5000)))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::PayloadTooLarge { size: 5000, limit: 4096 }));

    let err = service
        .submit_document(
            &alice,
            Upload {
                filename: "photo.png".into(),
                content_type: Some("image/png".into()),
                bytes: vec![0x89, b'P', b'N', b'G'],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::UnsupportedFormat(_)));

    let err = service
        .submit_document(&alice, text_upload("blank.txt", "   \n\n  "))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::CorruptDocument(_)));

    assert!(service.list_documents(&alice).await.unwrap().is_empty());
    assert_eq!(service.indexed_chunks(&alice).await.unwrap(), 0);
}

#[tokio::test]
async fn concurrent_uploads_for_one_tenant_all_land() {
    let tmp = TempDir::new().unwrap();
    let service = Arc::new(
        sqlite_service(
            tmp.path(),
            Arc::new(HashEmbedder::new(64)),
            Arc::new(RecordingGenerator::default()),
            None,
        )
        .await,
    );
    let alice = tenant("alice");

    let mut handles = Vec::new();
    for i in 0..4 {
        let service = service.clone();
        let alice = alice.clone();
        handles.push(tokio::spawn(async move {
            let text = format!("Note number {} for the shared notebook. {}", i, GARAGE);
            service
                .submit_document(&alice, text_upload(&format!("note-{}.txt", i), &text))
                .await
        }));
    }

    let mut expected = 0;
    for handle in handles {
        expected += handle.await.unwrap().unwrap().chunk_count;
    }
    assert_eq!(service.indexed_chunks(&alice).await.unwrap(), expected);
    assert_eq!(service.list_documents(&alice).await.unwrap().len(), 4);
}

#[tokio::test]
async fn pdf_pages_become_separate_segments() {
    let pdf = pdf_with_pages(&["first page phrase", "second page phrase"]);
    let segments = loader::load("doc-1", pdf, ContentType::Pdf).await.unwrap();

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].page, Some(1));
    assert_eq!(segments[1].page, Some(2));
    assert!(segments[0].text.contains("first page phrase"));
    assert!(segments[1].text.contains("second page phrase"));
}

#[tokio::test]
async fn pdf_upload_is_answerable() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(RecordingGenerator::default());
    let service = sqlite_service(tmp.path(), Arc::new(HashEmbedder::new(64)), generator.clone(), None).await;
    let alice = tenant("alice");

    let receipt = service
        .submit_document(
            &alice,
            Upload {
                filename: "manual.pdf".into(),
                content_type: None,
                bytes: pdf_with_pages(&["reset the router by holding the button"]),
            },
        )
        .await
        .unwrap();
    assert_eq!(receipt.chunk_count, 1);

    let answer = service.ask(&alice, "how do I reset the router").await.unwrap();
    assert!(answer.grounded);
    assert!(generator.last_prompt().contains("holding the button"));
    assert_eq!(
        service.list_documents(&alice).await.unwrap()[0].content_type,
        ContentType::Pdf
    );
}

#[tokio::test]
async fn deleting_a_document_removes_only_its_records() {
    let tmp = TempDir::new().unwrap();
    let config = common::test_config(tmp.path());
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();

    let service = sqlite_service(
        tmp.path(),
        Arc::new(HashEmbedder::new(64)),
        Arc::new(RecordingGenerator::default()),
        None,
    )
    .await;
    let alice = tenant("alice");
    let orchard = service
        .submit_document(&alice, text_upload("orchard.txt", ORCHARD))
        .await
        .unwrap();
    let garage = service
        .submit_document(&alice, text_upload("garage.txt", GARAGE))
        .await
        .unwrap();

    let index = SqliteIndex::open(pool, "hash", None).await.unwrap();
    assert_eq!(index.delete_document(&tenant("bob"), &orchard.document_id).await.unwrap(), 0);
    assert_eq!(
        index.delete_document(&alice, &orchard.document_id).await.unwrap(),
        orchard.chunk_count
    );
    assert_eq!(index.count(&alice).await.unwrap(), garage.chunk_count);
}

#[tokio::test]
async fn chunk_text_query_returns_that_chunk() {
    let tmp = TempDir::new().unwrap();
    let config = common::test_config(tmp.path());
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    let index = SqliteIndex::open(pool, "hash", None).await.unwrap();
    let embedder = HashEmbedder::new(64);
    let alice = tenant("alice");

    let mut all = Vec::new();
    for (doc, text) in [("orchard", ORCHARD), ("garage", GARAGE)] {
        let segments = vec![TextSegment {
            document_id: doc.into(),
            sequence: 0,
            text: text.into(),
            page: None,
        }];
        let chunks = chunk::split(&alice, doc, &format!("{}-digest", doc), &segments, 120, 20).unwrap();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await.unwrap();
        index.write(&alice, &chunks, &vectors).await.unwrap();
        all.extend(chunks.into_iter().zip(vectors));
    }
    assert!(all.len() > 4);

    for (chunk, vector) in &all {
        let hits = index.query(&alice, vector, 2).await.unwrap();
        assert!(
            hits.iter().any(|h| h.chunk.id == chunk.id),
            "chunk {} at position {} not retrieved by its own text",
            chunk.document_id,
            chunk.position
        );
        assert_eq!(hits[0].chunk.text, chunk.text);
    }
}

#[tokio::test]
async fn dimension_mismatch_survives_a_failed_fault_latch() {
    let tmp = TempDir::new().unwrap();
    let config = common::test_config(tmp.path());
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    sqlx::query(
        r#"
        CREATE TRIGGER refuse_fault BEFORE INSERT ON index_meta
        WHEN NEW.key LIKE 'fault_%'
        BEGIN SELECT RAISE(ABORT, 'index_meta is read-only'); END
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let index = SqliteIndex::open(pool, "hash", Some(2)).await.unwrap();
    let alice = tenant("alice");
    let segments = vec![TextSegment {
        document_id: "d".into(),
        sequence: 0,
        text: "short".into(),
        page: None,
    }];
    let chunks = chunk::split(&alice, "d", "d-digest", &segments, 120, 20).unwrap();

    let err = index.write(&alice, &chunks, &[vec![1.0, 0.0, 0.0]]).await.unwrap_err();
    assert_eq!(err, RagError::EmbeddingDimensionMismatch { expected: 2, actual: 3 });

    let err = index.query(&alice, &[1.0, 0.0, 0.0], 4).await.unwrap_err();
    assert_eq!(err, RagError::EmbeddingDimensionMismatch { expected: 2, actual: 3 });
    assert_eq!(index.count(&alice).await.unwrap(), 0);
}
