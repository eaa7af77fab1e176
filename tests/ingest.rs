mod common;

use std::path::PathBuf;
use std::sync::Arc;

use common::{fake_pdf, minimal_pdf, open_vault, stored_files, write_file};
use perdocman::allocate::is_managed_name;
use perdocman::digest::{digest_file, is_digest};
use perdocman::session::{Operator, SessionTracker};
use perdocman::{Classification, VaultError};
use tempfile::TempDir;

#[tokio::test]
async fn test_ingest_stores_identical_copy_with_matching_digest() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    let bytes = fake_pdf("copy");
    let source = write_file(tmp.path(), "report.pdf", &bytes);

    let doc = vault.ingest(&source, Classification::default()).await.unwrap();
    let fetched = vault.store().get_document(doc.id).await.unwrap();

    let stored = PathBuf::from(&fetched.stored_path);
    assert!(stored.starts_with(&vault.paths().documents_dir));
    assert_eq!(std::fs::read(&stored).unwrap(), bytes);
    assert_eq!(fetched.sha256, digest_file(&stored).await.unwrap());
    assert_eq!(fetched.original_filename, "report.pdf");

    let name = stored.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("report__"), "unexpected name {name}");
    assert!(is_managed_name(name));

    // The source is never modified or moved.
    assert_eq!(std::fs::read(&source).unwrap(), bytes);
}

#[tokio::test]
async fn test_statement_classification_round_trips() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    let source = write_file(tmp.path(), "statement.pdf", &fake_pdf("statement"));

    let classification = Classification {
        category: Some("finance".into()),
        tags: Some("bank,statement".into()),
        doc_date: Some("2026-02-01".into()),
    };
    let doc = vault.ingest(&source, classification).await.unwrap();
    let fetched = vault.store().get_document(doc.id).await.unwrap();

    assert_eq!(fetched.category.as_deref(), Some("finance"));
    assert_eq!(fetched.tags.as_deref(), Some("bank,statement"));
    assert_eq!(fetched.doc_date.as_deref(), Some("2026-02-01"));
    assert_eq!(fetched.sha256.len(), 64);
    assert!(is_digest(&fetched.sha256));
}

#[tokio::test]
async fn test_duplicate_content_leaves_no_new_file_or_row() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    let bytes = fake_pdf("same bytes");
    let first_src = write_file(tmp.path(), "first.pdf", &bytes);
    let second_src = write_file(tmp.path(), "renamed copy.pdf", &bytes);

    let first = vault.ingest(&first_src, Classification::default()).await.unwrap();
    let err = vault
        .ingest(&second_src, Classification::default())
        .await
        .unwrap_err();

    match err {
        VaultError::DuplicateContent { existing_id } => assert_eq!(existing_id, first.id),
        other => panic!("expected DuplicateContent, got {other:?}"),
    }
    assert_eq!(vault.store().count_documents().await.unwrap(), 1);
    assert_eq!(stored_files(&vault).len(), 1);
}

#[tokio::test]
async fn test_missing_source_touches_nothing() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    let missing = tmp.path().join("nope.pdf");

    let err = vault
        .ingest(&missing, Classification::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::SourceNotFound(ref p) if p == &missing));
    assert_eq!(vault.store().count_documents().await.unwrap(), 0);
    assert!(stored_files(&vault).is_empty());
}

#[tokio::test]
async fn test_directory_source_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    let dir = tmp.path().join("folder.pdf");
    std::fs::create_dir(&dir).unwrap();

    let err = vault.ingest(&dir, Classification::default()).await.unwrap_err();
    assert!(matches!(err, VaultError::SourceNotFound(_)));
}

#[tokio::test]
async fn test_unsupported_type_touches_nothing() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    let source = write_file(tmp.path(), "notes.txt", b"plain text");

    let err = vault
        .ingest(&source, Classification::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::UnsupportedType { ref name } if name == "notes.txt"));
    assert_eq!(vault.store().count_documents().await.unwrap(), 0);
    assert!(stored_files(&vault).is_empty());
}

#[tokio::test]
async fn test_upper_case_extension_is_accepted() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    let source = write_file(tmp.path(), "SCAN.PDF", &fake_pdf("upper"));

    let doc = vault.ingest(&source, Classification::default()).await.unwrap();
    assert!(doc.stored_path.ends_with(".pdf"));
}

#[tokio::test]
async fn test_reader_ingestion_keeps_only_the_base_name() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    let mut reader = std::io::Cursor::new(fake_pdf("upload"));

    let doc = vault
        .ingest_reader(&mut reader, "../../outside/evil.pdf", Classification::default())
        .await
        .unwrap();

    assert_eq!(doc.original_filename, "evil.pdf");
    assert!(PathBuf::from(&doc.stored_path).starts_with(&vault.paths().documents_dir));
    assert!(!tmp.path().join("outside").exists());
}

#[tokio::test]
async fn test_reset_empties_vault_and_keeps_it_usable() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    let a = write_file(tmp.path(), "a.pdf", &fake_pdf("a"));
    let b = write_file(tmp.path(), "b.pdf", &fake_pdf("b"));
    vault.ingest(&a, Classification::default()).await.unwrap();
    vault.ingest(&b, Classification::default()).await.unwrap();

    // Files the allocator did not name are left alone.
    let foreign = write_file(&vault.paths().documents_dir, "README.txt", b"keep");

    let report = vault.reset().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.removed.len(), 2);
    assert_eq!(report.documents_deleted, 2);
    for path in &report.removed {
        assert!(!path.exists());
    }
    assert!(foreign.exists());
    assert_eq!(vault.store().count_documents().await.unwrap(), 0);

    // Same content can come back after a reset.
    let again = vault.ingest(&a, Classification::default()).await.unwrap();
    assert_eq!(vault.store().get_document(again.id).await.unwrap().id, again.id);
}

#[tokio::test]
async fn test_reset_on_empty_vault_is_a_no_op() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;

    let report = vault.reset().await.unwrap();
    assert!(report.removed.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.documents_deleted, 0);
}

#[tokio::test]
async fn test_vault_recovers_when_storage_dir_disappears() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    std::fs::remove_dir_all(&vault.paths().documents_dir).unwrap();

    let source = write_file(tmp.path(), "late.pdf", &fake_pdf("late"));
    let doc = vault.ingest(&source, Classification::default()).await.unwrap();
    assert!(PathBuf::from(doc.stored_path).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_ingestion_keeps_exactly_one() {
    let tmp = TempDir::new().unwrap();
    let vault = Arc::new(open_vault(&tmp).await);
    let bytes = fake_pdf("raced");

    let mut handles = Vec::new();
    for i in 0..6 {
        let source = write_file(tmp.path(), &format!("copy-{i}.pdf"), &bytes);
        let vault = vault.clone();
        handles.push(tokio::spawn(async move {
            vault.ingest(&source, Classification::default()).await
        }));
    }

    let mut ok = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(VaultError::DuplicateContent { .. }) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(duplicates, 5);
    assert_eq!(vault.store().count_documents().await.unwrap(), 1);
    assert_eq!(stored_files(&vault).len(), 1);
}

#[tokio::test]
async fn test_text_pdf_preview_carries_page_text() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    let source = write_file(tmp.path(), "memo.pdf", &minimal_pdf("Quarterly memo"));

    let doc = vault.ingest(&source, Classification::default()).await.unwrap();
    // pdf-extract is lenient but not guaranteed to lay out hand-built
    // pages; whatever it returns must come from the page.
    if let Some(preview) = &doc.preview {
        assert!(preview.contains("Quarterly"), "preview was {preview:?}");
        assert!(!preview.contains('\n'));
    }
    let stored = vault.store().get_document(doc.id).await.unwrap();
    assert_eq!(stored.preview, doc.preview);
}

#[tokio::test]
async fn test_unreadable_pdf_is_stored_without_preview() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    let source = write_file(tmp.path(), "broken.pdf", &fake_pdf("broken"));

    let doc = vault.ingest(&source, Classification::default()).await.unwrap();
    assert!(doc.preview.is_none());
    assert!(vault.preview_failures() >= 1);
    assert_eq!(vault.store().count_documents().await.unwrap(), 1);
}

#[tokio::test]
async fn test_batch_ingestion_reports_each_outcome() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    let inbox = tmp.path().join("inbox");
    std::fs::create_dir(&inbox).unwrap();
    write_file(&inbox, "a.pdf", &fake_pdf("a"));
    write_file(&inbox, "b.pdf", &fake_pdf("a"));
    write_file(&inbox, "skipped.txt", b"not collected from directories");
    let missing = tmp.path().join("missing.pdf");

    let report = vault
        .ingest_paths(&[inbox, missing.clone()], &Classification::default())
        .await;

    assert_eq!(report.ingested.len(), 1);
    assert_eq!(report.duplicates.len(), 1);
    assert_eq!(report.duplicates[0].1, report.ingested[0].id);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, missing);
    assert!(matches!(report.failed[0].1, VaultError::SourceNotFound(_)));
}

#[tokio::test]
async fn test_session_bracket_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let vault = open_vault(&tmp).await;
    let tracker = SessionTracker::new(vault.store().clone(), Operator::new("ana", "desk"));

    let id = tracker
        .begin(&vault.paths().root, Some("integration"))
        .await
        .unwrap();
    tracker.end(&id).await.unwrap();
    let closed = vault.store().get_session(&id).await.unwrap().unwrap();
    assert!(closed.ended_at.is_some());

    tracker.end(&id).await.unwrap();
    let again = vault.store().get_session(&id).await.unwrap().unwrap();
    assert_eq!(again.ended_at, closed.ended_at);
    assert_eq!(again.username, "ana");
    assert_eq!(again.hostname, "desk");
}
