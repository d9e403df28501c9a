//! End-to-end batches over HTTP

use sourcebridge_core::domain::{BatchSummary, IngestError, UploadStage};
use sourcebridge_pipeline::BatchRequest;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{fixture, mount_downloads, mount_indexing_ok, mount_storage_ok, remote_file};

fn three_files() -> Vec<sourcebridge_core::domain::RemoteFile> {
    vec![
        remote_file("id:1", "one.pdf"),
        remote_file("id:2", "two.pdf"),
        remote_file("id:3", "three.pdf"),
    ]
}

#[tokio::test]
async fn test_storage_error_on_second_file_is_isolated() {
    let f = fixture(true).await;
    mount_downloads(&f.dropbox).await;
    Mock::given(method("POST"))
        .and(path("/api/upload-to-gcs"))
        .and(body_string_contains("filename=\"two.pdf\""))
        .respond_with(ResponseTemplate::new(500).set_body_string("disk on fire"))
        .with_priority(1)
        .mount(&f.backend)
        .await;
    mount_storage_ok(&f.backend).await;
    mount_indexing_ok(&f.backend).await;

    let result = f
        .orchestrator
        .run(
            BatchRequest::new("alice", "chat-7", three_files()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.summary(), BatchSummary::Partial { succeeded: 2, failed: 1 });
    assert_eq!(result.failed[0].file_name, "two.pdf");
    assert!(result.failed[0].error_message.contains("disk on fire"));

    let names: Vec<_> = result.succeeded.iter().map(|o| o.file_name.as_str()).collect();
    assert_eq!(names, vec!["one.pdf", "three.pdf"]);
    assert_eq!(result.succeeded[0].stored_url, "gs://bucket/object");

    let snapshot = f.orchestrator.progress().snapshot();
    assert!(matches!(snapshot.tasks[1].stage(), UploadStage::Error(_)));
    assert!(snapshot.tasks[2].stage().is_success());

    // Indexing was only asked about the files that were stored
    let indexing_calls = f
        .backend
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/api/upload-gcs-to-rag")
        .count();
    assert_eq!(indexing_calls, 2);
}

#[tokio::test]
async fn test_downloads_use_live_credential() {
    let f = fixture(true).await;
    Mock::given(method("POST"))
        .and(path("/files/download"))
        .and(header("Authorization", "Bearer live-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
        .expect(1)
        .mount(&f.dropbox)
        .await;
    mount_storage_ok(&f.backend).await;
    mount_indexing_ok(&f.backend).await;

    let result = f
        .orchestrator
        .run(
            BatchRequest::new("alice", "chat-7", vec![remote_file("id:1", "one.pdf")]),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.summary(), BatchSummary::AllSucceeded { succeeded: 1 });
}

#[tokio::test]
async fn test_missing_credential_makes_no_requests() {
    let f = fixture(false).await;

    let err = f
        .orchestrator
        .run(
            BatchRequest::new("alice", "chat-7", three_files()),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err, IngestError::NotConnected("Dropbox".into()));
    assert!(f.dropbox.received_requests().await.unwrap().is_empty());
    assert!(f.backend.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_every_download_refused() {
    let f = fixture(true).await;
    Mock::given(method("POST"))
        .and(path("/files/download"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&f.dropbox)
        .await;

    let err = f
        .orchestrator
        .run(
            BatchRequest::new("alice", "chat-7", three_files()),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        IngestError::AllFailed {
            files: vec!["one.pdf".into(), "two.pdf".into(), "three.pdf".into()]
        }
    );
    assert!(f.backend.received_requests().await.unwrap().is_empty());
    let snapshot = f.orchestrator.progress().snapshot();
    assert!(snapshot
        .tasks
        .iter()
        .all(|t| t.error().is_some_and(|e| e.contains("Access denied"))));
}

#[tokio::test]
async fn test_cancel_while_indexing_is_slow() {
    let f = fixture(true).await;
    mount_downloads(&f.dropbox).await;
    mount_storage_ok(&f.backend).await;
    Mock::given(method("POST"))
        .and(path("/api/upload-gcs-to-rag"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"success": true}))
                .set_delay(std::time::Duration::from_secs(30)),
        )
        .mount(&f.backend)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let mut rx = f.orchestrator.progress().subscribe();
    tokio::spawn(async move {
        // Cancel once the first file waits on indexing
        while rx.changed().await.is_ok() {
            let processing = rx
                .borrow_and_update()
                .tasks
                .first()
                .is_some_and(|t| *t.stage() == UploadStage::Processing);
            if processing {
                trigger.cancel();
                break;
            }
        }
    });

    let result = f
        .orchestrator
        .run(BatchRequest::new("alice", "chat-7", three_files()), cancel)
        .await
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.total(), 3);
    assert!(result.succeeded.is_empty());
    let snapshot = f.orchestrator.progress().snapshot();
    assert!(snapshot
        .tasks
        .iter()
        .all(|t| *t.stage() == UploadStage::Cancelled));
}
