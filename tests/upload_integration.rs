//! Integration tests for the upload flow against a mock backend and storage.

mod support;

use std::fs::File;

use serde_json::json;
use tempfile::TempDir;
use transfer_core::api::ProductMetadata;
use transfer_core::transfer::{
    FailureKind, MAX_UPLOAD_BYTES, Phase, PhaseOutcome, TransferError, TransferState, UploadMode,
    UploadRequest, ValidationError,
};
use wiremock::matchers::{any, body_bytes, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{FakeRenderer, PREVIEW_BYTES, Recorder, USER_ID, auth, builder, write_file};

const PDF_CONTENT: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n";

/// Mounts `generate-upload-url` returning a slot that points at `/storage/{key}`.
async fn mount_slot(server: &MockServer, product_id: &str, object_key: &str) {
    Mock::given(method("POST"))
        .and(path("/api/generate-upload-url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_url": format!("{}/storage/{object_key}?sig=1", server.uri()),
            "object_key": object_key,
            "product_id": product_id,
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_storage(server: &MockServer, object_key: &str, status: u16, expected: u64) {
    Mock::given(method("PUT"))
        .and(path(format!("/storage/{object_key}")))
        .respond_with(ResponseTemplate::new(status).set_body_string("storage says no"))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pdf_upload_sends_preview_payload_and_completion() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "guide.pdf", PDF_CONTENT);

    Mock::given(method("POST"))
        .and(path("/api/generate-upload-url"))
        .and(body_partial_json(json!({
            "file_name": "guide.pdf",
            "file_type": "application/pdf",
            "user_id": USER_ID,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_url": format!("{}/storage/uploads/7/guide.pdf?sig=1", server.uri()),
            "object_key": "uploads/7/guide.pdf",
            "product_id": "TBF-42",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/get-upload-url-for-path"))
        .and(body_partial_json(json!({
            "object_key": "products/7/TBF-42/preview.png",
            "content_type": "image/png",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_url": format!("{}/storage/preview?sig=2", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/storage/preview"))
        .and(header("content-type", "image/png"))
        .and(body_bytes(PREVIEW_BYTES.to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/storage/uploads/7/guide.pdf"))
        .and(header("content-type", "application/pdf"))
        .and(body_bytes(PDF_CONTENT.to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload-complete"))
        .and(body_partial_json(json!({
            "object_key": "uploads/7/guide.pdf",
            "file_name": "guide.pdf",
            "file_size": PDF_CONTENT.len(),
            "user_id": USER_ID,
            "preview_url": "https://cdn.example.com/bucket/products/7/TBF-42/preview.png",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "b2_url": "https://cdn.example.com/bucket/uploads/7/guide.pdf",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let recorder = Recorder::new();
    let client = builder(&server, &recorder, FakeRenderer::working())
        .preview_public_base_url(Some("https://cdn.example.com/bucket/".to_string()))
        .build();

    let receipt = client
        .upload(&UploadRequest::new(&file), &auth())
        .await
        .unwrap();

    assert_eq!(receipt.product_id, "TBF-42");
    assert_eq!(receipt.object_key, "uploads/7/guide.pdf");
    assert_eq!(receipt.file_size, PDF_CONTENT.len() as u64);
    assert_eq!(
        receipt.remote_ref,
        "https://cdn.example.com/bucket/uploads/7/guide.pdf"
    );

    assert_eq!(
        recorder.states(),
        vec![
            TransferState::Preparing,
            TransferState::Transferring,
            TransferState::Succeeded
        ]
    );
    let phases: Vec<Phase> = recorder.events().iter().map(|e| e.phase).collect();
    assert_eq!(
        phases,
        vec![
            Phase::Validate,
            Phase::RequestSlot,
            Phase::Preview,
            Phase::Payload,
            Phase::Complete
        ]
    );
    assert_eq!(recorder.outcome_of(Phase::Preview), Some(PhaseOutcome::Ok));

    let progress = recorder.progress();
    assert_eq!(progress.first().unwrap().percent, Some(0));
    let last = progress.last().unwrap();
    assert_eq!(last.bytes_transferred, PDF_CONTENT.len() as u64);
    assert_eq!(last.percent, Some(100));
}

#[tokio::test]
async fn test_zero_byte_upload_succeeds_with_object_key_reference() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "empty.zip", b"");

    mount_slot(&server, "TBF-1", "uploads/7/empty.zip").await;
    mount_storage(&server, "uploads/7/empty.zip", 200, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/upload-complete"))
        .and(body_partial_json(json!({ "file_size": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let recorder = Recorder::new();
    let client = builder(&server, &recorder, FakeRenderer::working()).build();
    let receipt = client
        .upload(&UploadRequest::new(&file), &auth())
        .await
        .unwrap();

    assert_eq!(receipt.file_size, 0);
    assert_eq!(receipt.remote_ref, "uploads/7/empty.zip");
    assert_eq!(receipt.preview_url, None);
    assert_eq!(recorder.outcome_of(Phase::Preview), Some(PhaseOutcome::Skipped));
}

#[tokio::test]
async fn test_numeric_product_id_names_the_preview_path() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "guide.pdf", PDF_CONTENT);

    Mock::given(method("POST"))
        .and(path("/api/generate-upload-url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_url": format!("{}/storage/uploads/7/guide.pdf?sig=1", server.uri()),
            "object_key": "uploads/7/guide.pdf",
            "product_id": 42,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/get-upload-url-for-path"))
        .and(body_partial_json(json!({ "object_key": "products/7/42/preview.png" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_url": format!("{}/storage/preview?sig=2", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_storage(&server, "preview", 200, 1).await;
    mount_storage(&server, "uploads/7/guide.pdf", 200, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/upload-complete"))
        .and(body_partial_json(json!({ "preview_url": "products/7/42/preview.png" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let recorder = Recorder::new();
    let client = builder(&server, &recorder, FakeRenderer::working()).build();
    let receipt = client
        .upload(&UploadRequest::new(&file), &auth())
        .await
        .unwrap();

    assert_eq!(receipt.product_id, "42");
    assert_eq!(receipt.preview_url.as_deref(), Some("products/7/42/preview.png"));
    assert_eq!(recorder.outcome_of(Phase::Preview), Some(PhaseOutcome::Ok));
}

#[tokio::test]
async fn test_missing_upload_url_fails_before_preview_or_storage() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "guide.pdf", PDF_CONTENT);

    Mock::given(method("POST"))
        .and(path("/api/generate-upload-url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_url": null,
            "object_key": "uploads/7/guide.pdf",
            "product_id": "TBF-42",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/get-upload-url-for-path"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let recorder = Recorder::new();
    let client = builder(&server, &recorder, FakeRenderer::working()).build();
    let error = client
        .upload(&UploadRequest::new(&file), &auth())
        .await
        .unwrap_err();

    assert!(matches!(error, TransferError::Contract { .. }), "{error:?}");
    assert!(error.to_string().contains("missing upload URL"), "{error}");
    assert_eq!(
        recorder.states(),
        vec![TransferState::Preparing, TransferState::Failed]
    );
}

#[tokio::test]
async fn test_oversize_file_rejected_without_network() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let big = dir.path().join("huge.zip");
    File::create(&big)
        .unwrap()
        .set_len(MAX_UPLOAD_BYTES + 1)
        .unwrap();

    let recorder = Recorder::new();
    let client = builder(&server, &recorder, FakeRenderer::working()).build();
    let error = client
        .upload(&UploadRequest::new(&big), &auth())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        TransferError::LocalValidation(ValidationError::FileTooLarge { .. })
    ));
    assert_eq!(error.kind(), FailureKind::LocalValidation);
    assert!(!recorder.states().contains(&TransferState::Preparing));
    assert_eq!(recorder.states().last(), Some(&TransferState::Failed));
}

#[tokio::test]
async fn test_invalid_pdf_rejected_without_network() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "fake.pdf", b"PK\x03\x04 not a pdf");

    let recorder = Recorder::new();
    let client = builder(&server, &recorder, FakeRenderer::working()).build();
    let error = client
        .upload(&UploadRequest::new(&file), &auth())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        TransferError::LocalValidation(ValidationError::InvalidPdf { .. })
    ));
    assert_eq!(
        recorder.outcome_of(Phase::Validate),
        Some(PhaseOutcome::Failed(FailureKind::LocalValidation))
    );
}

#[tokio::test]
async fn test_completion_failure_is_partial_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "pack.zip", b"PK\x03\x04 payload");

    mount_slot(&server, "TBF-42", "uploads/7/pack.zip").await;
    mount_storage(&server, "uploads/7/pack.zip", 200, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/upload-complete"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "detail": "db down" })))
        .expect(1)
        .mount(&server)
        .await;

    let recorder = Recorder::new();
    let client = builder(&server, &recorder, FakeRenderer::working()).build();
    let error = client
        .upload(&UploadRequest::new(&file), &auth())
        .await
        .unwrap_err();

    match &error {
        TransferError::PartialFailure { object_key, source } => {
            assert_eq!(object_key, "uploads/7/pack.zip");
            assert!(matches!(
                source.as_ref(),
                TransferError::Server { status: 500, .. }
            ));
        }
        other => panic!("expected partial failure, got {other:?}"),
    }
    assert_eq!(error.kind(), FailureKind::PartialFailure);
    assert!(error.to_string().contains("db down"), "{error}");
}

#[tokio::test]
async fn test_native_api_upload_sends_storage_headers() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "pack.zip", b"PK\x03\x04 payload");

    Mock::given(method("POST"))
        .and(path("/api/generate-upload-url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_url": format!("{}/b2api/upload", server.uri()),
            "object_key": "uploads/7/pack.zip",
            "product_id": "TBF-42",
            "authorization_token": "tok-1",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/b2api/upload"))
        .and(header("authorization", "tok-1"))
        .and(header("x-bz-file-name", "uploads%2F7%2Fpack.zip"))
        .and(header("x-bz-content-sha1", "do_not_verify"))
        .and(header("content-type", "application/zip"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload-complete"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let recorder = Recorder::new();
    let client = builder(&server, &recorder, FakeRenderer::working())
        .upload_mode(UploadMode::NativeApi)
        .build();
    assert_eq!(client.upload_mode(), UploadMode::NativeApi);

    let receipt = client
        .upload(&UploadRequest::new(&file), &auth())
        .await
        .unwrap();
    assert_eq!(receipt.remote_ref, "uploads/7/pack.zip");
}

#[tokio::test]
async fn test_storage_rejection_is_reported_and_not_completed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "pack.zip", b"PK\x03\x04 payload");

    mount_slot(&server, "TBF-42", "uploads/7/pack.zip").await;
    mount_storage(&server, "uploads/7/pack.zip", 403, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/log-client-error"))
        .and(body_partial_json(json!({
            "error_type": "upload_http_error",
            "user_id": USER_ID,
            "details": {
                "status": 403,
                "detail": "storage says no",
                "object_key": "uploads/7/pack.zip",
                "product_id": "TBF-42",
                "file_name": "pack.zip",
            },
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload-complete"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let recorder = Recorder::new();
    let client = builder(&server, &recorder, FakeRenderer::working()).build();
    let error = client
        .upload(&UploadRequest::new(&file), &auth())
        .await
        .unwrap_err();

    assert!(
        matches!(error, TransferError::Server { status: 403, .. }),
        "{error:?}"
    );
    assert_eq!(
        recorder.outcome_of(Phase::Payload),
        Some(PhaseOutcome::Failed(FailureKind::Server))
    );
}

#[tokio::test]
async fn test_preview_failure_still_uploads() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "guide.pdf", PDF_CONTENT);

    mount_slot(&server, "TBF-42", "uploads/7/guide.pdf").await;
    mount_storage(&server, "uploads/7/guide.pdf", 200, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/get-upload-url-for-path"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload-complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let recorder = Recorder::new();
    let client = builder(&server, &recorder, FakeRenderer::failing()).build();
    let receipt = client
        .upload(&UploadRequest::new(&file), &auth())
        .await
        .unwrap();

    assert_eq!(receipt.preview_url, None);
    assert!(matches!(
        recorder.outcome_of(Phase::Preview),
        Some(PhaseOutcome::Degraded(_))
    ));
    assert_eq!(recorder.states().last(), Some(&TransferState::Succeeded));
}

#[tokio::test]
async fn test_import_sends_metadata_to_import_complete() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let file = write_file(dir.path(), "course.zip", b"PK\x03\x04 course");

    mount_slot(&server, "TBF-9", "uploads/7/course.zip").await;
    mount_storage(&server, "uploads/7/course.zip", 200, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/import-complete"))
        .and(body_partial_json(json!({
            "object_key": "uploads/7/course.zip",
            "product_metadata": {
                "title": "Course",
                "price": 19.5,
                "category": "Education",
                "imported_from": "gumroad",
            },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload-complete"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let metadata = ProductMetadata {
        title: "Course".into(),
        price: Some(19.5),
        category: Some("Education".into()),
        imported_from: Some("gumroad".into()),
        ..ProductMetadata::default()
    };
    let recorder = Recorder::new();
    let client = builder(&server, &recorder, FakeRenderer::working()).build();
    let receipt = client
        .upload(&UploadRequest::new(&file).with_metadata(metadata), &auth())
        .await
        .unwrap();

    assert_eq!(receipt.product_id, "TBF-9");
}
