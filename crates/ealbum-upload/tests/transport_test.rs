//! HTTP transports against a mock backend and storage.

mod helpers;

use ealbum_api_client::{ApiClient, NoCredentials};
use ealbum_core::{CleanupState, FileId, MediaFile, ProgressPolicy};
use ealbum_upload::{
    AutoTransport, BatchContext, ChunkedTransport, DirectPutTransport, MultipartFormTransport,
    ProgressHandle, RetryPolicy, UploadTransport,
};
use helpers::media;
use mockito::{Matcher, Server};
use serde_json::json;
use std::io::Write;
use std::num::NonZeroU64;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PIN: &str = "AB12CD";
const CATEGORY: &str = "Ceremony";

fn api(server: &Server) -> ApiClient {
    ApiClient::new(
        server.url(),
        "/api/v1",
        Arc::new(NoCredentials),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn text_file(name: &str, body: &str) -> MediaFile {
    MediaFile::in_memory(name, None, bytes::Bytes::from(body.to_string()))
}

fn ids(files: &[MediaFile]) -> Vec<FileId> {
    files
        .iter()
        .enumerate()
        .map(|(i, f)| FileId::new(CATEGORY, &f.name, i))
        .collect()
}

fn progress_for(files: &[MediaFile], ids: &[FileId]) -> ProgressHandle {
    let progress = ProgressHandle::new(ProgressPolicy::Bytes);
    for (file, id) in files.iter().zip(ids) {
        progress.register(id.clone(), CATEGORY, file.size);
    }
    progress
}

fn ctx<'a>(ids: &'a [FileId]) -> BatchContext<'a> {
    BatchContext {
        album_pin: PIN,
        category: CATEGORY,
        file_ids: ids,
        batch_index: 0,
    }
}

fn nz(n: u64) -> NonZeroU64 {
    NonZeroU64::new(n).unwrap()
}

#[tokio::test]
async fn test_direct_put_uploads_each_file() {
    let mut server = Server::new_async().await;
    let presign = server
        .mock("POST", "/api/v1/uploads/presign")
        .match_body(Matcher::PartialJson(json!({
            "fileName": "a.jpg",
            "contentType": "image/jpeg",
            "fileSize": 5,
            "albumPin": PIN,
            "category": CATEGORY
        })))
        .with_body(json!({"url": format!("{}/bucket/a.jpg", server.url()), "key": "albums/AB12CD/a.jpg"}).to_string())
        .create_async()
        .await;
    let put = server
        .mock("PUT", "/bucket/a.jpg")
        .match_header("content-type", "image/jpeg")
        .match_body("hello")
        .with_status(200)
        .create_async()
        .await;

    let files = vec![text_file("a.jpg", "hello")];
    let ids = ids(&files);
    let progress = progress_for(&files, &ids);
    let transport = DirectPutTransport::new(api(&server), RetryPolicy::none());

    let keys = transport
        .upload_batch(&ctx(&ids), &files, &progress)
        .await
        .unwrap();

    presign.assert_async().await;
    put.assert_async().await;
    assert_eq!(keys, vec!["albums/AB12CD/a.jpg"]);
    assert_eq!(progress.snapshot().overall_percent, 100);
}

#[tokio::test]
async fn test_direct_put_retries_server_errors() {
    let mut server = Server::new_async().await;
    let _presign = server
        .mock("POST", "/api/v1/uploads/presign")
        .with_body(json!({"url": format!("{}/bucket/a.jpg", server.url()), "key": "k"}).to_string())
        .create_async()
        .await;
    let put = server
        .mock("PUT", "/bucket/a.jpg")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let files = vec![text_file("a.jpg", "hello")];
    let ids = ids(&files);
    let progress = progress_for(&files, &ids);
    let transport = DirectPutTransport::new(
        api(&server),
        RetryPolicy::new(2, Duration::from_millis(1)),
    );

    let err = transport
        .upload_batch(&ctx(&ids), &files, &progress)
        .await
        .unwrap_err();

    put.assert_async().await;
    assert_eq!(err.status, Some(503));
    assert_eq!(err.files, vec!["a.jpg"]);
    assert!(progress.snapshot().overall_percent < 100);
}

#[tokio::test]
async fn test_direct_put_does_not_retry_client_errors() {
    let mut server = Server::new_async().await;
    let _presign = server
        .mock("POST", "/api/v1/uploads/presign")
        .with_body(json!({"url": format!("{}/bucket/a.jpg", server.url()), "key": "k"}).to_string())
        .create_async()
        .await;
    let put = server
        .mock("PUT", "/bucket/a.jpg")
        .with_status(403)
        .with_body("Request has expired")
        .expect(1)
        .create_async()
        .await;

    let files = vec![text_file("a.jpg", "hello")];
    let ids = ids(&files);
    let progress = progress_for(&files, &ids);
    let transport = DirectPutTransport::new(
        api(&server),
        RetryPolicy::new(3, Duration::from_millis(1)),
    );

    let err = transport
        .upload_batch(&ctx(&ids), &files, &progress)
        .await
        .unwrap_err();

    put.assert_async().await;
    assert_eq!(err.status, Some(403));
    assert_eq!(err.message, "Request has expired");
    assert_eq!(err.cleanup, CleanupState::NotRequired);
}

#[tokio::test]
async fn test_form_zips_links_by_position() {
    let mut server = Server::new_async().await;
    let ingest = server
        .mock("POST", "/api/v1/files/bulk-upload")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("name=\"albumPin\"".to_string()),
            Matcher::Regex("AB12CD".to_string()),
            Matcher::Regex("name=\"categoryName\"".to_string()),
            Matcher::Regex("filename=\"a.jpg\"".to_string()),
            Matcher::Regex("filename=\"b.png\"".to_string()),
        ]))
        .with_body(r#"{"fileLinks":["https://cdn/a.jpg","https://cdn/b.png"]}"#)
        .create_async()
        .await;

    let files = vec![text_file("a.jpg", "first"), text_file("b.png", "second")];
    let ids = ids(&files);
    let progress = progress_for(&files, &ids);
    let transport = MultipartFormTransport::new(api(&server));

    let keys = transport
        .upload_batch(&ctx(&ids), &files, &progress)
        .await
        .unwrap();

    ingest.assert_async().await;
    assert_eq!(keys, vec!["https://cdn/a.jpg", "https://cdn/b.png"]);
    assert_eq!(progress.snapshot().files_processed, 2);
}

#[tokio::test]
async fn test_form_rejects_link_count_mismatch() {
    let mut server = Server::new_async().await;
    let _ingest = server
        .mock("POST", "/api/v1/files/bulk-upload")
        .with_body(r#"{"fileLinks":["https://cdn/a.jpg"]}"#)
        .create_async()
        .await;

    let files = vec![text_file("a.jpg", "first"), text_file("b.png", "second")];
    let ids = ids(&files);
    let progress = progress_for(&files, &ids);
    let transport = MultipartFormTransport::new(api(&server));

    let err = transport
        .upload_batch(&ctx(&ids), &files, &progress)
        .await
        .unwrap_err();

    assert_eq!(err.files, vec!["a.jpg", "b.png"]);
    assert!(err.message.contains("1 file links for 2 files"));
    assert_eq!(progress.snapshot().files_processed, 0);
}

#[tokio::test]
async fn test_form_surfaces_status() {
    let mut server = Server::new_async().await;
    let _ingest = server
        .mock("POST", "/api/v1/files/bulk-upload")
        .with_status(500)
        .with_body(r#"{"message":"ingest unavailable"}"#)
        .create_async()
        .await;

    let files = vec![media("a.jpg", 10)];
    let ids = ids(&files);
    let progress = progress_for(&files, &ids);
    let err = MultipartFormTransport::new(api(&server))
        .upload_batch(&ctx(&ids), &files, &progress)
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(500));
    assert_eq!(err.message, "ingest unavailable");
}

/// Mocks for a 3-part upload of `0123456789AB` with part size 5.
async fn mock_parts(server: &mut Server, fail_part: Option<(u32, usize)>) -> Vec<mockito::Mock> {
    let mut mocks = Vec::new();
    mocks.push(
        server
            .mock("POST", "/api/v1/uploads/multipart/initiate")
            .match_body(Matcher::PartialJson(json!({
                "fileName": "big.mov",
                "fileSize": 12,
                "partCount": 3
            })))
            .with_body(r#"{"uploadId":"up-1","key":"albums/AB12CD/big.mov"}"#)
            .create_async()
            .await,
    );

    for part in 1..=3u32 {
        mocks.push(
            server
                .mock("POST", "/api/v1/uploads/multipart/part-url")
                .match_body(Matcher::PartialJson(json!({
                    "uploadId": "up-1",
                    "partNumber": part
                })))
                .with_body(json!({"url": format!("{}/parts/{}", server.url(), part)}).to_string())
                .create_async()
                .await,
        );
    }

    let bodies = ["01234", "56789", "AB"];
    for (i, body) in bodies.iter().enumerate() {
        let part = (i + 1) as u32;
        let mock = server.mock("PUT", format!("/parts/{}", part).as_str()).match_body(*body);
        let mock = match fail_part {
            Some((failing, status)) if failing == part => mock.with_status(status),
            _ => mock.with_header("etag", &format!("\"e{}\"", part)),
        };
        mocks.push(mock.create_async().await);
    }
    mocks
}

#[tokio::test]
async fn test_chunked_completes_with_ordered_parts() {
    let mut server = Server::new_async().await;
    let _parts = mock_parts(&mut server, None).await;
    let complete = server
        .mock("POST", "/api/v1/uploads/multipart/complete")
        .match_body(Matcher::Json(json!({
            "uploadId": "up-1",
            "key": "albums/AB12CD/big.mov",
            "parts": [
                {"partNumber": 1, "eTag": "\"e1\""},
                {"partNumber": 2, "eTag": "\"e2\""},
                {"partNumber": 3, "eTag": "\"e3\""}
            ]
        })))
        .with_body(r#"{"key":"albums/AB12CD/big.mov"}"#)
        .create_async()
        .await;
    let abort = server
        .mock("POST", "/api/v1/uploads/multipart/abort")
        .expect(0)
        .create_async()
        .await;

    let files = vec![text_file("big.mov", "0123456789AB")];
    let ids = ids(&files);
    let sent = Arc::new(Mutex::new(Vec::new()));
    let recorder = sent.clone();
    let progress = ProgressHandle::new(ProgressPolicy::Bytes).with_listener(move |snapshot| {
        recorder.lock().unwrap().push(snapshot.bytes_uploaded);
    });
    progress.register(ids[0].clone(), CATEGORY, 12);
    let transport = ChunkedTransport::new(api(&server), nz(5));

    let keys = transport
        .upload_batch(&ctx(&ids), &files, &progress)
        .await
        .unwrap();

    complete.assert_async().await;
    abort.assert_async().await;
    assert_eq!(keys, vec!["albums/AB12CD/big.mov"]);
    assert_eq!(progress.snapshot().overall_percent, 100);
    // Parts stream progress before completion: 5, 10, 12 bytes, then 100%.
    assert_eq!(*sent.lock().unwrap(), vec![5, 10, 12, 12]);
}

#[tokio::test]
async fn test_chunked_part_failure_aborts_same_upload() {
    let mut server = Server::new_async().await;
    let _parts = mock_parts(&mut server, Some((2, 500))).await;
    let complete = server
        .mock("POST", "/api/v1/uploads/multipart/complete")
        .expect(0)
        .create_async()
        .await;
    let abort = server
        .mock("POST", "/api/v1/uploads/multipart/abort")
        .match_body(Matcher::Json(json!({
            "uploadId": "up-1",
            "key": "albums/AB12CD/big.mov"
        })))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let files = vec![text_file("big.mov", "0123456789AB")];
    let ids = ids(&files);
    let progress = progress_for(&files, &ids);
    let err = ChunkedTransport::new(api(&server), nz(5))
        .upload_batch(&ctx(&ids), &files, &progress)
        .await
        .unwrap_err();

    abort.assert_async().await;
    complete.assert_async().await;
    assert_eq!(err.status, Some(500));
    assert_eq!(err.files, vec!["big.mov"]);
    assert_eq!(
        err.cleanup,
        CleanupState::Aborted {
            upload_id: "up-1".to_string()
        }
    );
    assert!(!err.cleanup.needs_cleanup());
}

#[tokio::test]
async fn test_chunked_abort_failure_keeps_original_error() {
    let mut server = Server::new_async().await;
    let _parts = mock_parts(&mut server, Some((1, 403))).await;
    let _abort = server
        .mock("POST", "/api/v1/uploads/multipart/abort")
        .with_status(500)
        .with_body(r#"{"message":"abort failed"}"#)
        .create_async()
        .await;

    let files = vec![text_file("big.mov", "0123456789AB")];
    let ids = ids(&files);
    let progress = progress_for(&files, &ids);
    let err = ChunkedTransport::new(api(&server), nz(5))
        .upload_batch(&ctx(&ids), &files, &progress)
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(403));
    assert!(err.cleanup.needs_cleanup());
    assert_eq!(err.cleanup.upload_id(), Some("up-1"));
    match &err.cleanup {
        CleanupState::AbortFailed { error, .. } => {
            assert_eq!(error.status, Some(500));
            assert_eq!(error.message, "abort failed");
        }
        other => panic!("unexpected cleanup state: {:?}", other),
    }
    assert!(err.to_string().contains("abort failed"));
}

#[tokio::test]
async fn test_auto_routes_by_size_and_keeps_order() {
    let mut server = Server::new_async().await;
    let _parts = mock_parts(&mut server, None).await;
    let _complete = server
        .mock("POST", "/api/v1/uploads/multipart/complete")
        .with_body(r#"{"key":"albums/AB12CD/big.mov"}"#)
        .create_async()
        .await;
    let first = server
        .mock("POST", "/api/v1/files/bulk-upload")
        .match_body(Matcher::Regex("filename=\"a.jpg\"".to_string()))
        .with_body(r#"{"fileLinks":["https://cdn/a.jpg"]}"#)
        .expect(1)
        .create_async()
        .await;
    let last = server
        .mock("POST", "/api/v1/files/bulk-upload")
        .match_body(Matcher::Regex("filename=\"c.jpg\"".to_string()))
        .with_body(r#"{"fileLinks":["https://cdn/c.jpg"]}"#)
        .expect(1)
        .create_async()
        .await;

    let files = vec![
        text_file("a.jpg", "abc"),
        text_file("big.mov", "0123456789AB"),
        text_file("c.jpg", "cdef"),
    ];
    let ids = ids(&files);
    let progress = progress_for(&files, &ids);
    let transport = AutoTransport::new(
        MultipartFormTransport::new(api(&server)),
        ChunkedTransport::new(api(&server), nz(5)),
        10,
    );

    let keys = transport
        .upload_batch(&ctx(&ids), &files, &progress)
        .await
        .unwrap();

    first.assert_async().await;
    last.assert_async().await;
    assert_eq!(
        keys,
        vec!["https://cdn/a.jpg", "albums/AB12CD/big.mov", "https://cdn/c.jpg"]
    );
    assert_eq!(progress.snapshot().overall_percent, 100);
}

#[tokio::test]
async fn test_direct_put_failure_reports_stored_siblings() {
    let mut server = Server::new_async().await;
    for name in ["a.jpg", "b.jpg"] {
        server
            .mock("POST", "/api/v1/uploads/presign")
            .match_body(Matcher::PartialJson(json!({ "fileName": name })))
            .with_body(
                json!({
                    "url": format!("{}/bucket/{}", server.url(), name),
                    "key": format!("albums/AB12CD/{}", name)
                })
                .to_string(),
            )
            .create_async()
            .await;
    }
    let stored = server
        .mock("PUT", "/bucket/a.jpg")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    // Fails only after backing off, well after a.jpg is stored.
    let _failing = server
        .mock("PUT", "/bucket/b.jpg")
        .with_status(503)
        .create_async()
        .await;

    let files = vec![text_file("a.jpg", "first"), text_file("b.jpg", "second")];
    let ids = ids(&files);
    let progress = progress_for(&files, &ids);
    let transport = DirectPutTransport::new(
        api(&server),
        RetryPolicy::new(2, Duration::from_millis(200)),
    );

    let err = transport
        .upload_batch(&ctx(&ids), &files, &progress)
        .await
        .unwrap_err();

    stored.assert_async().await;
    assert_eq!(err.status, Some(503));
    assert_eq!(err.files, vec!["b.jpg"]);
    assert_eq!(err.stored.len(), 1);
    assert_eq!(err.stored[0].file_name, "a.jpg");
    assert_eq!(err.stored[0].key, "albums/AB12CD/a.jpg");
    assert_eq!(err.stored[0].file_id, ids[0]);
}

#[tokio::test]
async fn test_direct_put_failure_stops_sibling_retries() {
    let mut server = Server::new_async().await;
    for name in ["a.jpg", "b.jpg"] {
        server
            .mock("POST", "/api/v1/uploads/presign")
            .match_body(Matcher::PartialJson(json!({ "fileName": name })))
            .with_body(
                json!({
                    "url": format!("{}/bucket/{}", server.url(), name),
                    "key": format!("albums/AB12CD/{}", name)
                })
                .to_string(),
            )
            .create_async()
            .await;
    }
    let slow = server
        .mock("PUT", "/bucket/a.jpg")
        .with_status(503)
        .expect_at_most(1)
        .create_async()
        .await;
    let _rejected = server
        .mock("PUT", "/bucket/b.jpg")
        .with_status(403)
        .create_async()
        .await;

    let files = vec![text_file("a.jpg", "first"), text_file("b.jpg", "second")];
    let ids = ids(&files);
    let progress = progress_for(&files, &ids);
    let transport = DirectPutTransport::new(
        api(&server),
        RetryPolicy::new(3, Duration::from_millis(500)),
    );

    let err = transport
        .upload_batch(&ctx(&ids), &files, &progress)
        .await
        .unwrap_err();
    tokio::time::sleep(Duration::from_millis(700)).await;

    slow.assert_async().await;
    assert_eq!(err.status, Some(403));
    assert_eq!(err.files, vec!["b.jpg"]);
    assert!(err.stored.is_empty());
}

#[tokio::test]
async fn test_auto_failure_reports_earlier_runs() {
    let mut server = Server::new_async().await;
    let _parts = mock_parts(&mut server, Some((3, 500))).await;
    let _abort = server
        .mock("POST", "/api/v1/uploads/multipart/abort")
        .with_status(204)
        .create_async()
        .await;
    let _form = server
        .mock("POST", "/api/v1/files/bulk-upload")
        .with_body(r#"{"fileLinks":["https://cdn/a.jpg"]}"#)
        .expect(1)
        .create_async()
        .await;

    let files = vec![
        text_file("a.jpg", "abc"),
        text_file("big.mov", "0123456789AB"),
        text_file("c.jpg", "cdef"),
    ];
    let ids = ids(&files);
    let progress = progress_for(&files, &ids);
    let transport = AutoTransport::new(
        MultipartFormTransport::new(api(&server)),
        ChunkedTransport::new(api(&server), nz(5)),
        10,
    );

    let err = transport
        .upload_batch(&ctx(&ids), &files, &progress)
        .await
        .unwrap_err();

    assert_eq!(err.files, vec!["big.mov"]);
    let stored: Vec<(&str, &str)> = err
        .stored
        .iter()
        .map(|o| (o.file_name.as_str(), o.key.as_str()))
        .collect();
    assert_eq!(stored, vec![("a.jpg", "https://cdn/a.jpg")]);
}

#[tokio::test]
async fn test_chunked_cancel_during_abort_still_aborts() {
    let mut server = Server::new_async().await;
    let _parts = mock_parts(&mut server, Some((1, 403))).await;
    let abort = server
        .mock("POST", "/api/v1/uploads/multipart/abort")
        .with_status(500)
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_millis(400));
            w.write_all(br#"{"message":"abort slow"}"#)
        })
        .expect(2)
        .create_async()
        .await;

    let files = vec![text_file("big.mov", "0123456789AB")];
    let ids = ids(&files);
    let progress = progress_for(&files, &ids);
    let transport = ChunkedTransport::new(api(&server), nz(5));

    let outcome = tokio::time::timeout(
        Duration::from_millis(150),
        transport.upload_batch(&ctx(&ids), &files, &progress),
    )
    .await;
    assert!(outcome.is_err(), "upload should still be aborting");

    // The dropped upload hands the abort to a background task.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    abort.assert_async().await;
}
