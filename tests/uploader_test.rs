//! Integration tests for the resumable YouTube uploader.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xhs_to_youtube::config::Config;
use xhs_to_youtube::youtube::{
    AuthContext, CredentialProvider, Privacy, Uploader, VideoMetadata, YouTubeUploader,
};
use xhs_to_youtube::TransferError;

const FILE_SIZE: usize = 1_572_864; // 1.5 MiB, two chunks

/// Always hands out the same bearer token.
struct StaticCredentials;

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn is_auth_valid(&self) -> bool {
        true
    }

    async fn access_context(&self) -> Result<AuthContext, TransferError> {
        Ok(AuthContext {
            access_token: "test-token".to_string(),
        })
    }

    async fn refresh(&self) -> Result<(), TransferError> {
        Ok(())
    }
}

fn metadata() -> VideoMetadata {
    VideoMetadata {
        title: "【海边日落】Sunset".to_string(),
        description: "傍晚的海\n\n原创".to_string(),
        tags: vec!["travel".to_string()],
        category_id: "22".to_string(),
        privacy: Privacy::Unlisted,
    }
}

fn uploader(server: &MockServer, dir: &std::path::Path) -> YouTubeUploader {
    let mut config = Config::for_testing(dir);
    config.youtube_upload_url = format!("{}/upload/youtube/v3/videos", server.uri());
    YouTubeUploader::new(&config, Arc::new(StaticCredentials)).unwrap()
}

async fn mount_session(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/upload/youtube/v3/videos"))
        .and(query_param("uploadType", "resumable"))
        .and(query_param("part", "snippet,status"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("x-upload-content-type", "video/mp4"))
        .and(header("x-upload-content-length", FILE_SIZE.to_string().as_str()))
        .and(body_partial_json(serde_json::json!({
            "snippet": {"title": "【海边日落】Sunset", "categoryId": "22", "tags": ["travel"]},
            "status": {"privacyStatus": "unlisted"}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/session/abc", server.uri()).as_str()),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_upload_sends_file_in_chunks() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    Mock::given(method("PUT"))
        .and(path("/session/abc"))
        .and(header("content-range", "bytes 0-1048575/1572864"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-1048575"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/abc"))
        .and(header("content-range", "bytes 1048576-1572863/1572864"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kind": "youtube#video",
            "id": "vid-xyz"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let file = temp.path().join("clip.mp4");
    std::fs::write(&file, vec![9u8; FILE_SIZE]).unwrap();

    let fractions = Arc::new(Mutex::new(Vec::new()));
    let sink = fractions.clone();
    let video = uploader(&server, temp.path())
        .upload(&file, &metadata(), &move |fraction: f64| {
            sink.lock().unwrap().push(fraction);
        })
        .await
        .unwrap();

    assert_eq!(video.id, "vid-xyz");
    assert_eq!(video.url, "https://www.youtube.com/watch?v=vid-xyz");

    let fractions = fractions.lock().unwrap();
    assert_eq!(fractions.len(), 2);
    assert!((fractions[0] - 2.0 / 3.0).abs() < 1e-9);
    assert!((fractions[1] - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_upload_resumes_from_server_offset() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    // Server only kept the first 512 KiB of the first chunk
    Mock::given(method("PUT"))
        .and(path("/session/abc"))
        .and(header("content-range", "bytes 0-1048575/1572864"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-524287"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/abc"))
        .and(header("content-range", "bytes 524288-1572863/1572864"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "vid-resumed"})))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let file = temp.path().join("clip.mp4");
    std::fs::write(&file, vec![3u8; FILE_SIZE]).unwrap();

    let video = uploader(&server, temp.path())
        .upload(&file, &metadata(), &|_fraction: f64| {})
        .await
        .unwrap();
    assert_eq!(video.id, "vid-resumed");
}

#[tokio::test]
async fn test_rejected_credentials_are_auth_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/youtube/v3/videos"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let file = temp.path().join("clip.mp4");
    std::fs::write(&file, vec![1u8; 1024]).unwrap();

    let err = uploader(&server, temp.path())
        .upload(&file, &metadata(), &|_fraction: f64| {})
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Auth(ref m) if m.contains("Invalid Credentials")));
}

#[tokio::test]
async fn test_server_error_on_chunk_is_upload_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/youtube/v3/videos"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/session/abc", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/abc"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let file = temp.path().join("clip.mp4");
    std::fs::write(&file, vec![1u8; 1024]).unwrap();

    let err = uploader(&server, temp.path())
        .upload(&file, &metadata(), &|_fraction: f64| {})
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Upload(_)));
}

#[tokio::test]
async fn test_empty_file_is_not_uploaded() {
    let server = MockServer::start().await;
    mount_session(&server, 0).await;

    let temp = TempDir::new().unwrap();
    let file = temp.path().join("empty.mp4");
    std::fs::write(&file, b"").unwrap();

    let err = uploader(&server, temp.path())
        .upload(&file, &metadata(), &|_fraction: f64| {})
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Upload(_)));
}

#[tokio::test]
async fn test_308_without_range_resends_from_start() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    // First attempt: nothing stored yet
    Mock::given(method("PUT"))
        .and(path("/session/abc"))
        .and(header("content-range", "bytes 0-1048575/1572864"))
        .respond_with(ResponseTemplate::new(308))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/abc"))
        .and(header("content-range", "bytes 0-1048575/1572864"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-1048575"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session/abc"))
        .and(header("content-range", "bytes 1048576-1572863/1572864"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "vid-whole"})))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let file = temp.path().join("clip.mp4");
    std::fs::write(&file, vec![5u8; FILE_SIZE]).unwrap();

    let fractions = Arc::new(Mutex::new(Vec::new()));
    let sink = fractions.clone();
    let video = uploader(&server, temp.path())
        .upload(&file, &metadata(), &move |fraction: f64| {
            sink.lock().unwrap().push(fraction);
        })
        .await
        .unwrap();

    assert_eq!(video.id, "vid-whole");
    let fractions = fractions.lock().unwrap();
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]), "{fractions:?}");
    assert!((fractions[fractions.len() - 1] - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_server_that_never_stores_data_fails() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    Mock::given(method("PUT"))
        .and(path("/session/abc"))
        .and(header("content-range", "bytes 0-1048575/1572864"))
        .respond_with(ResponseTemplate::new(308))
        .expect(4)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let file = temp.path().join("clip.mp4");
    std::fs::write(&file, vec![5u8; FILE_SIZE]).unwrap();

    let err = uploader(&server, temp.path())
        .upload(&file, &metadata(), &|_fraction: f64| {})
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Upload(ref m) if m.contains("byte 0")));
}
