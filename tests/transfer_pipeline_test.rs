//! Integration tests for the single-item transfer pipeline.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xhs_to_youtube::config::Config;
use xhs_to_youtube::downloader::Downloader;
use xhs_to_youtube::source::SourceClient;
use xhs_to_youtube::transfer::{ItemTransfer, Progress, TransferPipeline, TransferRequest};
use xhs_to_youtube::youtube::{Privacy, UploadedVideo, Uploader, VideoMetadata};
use xhs_to_youtube::TransferError;

const NOTE_PAGE: &str = r#"<html><head><title>海边日落 - 小红书</title></head><body>
<script>window.__INITIAL_STATE__={"note":{"noteDetailMap":{"n1":{"note":{"displayTitle":"海边日落","desc":"傍晚的海\n好看","video":{"capa":{"duration":15},"media":{"stream":{"h264":[{"masterUrl":"{BASE}/media/wm.mp4","streamDesc":"WM_X264_MP4"}],"h265":[{"masterUrl":"{BASE}/media/clean.mp4","streamDesc":"X265_MP4_WEB_114"}],"av1":[]}}}}}}}}</script>
</body></html>"#;

const IMAGE_PAGE: &str = r#"<html><head><title>一组照片 - 小红书</title></head><body>
<script>window.__INITIAL_STATE__={"note":{"noteDetailMap":{"n2":{"note":{"type":"normal","desc":"图文"}}}}}</script>
</body></html>"#;

/// Captures what it was asked to upload and answers with a fixed video.
#[derive(Default)]
struct RecordingUploader {
    uploads: Mutex<Vec<(Vec<u8>, VideoMetadata)>>,
    fail: bool,
}

impl RecordingUploader {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn uploads(&self) -> Vec<(Vec<u8>, VideoMetadata)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn upload(
        &self,
        file: &Path,
        metadata: &VideoMetadata,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<UploadedVideo, TransferError> {
        let bytes = tokio::fs::read(file).await.expect("file exists during upload");
        self.uploads.lock().unwrap().push((bytes, metadata.clone()));
        if self.fail {
            return Err(TransferError::Upload("quota exceeded".to_string()));
        }
        on_progress(0.5);
        on_progress(1.0);
        Ok(UploadedVideo::from_id("vid123"))
    }
}

fn clean_bytes() -> Vec<u8> {
    (0..20_000u32).map(|i| (i % 251) as u8).collect()
}

async fn mount_note(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/explore/n1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(NOTE_PAGE.replace("{BASE}", &server.uri())),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/clean.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(clean_bytes()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/wm.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 10]))
        .expect(0)
        .mount(server)
        .await;
}

async fn pipeline(
    server: &MockServer,
    dir: &Path,
    uploader: Arc<RecordingUploader>,
) -> (TransferPipeline, Config) {
    let mut config = Config::for_testing(dir);
    config.source_base_url = server.uri();

    let source = SourceClient::from_config(&config).await.expect("source client");
    let downloader = Downloader::new(&config).expect("downloader");
    let pipeline = TransferPipeline::new(source, downloader, uploader, &config.youtube_category_id);
    (pipeline, config)
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, |entries| entries.count())
}

#[tokio::test]
async fn test_transfer_uploads_unwatermarked_stream() {
    let server = MockServer::start().await;
    mount_note(&server).await;
    let temp = TempDir::new().unwrap();
    let uploader = Arc::new(RecordingUploader::default());
    let (pipeline, config) = pipeline(&server, temp.path(), uploader.clone()).await;

    let request = TransferRequest {
        english_title: Some("Sunset by the sea".to_string()),
        tags: vec!["travel".to_string(), "sea".to_string()],
        ..TransferRequest::new(format!("{}/explore/n1", server.uri()), Privacy::Unlisted)
    };
    let outcome = pipeline.transfer(&request).await.expect("transfer succeeds");

    assert_eq!(outcome.destination_id, "vid123");
    assert_eq!(outcome.destination_url, "https://www.youtube.com/watch?v=vid123");
    assert_eq!(outcome.title, "【海边日落】Sunset by the sea");
    assert_eq!(outcome.source_title, "海边日落");
    assert!(outcome.local_file.is_none());

    let uploads = uploader.uploads();
    assert_eq!(uploads.len(), 1);
    let (bytes, metadata) = &uploads[0];
    assert_eq!(bytes, &clean_bytes());
    assert_eq!(metadata.title, "【海边日落】Sunset by the sea");
    assert_eq!(metadata.description, "傍晚的海\n好看\n\n原创");
    assert_eq!(metadata.tags, vec!["travel", "sea"]);
    assert_eq!(metadata.category_id, "22");
    assert_eq!(metadata.privacy, Privacy::Unlisted);

    assert_eq!(files_in(&config.videos_dir), 0, "local file is removed");
}

#[tokio::test]
async fn test_transfer_uses_overrides() {
    let server = MockServer::start().await;
    mount_note(&server).await;
    let temp = TempDir::new().unwrap();
    let uploader = Arc::new(RecordingUploader::default());
    let (pipeline, _config) = pipeline(&server, temp.path(), uploader.clone()).await;

    let request = TransferRequest {
        title: Some("列表里的标题".to_string()),
        custom_description: Some("My own words".to_string()),
        ..TransferRequest::new(format!("{}/explore/n1", server.uri()), Privacy::Public)
    };
    let outcome = pipeline.transfer(&request).await.unwrap();

    assert_eq!(outcome.title, "列表里的标题");
    let (_, metadata) = &uploader.uploads()[0];
    assert_eq!(metadata.title, "列表里的标题");
    assert_eq!(metadata.description, "My own words");
    assert!(metadata.tags.is_empty());
}

#[tokio::test]
async fn test_transfer_keeps_local_file_on_request() {
    let server = MockServer::start().await;
    mount_note(&server).await;
    let temp = TempDir::new().unwrap();
    let uploader = Arc::new(RecordingUploader::default());
    let (pipeline, config) = pipeline(&server, temp.path(), uploader).await;

    let request = TransferRequest {
        keep_local_file: true,
        ..TransferRequest::new(format!("{}/explore/n1", server.uri()), Privacy::Private)
    };
    let outcome = pipeline.transfer(&request).await.unwrap();

    let kept = outcome.local_file.expect("local file is reported");
    assert!(kept.starts_with(&config.videos_dir));
    assert_eq!(std::fs::read(&kept).unwrap(), clean_bytes());
}

#[tokio::test]
async fn test_transfer_reports_monotonic_progress() {
    let server = MockServer::start().await;
    mount_note(&server).await;
    let temp = TempDir::new().unwrap();
    let uploader = Arc::new(RecordingUploader::default());
    let (pipeline, _config) = pipeline(&server, temp.path(), uploader).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let pipeline = pipeline.with_progress(Progress::new(Arc::new(
        move |percent: f64, status: &str| {
            sink.lock().unwrap().push((percent, status.to_string()));
        },
    )));

    pipeline
        .transfer(&TransferRequest::new(
            format!("{}/explore/n1", server.uri()),
            Privacy::Private,
        ))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    let percents: Vec<f64> = seen.iter().map(|(p, _)| *p).collect();
    assert_eq!(percents.first(), Some(&0.0));
    assert_eq!(percents.last(), Some(&100.0));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert!(percents.contains(&50.0));
    assert!(percents.contains(&60.0));
    assert!(percents.contains(&80.0), "upload half way maps to 80");
    assert_eq!(seen.last().map(|(_, s)| s.as_str()), Some("Done"));
}

#[tokio::test]
async fn test_transfer_rejects_page_without_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/explore/n2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(IMAGE_PAGE))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let uploader = Arc::new(RecordingUploader::default());
    let (pipeline, config) = pipeline(&server, temp.path(), uploader.clone()).await;

    let err = pipeline
        .transfer(&TransferRequest::new(
            format!("{}/explore/n2", server.uri()),
            Privacy::Private,
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::NoPlayableStream));
    assert!(uploader.uploads().is_empty());
    assert_eq!(files_in(&config.videos_dir), 0);
}

#[tokio::test]
async fn test_transfer_fails_on_page_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/explore/n3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let uploader = Arc::new(RecordingUploader::default());
    let (pipeline, _config) = pipeline(&server, temp.path(), uploader.clone()).await;

    let err = pipeline
        .transfer(&TransferRequest::new(
            format!("{}/explore/n3", server.uri()),
            Privacy::Private,
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Network(_)));
    assert!(err.is_retryable());
    assert!(uploader.uploads().is_empty());
}

#[tokio::test]
async fn test_failed_download_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/explore/n1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(NOTE_PAGE.replace("{BASE}", &server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/clean.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let uploader = Arc::new(RecordingUploader::default());
    let (pipeline, config) = pipeline(&server, temp.path(), uploader.clone()).await;

    let err = pipeline
        .transfer(&TransferRequest::new(
            format!("{}/explore/n1", server.uri()),
            Privacy::Private,
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Network(_)));
    assert!(uploader.uploads().is_empty());
    assert_eq!(files_in(&config.videos_dir), 0);
}

#[tokio::test]
async fn test_failed_upload_keeps_local_file() {
    let server = MockServer::start().await;
    mount_note(&server).await;
    let temp = TempDir::new().unwrap();
    let uploader = Arc::new(RecordingUploader::failing());
    let (pipeline, config) = pipeline(&server, temp.path(), uploader.clone()).await;

    let err = pipeline
        .transfer(&TransferRequest::new(
            format!("{}/explore/n1", server.uri()),
            Privacy::Private,
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Upload(_)));
    assert_eq!(uploader.uploads().len(), 1);
    assert_eq!(files_in(&config.videos_dir), 1);
}
