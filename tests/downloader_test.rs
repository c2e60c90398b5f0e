//! Integration tests for media downloads against slow servers.

use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use xhs_to_youtube::config::Config;
use xhs_to_youtube::downloader::Downloader;
use xhs_to_youtube::TransferError;

/// Serve one response whose body arrives in `chunks` pieces, `gap` apart.
async fn trickling_server(chunks: usize, chunk_len: usize, gap: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = vec![0u8; 4096];
        let _ = socket.read(&mut request).await;

        let header = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: video/mp4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            chunks * chunk_len
        );
        socket.write_all(header.as_bytes()).await.unwrap();
        for _ in 0..chunks {
            tokio::time::sleep(gap).await;
            // The client may already have given up
            if socket.write_all(&vec![7u8; chunk_len]).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
        }
    });

    format!("http://{addr}/media/slow.mp4")
}

#[tokio::test]
async fn test_slow_body_within_read_timeout_completes() {
    // Whole transfer takes ~1.2s; no single gap reaches the 500ms timeout
    let url = trickling_server(6, 1024, Duration::from_millis(200)).await;
    let temp = TempDir::new().unwrap();
    let mut config = Config::for_testing(temp.path());
    config.download_timeout = Duration::from_millis(500);

    let asset = Downloader::new(&config)
        .unwrap()
        .download(&url, &|_fraction: f64| {})
        .await
        .expect("download outlasting the timeout still succeeds");

    assert_eq!(asset.size_bytes, 6 * 1024);
    assert_eq!(std::fs::read(&asset.path).unwrap(), vec![7u8; 6 * 1024]);
}

#[tokio::test]
async fn test_stalled_body_times_out() {
    let url = trickling_server(2, 1024, Duration::from_millis(1500)).await;
    let temp = TempDir::new().unwrap();
    let mut config = Config::for_testing(temp.path());
    config.download_timeout = Duration::from_millis(300);

    let err = Downloader::new(&config)
        .unwrap()
        .download(&url, &|_fraction: f64| {})
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Network(_)));
    assert_eq!(std::fs::read_dir(&config.videos_dir).unwrap().count(), 0);
}
