use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use xhs_to_youtube::config::Config;
use xhs_to_youtube::downloader::Downloader;
use xhs_to_youtube::extractor::ProfileLister;
use xhs_to_youtube::source::SourceClient;
use xhs_to_youtube::store::UploadRecordStore;
use xhs_to_youtube::transfer::{
    load_batch_input, run_batch, BatchOptions, DelayRange, ItemTransfer, Progress,
    TransferPipeline, TransferRequest,
};
use xhs_to_youtube::youtube::{check_credentials, OAuthClient, Privacy, YouTubeUploader};

/// Command line interface.
#[derive(Parser)]
#[command(name = "xhs-to-youtube")]
#[command(author, version, about = "Copy Xiaohongshu videos to YouTube")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a single note.
    Transfer {
        /// Note share URL.
        url: String,
        /// English title; the video is published as 【original】english.
        #[arg(long)]
        title_en: Option<String>,
        /// Description to publish instead of the note's own.
        #[arg(long)]
        desc: Option<String>,
        /// Comma-separated tags.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// public, unlisted or private (default: DEFAULT_PRIVACY).
        #[arg(long)]
        privacy: Option<Privacy>,
        /// Keep the downloaded file.
        #[arg(long)]
        keep_video: bool,
    },

    /// Copy every note of a video list.
    Batch {
        /// Video list document (default: VIDEO_LIST_FILE).
        #[arg(long)]
        list: Option<PathBuf>,
        /// Minimum pause between notes, in seconds.
        #[arg(long)]
        interval_min: Option<u64>,
        /// Maximum pause between notes, in seconds.
        #[arg(long)]
        interval_max: Option<u64>,
        #[arg(long)]
        privacy: Option<Privacy>,
        #[arg(long)]
        keep_video: bool,
        /// Upload notes even if they were uploaded before.
        #[arg(long)]
        no_skip: bool,
    },

    /// Write the video list of a user profile.
    FetchUser {
        /// Profile URL (…/user/profile/<id>).
        url: String,
        /// Output document (default: VIDEO_LIST_FILE).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report the state of cookies, OAuth client and token.
    Check,

    /// Authorize YouTube uploads.
    Auth,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_tracing()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tokio::select! {
        result = dispatch(cli.command, &config) => result,
        () = shutdown_signal() => {
            warn!("Interrupted, stopping");
            Ok(())
        }
    }
}

async fn dispatch(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Transfer {
            url,
            title_en,
            desc,
            tags,
            privacy,
            keep_video,
        } => {
            let pipeline = build_pipeline(config).await?;
            let request = TransferRequest {
                english_title: title_en,
                custom_description: desc,
                tags,
                keep_local_file: keep_video || config.keep_local_files,
                ..TransferRequest::new(url, privacy.unwrap_or(config.default_privacy))
            };

            let outcome = pipeline.transfer(&request).await.context("Transfer failed")?;
            println!("{}", outcome.destination_url);
            if let Some(path) = outcome.local_file {
                info!(path = %path.display(), "Local file kept");
            }
        }

        Commands::Batch {
            list,
            interval_min,
            interval_max,
            privacy,
            keep_video,
            no_skip,
        } => {
            let list = list.unwrap_or_else(|| config.video_list_file.clone());
            let items = load_batch_input(&list)
                .await
                .with_context(|| format!("Failed to load video list {}", list.display()))?;

            let options = BatchOptions {
                interval: DelayRange::new(
                    interval_min.unwrap_or(config.batch_interval_min_secs),
                    interval_max.unwrap_or(config.batch_interval_max_secs),
                ),
                privacy: privacy.unwrap_or(config.default_privacy),
                keep_local_file: keep_video || config.keep_local_files,
                skip_if_uploaded: config.skip_uploaded && !no_skip,
            };

            let pipeline = build_pipeline(config).await?;
            let store = UploadRecordStore::new(&config.uploaded_file);
            let result = run_batch(&pipeline, &store, &items, &options).await;

            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("Failed to encode batch result")?
            );
        }

        Commands::FetchUser { url, output } => {
            let output = output.unwrap_or_else(|| config.video_list_file.clone());
            let source = SourceClient::from_config(config).await?;
            let list = ProfileLister::new(source)
                .list_to_file(&url, &output)
                .await
                .context("Failed to list profile videos")?;
            println!("{} videos written to {}", list.total_count, output.display());
        }

        Commands::Check => {
            for status in check_credentials(config).await {
                let mark = if status.valid { "ok" } else { "--" };
                println!("[{mark}] {}: {} ({})", status.name, status.message, status.path);
            }
        }

        Commands::Auth => {
            let oauth = OAuthClient::new(config)?;
            let start = oauth.start_authorization().await?;

            println!("Open this URL in a browser and authorize access:\n");
            println!("{}\n", start.authorization_url);
            println!(
                "Paste the authorization code (session expires at {}):",
                start.expires_at.format("%H:%M:%S UTC")
            );

            let mut code = String::new();
            BufReader::new(tokio::io::stdin())
                .read_line(&mut code)
                .await
                .context("Failed to read authorization code")?;

            oauth
                .complete_authorization(&start.session_token, &code)
                .await
                .context("Authorization failed")?;
            println!("Authorized; token saved to {}", config.token_file.display());
        }
    }

    Ok(())
}

async fn build_pipeline(config: &Config) -> Result<TransferPipeline> {
    let source = SourceClient::from_config(config).await?;
    info!(cookies = source.cookie_count(), "Source client ready");

    let downloader = Downloader::new(config)?;
    let credentials = OAuthClient::new(config)?.shared();
    let uploader = YouTubeUploader::new(config, credentials)?;

    let progress = Progress::new(Arc::new(|percent: f64, status: &str| {
        info!(percent = %format!("{percent:.0}"), status, "Progress");
    }));

    Ok(
        TransferPipeline::new(source, downloader, Arc::new(uploader), &config.youtube_category_id)
            .with_progress(progress),
    )
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,xhs_to_youtube=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
