use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};

use emotrack::{
    api::{router, AppState},
    camera::{CameraFactory, FrameSource, JpegDirectorySource},
    classifier::{Classifier, RemoteClassifier},
    db::Database,
    migrate::migrate_legacy_store,
    tracker::{
        frame_interval_for_fps, TrackerConfig, TrackerController, DEFAULT_BATCH_SIZE,
        DEFAULT_FPS, DEFAULT_SAMPLE_INTERVAL,
    },
};

#[derive(Parser)]
#[command(name = "emotrack", about = "Webcam emotion tracking service", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the emotion store and dashboard API
    Serve {
        /// Address to bind
        #[arg(long, env = "EMOTRACK_ADDR", default_value = "127.0.0.1:8000")]
        addr: String,
        /// Path to the SQLite emotion store
        #[arg(long, env = "EMOTRACK_DB", default_value = "data/emotions.db")]
        db: PathBuf,
        /// Endpoint of the face-emotion detection service
        #[arg(long, env = "EMOTRACK_DETECT_URL")]
        detect_url: String,
        /// Directory the camera agent drops frames into
        #[arg(long, env = "EMOTRACK_FRAMES_DIR", default_value = "frames")]
        frames_dir: PathBuf,
        /// Nominal camera frame rate
        #[arg(long, default_value_t = DEFAULT_FPS)]
        fps: u32,
        /// Classify every Nth frame
        #[arg(long, default_value_t = DEFAULT_SAMPLE_INTERVAL)]
        sample_interval: u32,
        /// Samples buffered before a store flush
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Relocate a legacy store into the data directory, upgrading its schema
    Migrate {
        /// Legacy store to import
        #[arg(long, default_value = "emotions.db")]
        from: PathBuf,
        /// Destination store
        #[arg(long, default_value = "data/emotions.db")]
        to: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            addr,
            db,
            detect_url,
            frames_dir,
            fps,
            sample_interval,
            batch_size,
        } => {
            serve(
                addr,
                db,
                detect_url,
                frames_dir,
                fps,
                sample_interval,
                batch_size,
            )
            .await
        }
        Command::Migrate { from, to } => {
            if let Some(report) = migrate_legacy_store(&from, &to)? {
                info!("Migration complete: {} rows now at {}", report.rows, to.display());
                if let Some(backup) = report.backup {
                    info!("Previous store backed up to {}", backup.display());
                }
            }
            Ok(())
        }
    }
}

async fn serve(
    addr: String,
    db_path: PathBuf,
    detect_url: String,
    frames_dir: PathBuf,
    fps: u32,
    sample_interval: u32,
    batch_size: usize,
) -> Result<()> {
    let db = Database::new(db_path)?;

    let classifier: Arc<dyn Classifier> = Arc::new(RemoteClassifier::new(detect_url)?);

    let camera: CameraFactory = Arc::new(move || {
        JpegDirectorySource::open(&frames_dir)
            .map(|source| Box::new(source) as Box<dyn FrameSource>)
    });

    let config = TrackerConfig {
        frame_interval: frame_interval_for_fps(fps),
        sample_interval,
        batch_size,
    };
    let tracker = TrackerController::new(db.clone(), classifier.clone(), camera, config);

    let state = AppState {
        db,
        classifier,
        tracker,
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("EmoTrack API listening on http://{addr}");

    axum::serve(listener, router(state).into_make_service())
        .await
        .context("server error")?;

    Ok(())
}
