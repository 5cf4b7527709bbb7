use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{camera::CameraFactory, classifier::Classifier, db::Database};

use super::{loop_worker::tracking_loop, TrackerConfig};

/// Live view of a capture session, shared between the loop and the API.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackerStatus {
    pub running: bool,
    pub session_id: Option<String>,
    pub frames_seen: u64,
    pub frames_sampled: u64,
    pub current_emotion: Option<String>,
    pub current_confidence: Option<f64>,
    pub buffered: usize,
    pub flushed: u64,
}

struct ActiveSession {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
    status: Arc<Mutex<TrackerStatus>>,
}

/// Owns at most one live capture session at a time. Cloning shares the
/// session slot, so every handle sees the same session.
#[derive(Clone)]
pub struct TrackerController {
    db: Database,
    classifier: Arc<dyn Classifier>,
    camera: CameraFactory,
    config: TrackerConfig,
    session: Arc<Mutex<Option<ActiveSession>>>,
}

impl TrackerController {
    pub fn new(
        db: Database,
        classifier: Arc<dyn Classifier>,
        camera: CameraFactory,
        config: TrackerConfig,
    ) -> Self {
        Self {
            db,
            classifier,
            camera,
            config,
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Begins a capture session. Refuses while one is live; a session that
    /// ended on its own (camera failure) does not block a new start.
    pub async fn start(&self) -> Result<TrackerStatus> {
        let mut session = self.session.lock().await;

        if let Some(active) = session.as_ref() {
            if active.handle.is_finished() {
                session.take();
            } else {
                bail!("tracking already active");
            }
        }

        let source = (self.camera)().context("failed to open capture device")?;
        let session_id = Uuid::new_v4().to_string();
        info!(
            "Starting tracking session {session_id} on {}",
            source.describe()
        );

        let status = Arc::new(Mutex::new(TrackerStatus {
            running: true,
            session_id: Some(session_id.clone()),
            ..Default::default()
        }));

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(tracking_loop(
            session_id,
            source,
            self.classifier.clone(),
            self.db.clone(),
            self.config.clone(),
            status.clone(),
            cancel_token.clone(),
        ));

        let snapshot = status.lock().await.clone();
        *session = Some(ActiveSession {
            handle,
            cancel_token,
            status,
        });

        Ok(snapshot)
    }

    /// Cancels the live session and waits for its final flush. Returns the
    /// closing status, or `None` when no session was active.
    pub async fn stop(&self) -> Result<Option<TrackerStatus>> {
        let taken = self.session.lock().await.take();
        let Some(active) = taken else {
            return Ok(None);
        };

        active.cancel_token.cancel();
        active
            .handle
            .await
            .context("tracking loop task failed to join")?;

        let status = active.status.lock().await.clone();
        Ok(Some(status))
    }

    pub async fn status(&self) -> TrackerStatus {
        let session = self.session.lock().await;
        match session.as_ref() {
            Some(active) => active.status.lock().await.clone(),
            None => TrackerStatus::default(),
        }
    }

    pub async fn is_running(&self) -> bool {
        let session = self.session.lock().await;
        session
            .as_ref()
            .map(|active| !active.handle.is_finished())
            .unwrap_or(false)
    }
}
