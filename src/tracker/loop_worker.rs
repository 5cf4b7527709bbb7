use std::sync::Arc;

use log::{error, info, warn};
use tokio::{sync::Mutex, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    camera::FrameSource,
    classifier::{classify_frame, Classifier},
    db::{unix_now, Database},
};

use super::{
    batch::EmotionBatch, controller::TrackerStatus, sampler::FrameSampler, TrackerConfig,
};

pub(super) async fn tracking_loop(
    session_id: String,
    mut source: Box<dyn FrameSource>,
    classifier: Arc<dyn Classifier>,
    db: Database,
    config: TrackerConfig,
    status: Arc<Mutex<TrackerStatus>>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let sampler = FrameSampler::new(config.sample_interval);
    let mut batch = EmotionBatch::new(config.batch_size);
    let mut frame_count: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = match source.next_frame().await {
                    Ok(frame) => frame,
                    Err(err) => {
                        error!("frame capture failed for session {session_id}, ending session: {err}");
                        break;
                    }
                };

                frame_count += 1;
                status.lock().await.frames_seen = frame_count;

                if !sampler.should_sample(frame_count) {
                    continue;
                }

                // Capture time, not classifier response time, is what the
                // record carries.
                let captured_at = unix_now();
                status.lock().await.frames_sampled += 1;

                let detection = match classify_frame(classifier.as_ref(), &frame).await {
                    Ok(detection) => detection,
                    Err(err) => {
                        warn!("classification failed for session {session_id}, skipping frame: {err}");
                        continue;
                    }
                };

                batch.record(captured_at, detection.label());
                {
                    let mut snapshot = status.lock().await;
                    snapshot.current_emotion = Some(detection.label().to_string());
                    snapshot.current_confidence = Some(detection.confidence());
                    snapshot.buffered = batch.len();
                }

                if batch.is_full() {
                    match batch.flush(&db).await {
                        Ok(written) => {
                            info!("Flushed {written} emotions for session {session_id}");
                            let mut snapshot = status.lock().await;
                            snapshot.flushed += written as u64;
                            snapshot.buffered = batch.len();
                        }
                        Err(err) => {
                            warn!(
                                "store write failed for session {session_id}, keeping {} buffered samples: {err:#}",
                                batch.len()
                            );
                        }
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Tracking session {session_id} stopping");
                break;
            }
        }
    }

    if !batch.is_empty() {
        match batch.flush(&db).await {
            Ok(written) => {
                info!("Final flush wrote {written} emotions for session {session_id}");
                status.lock().await.flushed += written as u64;
            }
            Err(err) => {
                error!(
                    "final flush failed for session {session_id}, {} samples still buffered: {err:#}",
                    batch.len()
                );
            }
        }
    }

    // The capture device is released whatever the flush outcome.
    drop(source);

    let mut snapshot = status.lock().await;
    snapshot.running = false;
    snapshot.buffered = batch.len();
}
