use super::dispatcher::{AlertCounters, AlertJob};
use super::sinks::{AudioSink, ImageSink, MessageSink};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Transports an [`AlertWorker`] delivers through; any may be absent
#[derive(Clone, Default)]
pub struct AlertSinks {
    pub image: Option<Arc<dyn ImageSink>>,
    pub message: Option<Arc<dyn MessageSink>>,
    pub audio: Option<Arc<dyn AudioSink>>,
}

/// Drains the alert queue off the presentation path
pub struct AlertWorker {
    receiver: mpsc::Receiver<AlertJob>,
    sinks: AlertSinks,
    timezone: Tz,
    counters: Arc<AlertCounters>,
    cancel: CancellationToken,
}

impl AlertWorker {
    pub fn new(
        receiver: mpsc::Receiver<AlertJob>,
        sinks: AlertSinks,
        timezone: Tz,
        counters: Arc<AlertCounters>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            sinks,
            timezone,
            counters,
            cancel,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!("Alert worker started");

        loop {
            let job = tokio::select! {
                _ = self.cancel.cancelled() => break,
                job = self.receiver.recv() => job,
            };

            match job {
                Some(job) => self.deliver(job).await,
                None => {
                    debug!("Alert queue closed");
                    break;
                }
            }
        }

        self.receiver.close();
        let mut pending = 0usize;
        while self.receiver.try_recv().is_ok() {
            pending += 1;
        }
        if pending > 0 {
            warn!("Discarded {} pending alerts at shutdown", pending);
        }
        info!("Alert worker stopped");
    }

    /// Snapshot, then sound, then message. Failures are logged and never
    /// abort the remaining steps.
    pub async fn deliver(&self, job: AlertJob) {
        let payload = &job.payload;
        let mut saved: Option<PathBuf> = None;

        // A message needs the snapshot on disk to attach it
        let wants_snapshot =
            payload.save_image || (payload.send_message && self.sinks.message.is_some());

        if wants_snapshot {
            if let Some(sink) = &self.sinks.image {
                match sink
                    .save(
                        Arc::clone(&payload.image),
                        &payload.camera_name,
                        job.triggered_at,
                    )
                    .await
                {
                    Ok(path) => {
                        AlertCounters::bump(&self.counters.images_saved);
                        saved = Some(path);
                    }
                    Err(e) => {
                        AlertCounters::bump(&self.counters.sink_failures);
                        warn!("Alert {}: {}", job.alert_id, e);
                    }
                }
            }
        }

        if payload.sound_alert {
            if let Some(sink) = &self.sinks.audio {
                match sink.play().await {
                    Ok(()) => AlertCounters::bump(&self.counters.sounds_played),
                    Err(e) => {
                        AlertCounters::bump(&self.counters.sink_failures);
                        warn!("Alert {}: {}", job.alert_id, e);
                    }
                }
            }
        }

        if payload.send_message {
            if let Some(sink) = &self.sinks.message {
                let caption = self.caption(&job);
                match sink.send(Some(&caption), saved.as_deref()).await {
                    Ok(()) => AlertCounters::bump(&self.counters.messages_sent),
                    Err(e) => {
                        AlertCounters::bump(&self.counters.sink_failures);
                        warn!("Alert {}: {}", job.alert_id, e);
                    }
                }
            }
        }

        debug!("Alert {} handled", job.alert_id);
    }

    pub fn caption(&self, job: &AlertJob) -> String {
        let local = DateTime::<Utc>::from(job.triggered_at).with_timezone(&self.timezone);
        let people = match job.payload.detection_count {
            1 => "1 person".to_string(),
            n => format!("{} people", n),
        };
        format!(
            "Human detected on {} at {} ({})",
            job.payload.camera_name,
            local.format("%Y-%m-%d %H:%M:%S %Z"),
            people
        )
    }
}
