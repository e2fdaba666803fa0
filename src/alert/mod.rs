//! Per-source alert cooldown and asynchronous delivery

mod audio;
mod dispatcher;
mod sinks;
mod telegram;
mod worker;


pub use audio::ProcessAudioSink;
pub use dispatcher::{AlertCounters, AlertDecision, AlertDispatcher, AlertJob, AlertPayload};
pub use sinks::{resolve_timezone, AudioSink, ImageSink, JpegImageSink, MessageSink};
pub use telegram::TelegramSink;
pub use worker::{AlertSinks, AlertWorker};

use crate::config::{AlertConfig, CameraDescriptor};
use std::sync::Arc;
use tracing::{info, warn};

/// Build the transports the configured cameras actually ask for
pub fn sinks_from_config(config: &AlertConfig, cameras: &[CameraDescriptor]) -> AlertSinks {
    let wants = |f: fn(&CameraDescriptor) -> bool| cameras.iter().any(f);
    let timezone = resolve_timezone(&config.timezone);
    let mut sinks = AlertSinks::default();

    // Messages attach the saved snapshot, so the image sink is needed for either
    if wants(|c| c.features.save_images || c.features.send_message) {
        sinks.image = Some(Arc::new(JpegImageSink::new(&config.image_dir, timezone)));
    }

    if wants(|c| c.features.sound_alert) {
        sinks.audio = Some(Arc::new(ProcessAudioSink::new(
            config.sound_player.clone(),
            config.sound_file.clone(),
        )));
    }

    if wants(|c| c.features.send_message) {
        match TelegramSink::from_env(config) {
            Ok(sink) => {
                info!("Telegram alerts enabled");
                sinks.message = Some(Arc::new(sink));
            }
            Err(e) => warn!("Messaging disabled: {}", e),
        }
    }

    sinks
}
