use crate::error::AlertError;
use crate::frame::encode_jpeg;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

const SNAPSHOT_QUALITY: u8 = 90;

/// Persists alert snapshots
#[async_trait]
pub trait ImageSink: Send + Sync {
    /// Store `image` and return where it went
    async fn save(
        &self,
        image: Arc<RgbImage>,
        label: &str,
        at: SystemTime,
    ) -> Result<PathBuf, AlertError>;
}

/// Delivers a notification with optional text and image
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, text: Option<&str>, image: Option<&Path>) -> Result<(), AlertError>;
}

/// Starts playback of the alert sound without waiting for it to finish
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self) -> Result<(), AlertError>;
}

/// Writes JPEG snapshots as `<label>_<local time>.jpg` into a directory
pub struct JpegImageSink {
    dir: PathBuf,
    timezone: Tz,
}

impl JpegImageSink {
    pub fn new(dir: impl Into<PathBuf>, timezone: Tz) -> Self {
        Self {
            dir: dir.into(),
            timezone,
        }
    }

    pub fn file_name(&self, label: &str, at: SystemTime) -> String {
        let local = DateTime::<Utc>::from(at).with_timezone(&self.timezone);
        let safe: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("{}_{}.jpg", safe, local.format("%Y%m%d_%H%M%S%.3f"))
    }
}

#[async_trait]
impl ImageSink for JpegImageSink {
    async fn save(
        &self,
        image: Arc<RgbImage>,
        label: &str,
        at: SystemTime,
    ) -> Result<PathBuf, AlertError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AlertError::ImageSink {
                details: format!("Failed to create {}: {}", self.dir.display(), e),
            })?;

        let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(&image, SNAPSHOT_QUALITY))
            .await
            .map_err(|e| AlertError::ImageSink {
                details: format!("Encode task failed: {}", e),
            })?
            .map_err(|e| AlertError::ImageSink {
                details: format!("JPEG encoding failed: {}", e),
            })?;

        let path = self.dir.join(self.file_name(label, at));
        tokio::fs::write(&path, &jpeg)
            .await
            .map_err(|e| AlertError::ImageSink {
                details: format!("Failed to write {}: {}", path.display(), e),
            })?;

        debug!("Saved alert snapshot {} ({} bytes)", path.display(), jpeg.len());
        Ok(path)
    }
}

/// Resolve configured timezone, falling back to UTC on parse errors
pub fn resolve_timezone(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!("Invalid timezone '{}', falling back to UTC", name);
            chrono_tz::UTC
        }
    }
}
