use super::sinks::AudioSink;
use crate::error::AlertError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Plays the alert sound by spawning an external player process
pub struct ProcessAudioSink {
    player: String,
    sound_file: PathBuf,
}

impl ProcessAudioSink {
    pub fn new(player: impl Into<String>, sound_file: impl Into<PathBuf>) -> Self {
        Self {
            player: player.into(),
            sound_file: sound_file.into(),
        }
    }
}

#[async_trait]
impl AudioSink for ProcessAudioSink {
    async fn play(&self) -> Result<(), AlertError> {
        let mut child = Command::new(&self.player)
            .arg(&self.sound_file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AlertError::Audio {
                details: format!("Failed to start '{}': {}", self.player, e),
            })?;

        debug!("Playing {} with {}", self.sound_file.display(), self.player);

        // Reap the player in the background
        let player = self.player.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    warn!("Sound player '{}' exited with {}", player, status)
                }
                Ok(_) => {}
                Err(e) => warn!("Sound player '{}' failed: {}", player, e),
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_player_is_error() {
        let sink = ProcessAudioSink::new("/nonexistent/player-binary", "beep.mp3");
        assert!(matches!(sink.play().await, Err(AlertError::Audio { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_returns_immediately() {
        let sink = ProcessAudioSink::new("true", "ignored.mp3");
        assert!(sink.play().await.is_ok());
    }
}
