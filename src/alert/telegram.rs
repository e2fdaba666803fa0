use super::sinks::MessageSink;
use crate::config::AlertConfig;
use crate::error::AlertError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Telegram bot delivery: `sendPhoto` with caption when an image is
/// attached, `sendMessage` otherwise
pub struct TelegramSink {
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Result<Self, AlertError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AlertError::Messaging {
                details: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    /// Credentials come from the environment variables named in the config
    pub fn from_env(config: &AlertConfig) -> Result<Self, AlertError> {
        let token = std::env::var(&config.bot_token_env).map_err(|_| AlertError::NotConfigured {
            details: format!("{} is not set", config.bot_token_env),
        })?;
        let chat_id = std::env::var(&config.chat_id_env).map_err(|_| AlertError::NotConfigured {
            details: format!("{} is not set", config.chat_id_env),
        })?;

        Self::new(config.telegram_api.clone(), token, chat_id)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn check(response: reqwest::Response) -> Result<(), AlertError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(AlertError::Messaging {
            details: format!("Telegram returned {}: {}", status, body),
        })
    }
}

// reqwest errors embed the request URL, which carries the bot token
fn transport_error(e: reqwest::Error) -> AlertError {
    AlertError::Messaging {
        details: e.without_url().to_string(),
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn send(&self, text: Option<&str>, image: Option<&Path>) -> Result<(), AlertError> {
        match (text, image) {
            (_, Some(path)) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| AlertError::Messaging {
                    details: format!("Image {} unreadable: {}", path.display(), e),
                })?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "alert.jpg".to_string());

                let mut form = Form::new().text("chat_id", self.chat_id.clone()).part(
                    "photo",
                    Part::bytes(bytes)
                        .file_name(file_name)
                        .mime_str("image/jpeg")
                        .map_err(transport_error)?,
                );
                if let Some(caption) = text {
                    form = form.text("caption", caption.to_string());
                }

                let response = self
                    .client
                    .post(self.method_url("sendPhoto"))
                    .multipart(form)
                    .send()
                    .await
                    .map_err(transport_error)?;
                Self::check(response).await?;
                debug!("Telegram photo sent ({})", path.display());
                Ok(())
            }
            (Some(text), None) => {
                let response = self
                    .client
                    .post(self.method_url("sendMessage"))
                    .json(&serde_json::json!({ "chat_id": self.chat_id, "text": text }))
                    .send()
                    .await
                    .map_err(transport_error)?;
                Self::check(response).await?;
                debug!("Telegram message sent");
                Ok(())
            }
            (None, None) => Err(AlertError::Messaging {
                details: "Must provide either text or an image".to_string(),
            }),
        }
    }
}
