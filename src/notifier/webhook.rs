use async_trait::async_trait;

use crate::{
    config::NotifierConfig,
    error::{AppError, Result},
    notifier::{Notification, Notifier},
};

/// Posts notification requests to the platform's delivery service as JSON.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    enabled: bool,
}

impl WebhookNotifier {
    pub fn new(config: &NotifierConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        config.webhook_url.as_ref().map(|url| Self {
            client: reqwest::Client::new(),
            url: url.clone(),
            enabled: true,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn notify(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| AppError::Notification(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Notification(format!(
                "Delivery service returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
