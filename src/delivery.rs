use crate::config::Settings;
use crate::error::{HandlerError, Result};
use crate::payload::MessagePayload;
use reqwest::blocking::Client;
use reqwest::{Proxy, Url};
use std::time::Duration;
use tracing::debug;

/// Blocking client bound to one webhook endpoint.
pub struct WebhookClient {
    client: Client,
    url:    Url,
}

impl WebhookClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let url = settings.webhook_url()?;

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .https_only(!settings.allow_insecure);

        if let Some((addr, port)) = settings.proxy()? {
            let proxy = Proxy::all(format!("http://{}:{}", addr, port)).map_err(|e| {
                HandlerError::Configuration(format!("invalid proxy {}:{}: {}", addr, port, e))
            })?;
            debug!(proxy = %format!("{}:{}", addr, port), "Routing webhook traffic through proxy");
            builder = builder.proxy(proxy);
        }

        let client = builder.build()
            .map_err(|e| HandlerError::Configuration(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// POST one payload. Any non-2xx answer or transport fault is a `Delivery` error.
    pub fn deliver(&self, payload: &MessagePayload) -> Result<()> {
        let delivery_error = |status: Option<u16>, detail: String| HandlerError::Delivery {
            channel: payload.channel.clone(),
            status,
            detail,
        };

        let response = self.client
            .post(self.url.clone())
            .json(payload)
            .send()
            .map_err(|e| delivery_error(None, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "Webhook accepted payload");
            return Ok(());
        }

        let body = response.text().unwrap_or_else(|_| "Failed to read error body".to_string());
        let detail = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("no response body").to_string()
        } else {
            body.trim().to_string()
        };
        Err(delivery_error(Some(status.as_u16()), detail))
    }
}
