//! # Bridge Client
//!
//! [MessagingClient] implementation that drives a browser-automation
//! WhatsApp client running in a sidecar process over HTTP.
//! The sidecar keeps credentials under `data_dir`, keyed by `client_id`,
//! and posts lifecycle events back to `webhook_url` tagged with the
//! generation this client was created with.

use super::{ClientConnection, ClientFactory, MessageContent, MessagingClient, SentMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub client_id: String,
    pub data_dir: String,
    pub webhook_url: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest<'a> {
    generation: u64,
    webhook_url: &'a str,
    data_dir: &'a str,
}

#[derive(Serialize)]
struct NumberIdRequest<'a> {
    number: &'a str,
}

#[derive(Deserialize)]
struct NumberIdResponse {
    id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendTextRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Client for one sidecar session generation
pub struct BridgeClient {
    /// HTTP client for making sidecar requests
    client: reqwest::Client,
    settings: BridgeSettings,
    generation: u64,
    /// Flipped once by [destroy](MessagingClient::destroy), aborts pending calls
    destroyed: watch::Sender<bool>,
}

impl BridgeClient {
    pub fn new(settings: BridgeSettings, generation: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to build sidecar http client")?;

        Ok(Self {
            client,
            settings,
            generation,
            destroyed: watch::Sender::new(false),
        })
    }

    fn session_url(&self, path: &str) -> String {
        format!(
            "{base}/sessions/{id}{path}",
            base = self.settings.base_url,
            id = self.settings.client_id
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.settings.auth_token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    /// Runs `request` unless the client is destroyed first
    async fn guarded<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        if *self.destroyed.borrow() {
            anyhow::bail!("WhatsApp session generation {} was destroyed", self.generation);
        }

        let mut destroyed = self.destroyed.subscribe();
        let on_destroy = async move {
            let _ = destroyed.wait_for(|is_destroyed| *is_destroyed).await;
        };

        tokio::select! {
            result = request => result,
            _ = on_destroy => anyhow::bail!(
                "WhatsApp session generation {} was destroyed while a call was pending",
                self.generation
            ),
        }
    }

    async fn checked_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());

            anyhow::bail!("Sidecar {what} returned error status {status}: {body}");
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse sidecar {what} response"))
    }
}

#[async_trait]
impl MessagingClient for BridgeClient {
    async fn initialize(&self) -> Result<()> {
        self.guarded(async {
            let body = StartSessionRequest {
                generation: self.generation,
                webhook_url: &self.settings.webhook_url,
                data_dir: &self.settings.data_dir,
            };
            let response = self
                .authorized(self.client.post(self.session_url("/start")))
                .json(&body)
                .send()
                .await
                .context("Failed to start sidecar session")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Sidecar start returned error status {status}: {body}");
            }

            Ok(())
        })
        .await
    }

    async fn destroy(&self) -> Result<()> {
        self.destroyed.send_replace(true);

        let response = self
            .authorized(self.client.delete(self.session_url("")))
            .send()
            .await
            .context("Failed to destroy sidecar session")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Sidecar destroy returned error status {}",
                response.status()
            );
        }

        Ok(())
    }

    async fn get_number_id(&self, address: &str) -> Result<Option<String>> {
        self.guarded(async {
            let response = self
                .authorized(self.client.post(self.session_url("/number-id")))
                .json(&NumberIdRequest { number: address })
                .send()
                .await
                .context("Failed to resolve number id")?;

            let number: NumberIdResponse = Self::checked_json(response, "number-id").await?;
            Ok(number.id)
        })
        .await
    }

    async fn send_message(&self, chat_id: &str, content: &MessageContent) -> Result<SentMessage> {
        self.guarded(async {
            let request = match content {
                MessageContent::Text(text) => self
                    .client
                    .post(self.session_url("/messages"))
                    .json(&SendTextRequest { chat_id, text }),
                MessageContent::Media {
                    data,
                    mime_type,
                    filename,
                    caption,
                } => {
                    let file_part = reqwest::multipart::Part::bytes(data.clone())
                        .file_name(filename.clone())
                        .mime_str(mime_type)?;

                    let mut form = reqwest::multipart::Form::new()
                        .text("chatId", chat_id.to_string())
                        .part("file", file_part);
                    if let Some(caption) = caption {
                        form = form.text("caption", caption.clone());
                    }

                    self.client.post(self.session_url("/media")).multipart(form)
                }
            };

            let response = self
                .authorized(request)
                .send()
                .await
                .context("Failed to send message through sidecar")?;

            Self::checked_json(response, "send").await
        })
        .await
    }

    async fn connection(&self) -> Result<ClientConnection> {
        self.guarded(async {
            let response = self
                .authorized(self.client.get(self.session_url("/state")))
                .send()
                .await
                .context("Failed to query sidecar session state")?;

            Self::checked_json(response, "state").await
        })
        .await
    }
}

/// Creates one [BridgeClient] per initialization attempt
pub struct BridgeClientFactory {
    settings: BridgeSettings,
}

impl BridgeClientFactory {
    pub fn new(settings: BridgeSettings) -> Self {
        Self { settings }
    }
}

impl ClientFactory for BridgeClientFactory {
    fn create(&self, generation: u64) -> Result<Arc<dyn MessagingClient>> {
        Ok(Arc::new(BridgeClient::new(self.settings.clone(), generation)?))
    }
}
