//! Boundary with the browser-automation WhatsApp client.
//!
//! The client itself is opaque: the gateway only decides when it is
//! created, initialized and destroyed, and guards calls into it.
//!
//! ## Submodules
//!
//! - [`bridge`] - [MessagingClient] backed by an HTTP sidecar that runs the client

pub mod bridge;

use crate::consts;
use async_trait::async_trait;
use std::sync::Arc;

/// Content of an outbound message
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Media {
        data: Vec<u8>,
        mime_type: String,
        filename: String,
        caption: Option<String>,
    },
}

/// Transport liveness and connection state, read in one round trip
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConnection {
    /// Whether the automation transport page is still open
    #[serde(default)]
    pub page_open: bool,
    /// Connection state as reported by the client, e.g. `CONNECTED`
    pub state: Option<String>,
}

impl ClientConnection {
    pub fn is_connected(&self) -> bool {
        self.page_open && self.state.as_deref() == Some(consts::CLIENT_CONNECTED_STATE)
    }
}

/// Acknowledgement returned by the client for a sent message
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct SentMessage {
    pub id: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Launches the underlying session. Lifecycle events are delivered
    /// out of band while this is pending.
    async fn initialize(&self) -> anyhow::Result<()>;

    /// Tears the session down. Outstanding calls on this client must fail promptly.
    async fn destroy(&self) -> anyhow::Result<()>;

    /// Resolves an address to the chat id of a registered account
    async fn get_number_id(&self, address: &str) -> anyhow::Result<Option<String>>;

    async fn send_message(
        &self,
        chat_id: &str,
        content: &MessageContent,
    ) -> anyhow::Result<SentMessage>;

    async fn connection(&self) -> anyhow::Result<ClientConnection>;
}

/// Builds a fresh client for every initialization attempt
#[cfg_attr(test, mockall::automock)]
pub trait ClientFactory: Send + Sync {
    /// `generation` identifies the client; lifecycle events must carry it back
    fn create(&self, generation: u64) -> anyhow::Result<Arc<dyn MessagingClient>>;
}
