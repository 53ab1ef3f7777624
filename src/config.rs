//! Application configuration loaded from the environment.
//!
//! Every value has a default except the optional secrets, so a bare
//! `cargo run` against a local bridge works out of the box.
//!
//! # Security Notes
//! - Sensitive fields are marked and must never be logged
//! - Leaving `API_KEY` unset disables API authentication entirely

use envconfig::Envconfig;
use std::{sync::OnceLock, time::Duration};

use crate::{
    client::bridge::BridgeSettings,
    session::{ReconnectPolicy, RetryPolicy},
};

#[derive(Envconfig, Clone)]
pub struct AppConfig {
    /// Environment name to deploy the app (NON-SENSITIVE)
    /// Values: "local", "dev", "prod"
    #[envconfig(default = "local")]
    pub env: String,

    /// Host address for web server binding (NON-SENSITIVE)
    #[envconfig(default = "0.0.0.0")]
    pub web_server_host: String,

    /// Port for web server binding (NON-SENSITIVE)
    #[envconfig(default = "3000")]
    pub web_server_port: u16,

    /// 🔒 SENSITIVE: shared secret expected in `x-api-key`.
    /// When absent every `/api` route is open.
    pub api_key: Option<String>,

    /// Base url of the browser-automation sidecar that owns the WhatsApp session
    #[envconfig(default = "http://127.0.0.1:3100")]
    pub bridge_url: String,

    /// 🔒 SENSITIVE: bearer token sent to the sidecar
    pub bridge_token: Option<String>,

    /// Per request timeout against the sidecar
    #[envconfig(default = "30")]
    pub bridge_timeout_secs: u64,

    /// Url the sidecar posts lifecycle events to.
    /// Defaults to `http://127.0.0.1:{web_server_port}/webhook/session`
    pub webhook_url: Option<String>,

    /// 🔒 SENSITIVE: HMAC secret used to sign lifecycle webhooks
    pub webhook_secret: Option<String>,

    /// Fixed identifier the sidecar keys persisted credentials with
    #[envconfig(default = "whatsapp-api")]
    pub client_id: String,

    /// Directory the sidecar persists session credentials into
    #[envconfig(default = ".wwebjs_auth")]
    pub session_data_dir: String,

    #[envconfig(default = "5000")]
    pub reconnect_base_ms: u64,

    #[envconfig(default = "30000")]
    pub reconnect_cap_ms: u64,

    #[envconfig(default = "5")]
    pub max_reconnect_attempts: u32,

    #[envconfig(default = "2000")]
    pub restart_delay_ms: u64,

    #[envconfig(default = "3")]
    pub send_max_retries: u32,

    #[envconfig(default = "2000")]
    pub send_backoff_ms: u64,

    /// 🔒 SENSITIVE: Logfire write token, falls back to stdout logging when absent
    pub logfire_token: Option<String>,
}

impl AppConfig {
    /// Checks if running in production environment
    pub fn is_prod(&self) -> bool {
        self.env.to_lowercase() == "prod"
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect_base_ms),
            max_delay: Duration::from_millis(self.reconnect_cap_ms),
            max_attempts: self.max_reconnect_attempts,
            restart_delay: Duration::from_millis(self.restart_delay_ms),
        }
    }

    pub fn send_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.send_max_retries,
            backoff: Duration::from_millis(self.send_backoff_ms),
        }
    }

    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            base_url: self.bridge_url.trim_end_matches('/').to_string(),
            auth_token: self.bridge_token.clone(),
            client_id: self.client_id.clone(),
            data_dir: self.session_data_dir.clone(),
            webhook_url: self.webhook_url.clone().unwrap_or_else(|| {
                format!(
                    "http://127.0.0.1:{port}/webhook/session",
                    port = self.web_server_port
                )
            }),
            timeout: Duration::from_secs(self.bridge_timeout_secs),
        }
    }
}

/// Global application configuration, set once by [init_config]
pub static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Loads [AppConfig] from the environment into [APP_CONFIG]
pub fn init_config() -> anyhow::Result<()> {
    let app_config = AppConfig::init_from_env()?;
    APP_CONFIG
        .set(app_config)
        .map_err(|_| anyhow::anyhow!("app config was already initialized"))
}
