//! # API Module
//!
//! HTTP surface of the gateway. Handlers only read the session snapshot and
//! push commands to the session controller; sends go through
//! [messaging::send] so they are liveness checked and retried.
//!
//! ## Modules
//!
//! - [`auth`] - Optional API key check for `/api` routes
//! - [`errors`] - JSON error responses
//! - [`messaging`] - Recipient lookup and message delivery
//! - [`routes`] - Route configuration
//! - [`server`] - Banner, health and service info
//! - [`whatsapp`] - Session status, pairing and send endpoints

pub mod auth;
pub mod errors;
pub mod messaging;
pub mod routes;
pub mod server;
pub mod whatsapp;

use crate::session::{RetryPolicy, SessionHandle};
use std::time::Instant;

pub struct AppState {
    pub session: SessionHandle,
    pub send_policy: RetryPolicy,
    pub api_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub env: String,
    pub is_prod: bool,
    pub started_at: Instant,
}
