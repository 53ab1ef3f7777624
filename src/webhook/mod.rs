//! Webhook handlers for the browser-automation sidecar
//!
//! ## Modules
//!
//! - [`session`] - Lifecycle events of the WhatsApp session
//! - [`security`] - HMAC signature verification

pub mod routes;
pub mod security;
pub mod session;
