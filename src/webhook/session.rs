//! Lifecycle events pushed by the sidecar
//!
//! Every event carries the generation of the client that emitted it, so the
//! controller can drop events from a client it already released.

use log::info;
use ntex::{util::Bytes, web};
use serde::Deserialize;
use serde_json::json;

use super::security;
use crate::{
    api::{AppState, errors::ApiError},
    consts,
    session::LifecycleEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    Qr,
    Authenticated,
    AuthFailure,
    Ready,
    Disconnected,
    Message,
}

#[derive(Debug, Deserialize)]
pub struct SessionWebhook {
    pub generation: u64,
    pub event: SessionEventKind,
    #[serde(default)]
    pub qr: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl SessionWebhook {
    pub fn to_event(&self) -> Result<LifecycleEvent, ApiError> {
        let reason = || self.reason.clone().unwrap_or_else(|| "unknown".to_string());

        Ok(match self.event {
            SessionEventKind::Qr => LifecycleEvent::Qr(
                self.qr
                    .clone()
                    .ok_or_else(|| ApiError::Validation("qr event without payload".into()))?,
            ),
            SessionEventKind::Authenticated => LifecycleEvent::Authenticated,
            SessionEventKind::AuthFailure => LifecycleEvent::AuthFailure(reason()),
            SessionEventKind::Ready => LifecycleEvent::Ready,
            SessionEventKind::Disconnected => LifecycleEvent::Disconnected(reason()),
            SessionEventKind::Message => LifecycleEvent::Message {
                from: self.from.clone().unwrap_or_default(),
                body: self.body.clone().unwrap_or_default(),
            },
        })
    }
}

/// Webhook receiver (POST), signature checked when a secret is configured
#[web::post("/session")]
pub async fn receive(
    req: web::HttpRequest,
    body: Bytes,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    if let Some(secret) = app_state.webhook_secret.as_deref() {
        let signature = req
            .headers()
            .get(consts::WEBHOOK_SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if !security::verify_signature(signature, &body, secret) {
            return Err(ApiError::Unauthorized.into());
        }
    }

    let payload: SessionWebhook = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("invalid session webhook: {e}")))?;

    info!(
        "session webhook: event={event:?} generation={generation}",
        event = payload.event,
        generation = payload.generation
    );

    let event = payload.to_event()?;
    app_state
        .session
        .dispatch(payload.generation, event)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(web::HttpResponse::Ok().json(&json!({ "status": "received" })))
}
