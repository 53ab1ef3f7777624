use derive_more::{Display, Error};
use ntex::{http, web};
use serde_json::json;

use super::AppState;
use crate::session::{Retryable, SessionNotReady};

/// Errors returned by every route, rendered as `{success: false, error}`
#[derive(Debug, Display, Error, Clone, PartialEq)]
pub enum ApiError {
    #[display("{_0}")]
    Validation(#[error(not(source))] String),
    #[display("Phone number is not registered on WhatsApp")]
    RecipientNotRegistered,
    #[display("WhatsApp client is not ready")]
    SessionNotReady,
    /// Send failure that may succeed on a later attempt
    #[display("Failed to send message")]
    Transient(#[error(not(source))] String),
    #[display("Unauthorized")]
    Unauthorized,
    #[display("{_0}")]
    NotFound(#[error(not(source))] String),
    #[display("Internal server error")]
    Internal(#[error(not(source))] String),
}

impl ApiError {
    /// Underlying cause, only rendered outside production
    fn details(&self) -> Option<&str> {
        match self {
            ApiError::Transient(details) | ApiError::Internal(details) => Some(details),
            _ => None,
        }
    }
}

impl From<SessionNotReady> for ApiError {
    fn from(_: SessionNotReady) -> Self {
        ApiError::SessionNotReady
    }
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        matches!(self, ApiError::SessionNotReady | ApiError::Transient(_))
    }
}

impl web::error::WebResponseError for ApiError {
    fn error_response(&self, req: &web::HttpRequest) -> web::HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            logfire::error!("Request failed: {error}", error = format!("{self:?}"));
        } else {
            logfire::warn!("Request rejected: {error}", error = format!("{self:?}"));
        }

        let expose_details = req
            .app_state::<AppState>()
            .is_some_and(|app_state| !app_state.is_prod);

        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });
        if let (true, Some(details)) = (expose_details, self.details()) {
            body["details"] = json!(details);
        }

        web::HttpResponse::build(status).json(&body)
    }

    fn status_code(&self) -> http::StatusCode {
        match *self {
            ApiError::Validation(_) | ApiError::RecipientNotRegistered => {
                http::StatusCode::BAD_REQUEST
            }
            ApiError::SessionNotReady => http::StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Unauthorized => http::StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => http::StatusCode::NOT_FOUND,
            ApiError::Transient(_) | ApiError::Internal(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
