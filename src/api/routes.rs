//! Route configuration for the HTTP API.

use super::{server, whatsapp};
use ntex::web;

/// Configures the WhatsApp session routes.
///
/// Every route requires the API key when one is configured.
///
/// # Routes
/// - `GET /api/whatsapp/status` - Session state and live connection check
/// - `GET /api/whatsapp/qr` - Pending pairing code
/// - `POST /api/whatsapp/send-text` - Send a text message
/// - `POST /api/whatsapp/send-image` - Send a local image with optional caption
/// - `POST /api/whatsapp/restart` - Recreate the client
pub fn whatsapp(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api/whatsapp").service((
        whatsapp::status,
        whatsapp::qr,
        whatsapp::send_text,
        whatsapp::send_image,
        whatsapp::restart,
    )));
}

/// # Routes
/// - `GET /` - Banner
/// - `GET /health` - Liveness of the process
/// - `GET /api/info` - Service metadata, requires the API key
pub fn server(cfg: &mut web::ServiceConfig) {
    cfg.service((server::index, server::health, server::info));
}
