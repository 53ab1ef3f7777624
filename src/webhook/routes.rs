use ntex::web;

/// Configures webhook routes for the WhatsApp sidecar.
///
/// These routes sit outside `/api` and skip the API key check; payloads
/// are authenticated by signature instead.
///
/// # Routes
/// - `POST /webhook/session` - Session lifecycle events
pub fn session(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhook").service((super::session::receive,)));
}
