//! Handlers not linked to the WhatsApp session routes

use chrono::Utc;
use ntex::web;
use serde_json::json;

use super::{AppState, auth::ApiKey, errors::ApiError};
use crate::consts;

#[web::get("/")]
pub async fn index(app_state: web::types::State<AppState>) -> impl web::Responder {
    let state = app_state.session.snapshot();

    web::HttpResponse::Ok().json(&json!({
        "message": format!("{} is running", consts::SERVICE_NAME),
        "version": consts::SERVICE_VERSION,
        "connected": state.ready,
        "reconnectAttempts": state.reconnect_attempts,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Answers while the process is up, whatever the session state
#[web::get("/health")]
pub async fn health(app_state: web::types::State<AppState>) -> impl web::Responder {
    web::HttpResponse::Ok().json(&json!({
        "status": "ok",
        "uptime": app_state.started_at.elapsed().as_secs(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[web::get("/api/info")]
pub async fn info(_: ApiKey, app_state: web::types::State<AppState>) -> impl web::Responder {
    let state = app_state.session.snapshot();

    web::HttpResponse::Ok().json(&json!({
        "name": consts::SERVICE_NAME,
        "version": consts::SERVICE_VERSION,
        "environment": app_state.env,
        "authEnabled": app_state.api_key.is_some(),
        "whatsapp": {
            "connected": state.ready,
            "state": state.phase,
            "reconnectAttempts": state.reconnect_attempts,
            "maxReconnectAttempts": state.max_reconnect_attempts,
        },
    }))
}

/// Return a [NotFound](ApiError::NotFound) error for urls not defined
pub async fn not_found() -> Result<web::HttpResponse, web::Error> {
    Err(ApiError::NotFound("Endpoint not found".into()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{routes, testing};
    use ntex::{http::StatusCode, web::test};

    #[ntex::test]
    async fn test_health_is_up_without_session() {
        let (app_state, _commands) = testing::app_state(crate::session::SessionState::new(5), None);
        let app = test::init_service(web::App::new().state(app_state).configure(routes::server))
            .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request())
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[ntex::test]
    async fn test_unknown_route_is_json_404() {
        let (app_state, _commands) = testing::app_state(testing::ready_state(), None);
        let app = test::init_service(
            web::App::new()
                .state(app_state)
                .configure(routes::server)
                .default_service(web::route().to(not_found)),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/nope").to_request(),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        assert_eq!(body["success"], false);
    }

    #[ntex::test]
    async fn test_info_requires_configured_key() {
        let (mut app_state, _commands) = testing::app_state(testing::ready_state(), None);
        app_state.api_key = Some("s3cret".into());
        let app = test::init_service(web::App::new().state(app_state).configure(routes::server))
            .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/info").to_request())
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/info")
                .header("x-api-key", "s3cret")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
