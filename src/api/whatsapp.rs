//! WhatsApp session endpoints mounted under `/api/whatsapp`

use chrono::Utc;
use log::info;
use ntex::{util::Bytes, web};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use std::path::Path;

use super::{
    AppState,
    auth::ApiKey,
    errors::ApiError,
    messaging::{self, OutboundSendRequest},
};
use crate::{client::MessageContent, consts, phone, session::SessionPhase};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub connected: bool,
    pub client_ready: bool,
    pub qr_code: Option<String>,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    /// Automatic reconnection gave up, only a restart recovers
    pub reconnect_exhausted: bool,
    pub is_initializing: bool,
    pub state: SessionPhase,
    pub last_error: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextRequest {
    pub phone_number: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendImageRequest {
    pub phone_number: Option<String>,
    pub image_path: Option<String>,
    pub caption: Option<String>,
}

/// Malformed bodies get the same JSON error shape as any other bad input
fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Validation(format!("Invalid JSON body: {e}")))
}

/// Empty strings count as missing
fn required<'a>(value: &'a Option<String>) -> Option<&'a str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn normalize_recipient(raw: &str) -> Result<phone::NormalizedAddress, ApiError> {
    phone::normalize(raw).ok_or_else(|| ApiError::Validation("Invalid phone number format".into()))
}

/// Mime type for the accepted image extensions, case insensitive
pub fn image_mime_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    consts::ACCEPTED_IMAGE_EXTENSIONS
        .iter()
        .find(|(accepted, _)| *accepted == extension)
        .map(|(_, mime)| *mime)
}

fn sent_response(message_id: String) -> web::HttpResponse {
    web::HttpResponse::Ok().json(&json!({
        "success": true,
        "messageId": message_id,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Session snapshot plus a live check against the client
#[web::get("/status")]
pub async fn status(
    _: ApiKey,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    let state = app_state.session.snapshot();
    let connected = app_state.session.is_actually_ready().await;
    let reconnect_exhausted = state.reconnect_exhausted();

    Ok(web::HttpResponse::Ok().json(&StatusResponse {
        connected,
        client_ready: state.ready,
        qr_code: state.qr_code,
        reconnect_attempts: state.reconnect_attempts,
        max_reconnect_attempts: state.max_reconnect_attempts,
        reconnect_exhausted,
        is_initializing: state.initializing,
        state: state.phase,
        last_error: state.last_error,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// Latest pairing payload, rendering it as an image is left to the caller
#[web::get("/qr")]
pub async fn qr(
    _: ApiKey,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    let state = app_state.session.snapshot();

    if let Some(qr_code) = state.qr_code {
        return Ok(web::HttpResponse::Ok().json(&json!({
            "success": true,
            "qrCode": qr_code,
            "message": "Scan this QR code with WhatsApp",
        })));
    }

    if state.ready {
        return Ok(web::HttpResponse::Ok().json(&json!({
            "success": true,
            "qrCode": null,
            "message": "WhatsApp is already connected",
        })));
    }

    Err(ApiError::NotFound("QR code not available yet, try again shortly".into()).into())
}

#[web::post("/send-text")]
pub async fn send_text(
    _: ApiKey,
    app_state: web::types::State<AppState>,
    body: Bytes,
) -> Result<impl web::Responder, web::Error> {
    let body: SendTextRequest = parse_json(&body)?;
    let (Some(phone_number), Some(message)) =
        (required(&body.phone_number), required(&body.message))
    else {
        return Err(ApiError::Validation("phoneNumber and message are required".into()).into());
    };

    let request = OutboundSendRequest {
        address: normalize_recipient(phone_number)?,
        content: MessageContent::Text(message.to_string()),
    };

    let sent = messaging::send(&app_state.session, app_state.send_policy, &request).await?;
    info!("text message sent to {address}", address = request.address);

    Ok(sent_response(sent.id))
}

#[web::post("/send-image")]
pub async fn send_image(
    _: ApiKey,
    app_state: web::types::State<AppState>,
    body: Bytes,
) -> Result<impl web::Responder, web::Error> {
    let body: SendImageRequest = parse_json(&body)?;
    let (Some(phone_number), Some(image_path)) =
        (required(&body.phone_number), required(&body.image_path))
    else {
        return Err(ApiError::Validation("phoneNumber and imagePath are required".into()).into());
    };
    let address = normalize_recipient(phone_number)?;

    let path = Path::new(image_path);
    let is_file = tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_file());
    if !is_file {
        return Err(ApiError::Validation(format!("Image file not found: {image_path}")).into());
    }

    let mime_type = image_mime_type(path).ok_or_else(|| {
        ApiError::Validation("Unsupported image type, use png, jpg, jpeg, gif or webp".into())
    })?;

    let data = tokio::fs::read(path)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to read {image_path}: {e}")))?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image")
        .to_string();

    let request = OutboundSendRequest {
        address,
        content: MessageContent::Media {
            data,
            mime_type: mime_type.to_string(),
            filename,
            caption: required(&body.caption).map(str::to_string),
        },
    };

    let sent = messaging::send(&app_state.session, app_state.send_policy, &request).await?;
    info!("image sent to {address}", address = request.address);

    Ok(sent_response(sent.id))
}

/// Tears the client down and initializes a new one in the background
#[web::post("/restart")]
pub async fn restart(
    _: ApiKey,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    app_state
        .session
        .restart()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("WhatsApp client restart requested");

    Ok(web::HttpResponse::Ok().json(&json!({
        "success": true,
        "message": "WhatsApp client restart initiated",
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::{routes, testing},
        client::{MessagingClient, MockMessagingClient, SentMessage, testing::connected},
        session::{SessionState, controller::Command, machine::Input},
    };
    use ntex::{
        http::StatusCode,
        web::{WebResponse, test},
    };
    use std::{io::Write, sync::Arc};

    fn connected_client() -> MockMessagingClient {
        let mut client = MockMessagingClient::new();
        client.expect_connection().returning(|| Ok(connected()));
        client
    }

    async fn call(app_state: AppState, req: test::TestRequest) -> WebResponse {
        let app =
            test::init_service(web::App::new().state(app_state).configure(routes::whatsapp)).await;
        test::call_service(&app, req.to_request()).await
    }

    async fn json_body(resp: WebResponse) -> serde_json::Value {
        serde_json::from_slice(&test::read_body(resp).await).unwrap()
    }

    #[test]
    fn test_image_mime_type_from_extension() {
        assert_eq!(image_mime_type(Path::new("/tmp/a.PNG")), Some("image/png"));
        assert_eq!(image_mime_type(Path::new("cat.jpeg")), Some("image/jpeg"));
        assert_eq!(image_mime_type(Path::new("doc.pdf")), None);
        assert_eq!(image_mime_type(Path::new("noext")), None);
    }

    #[ntex::test]
    async fn test_send_text_when_ready_returns_message_id() {
        let mut client = connected_client();
        client
            .expect_get_number_id()
            .withf(|address| address == "+12345678901@c.us")
            .returning(|_| Ok(Some("12345678901@c.us".to_string())));
        client
            .expect_send_message()
            .withf(|chat_id, content| {
                chat_id == "12345678901@c.us" && *content == MessageContent::Text("hi".into())
            })
            .times(1)
            .returning(|_, _| {
                Ok(SentMessage {
                    id: "true_12345678901@c.us_3EB0C767D0".to_string(),
                })
            });
        let client: Arc<dyn MessagingClient> = Arc::new(client);
        let (app_state, _commands) = testing::app_state(testing::ready_state(), Some(client));

        let resp = call(
            app_state,
            test::TestRequest::post()
                .uri("/api/whatsapp/send-text")
                .set_json(&json!({"phoneNumber": "+1 (234) 567-8901", "message": "hi"})),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["messageId"], "true_12345678901@c.us_3EB0C767D0");
    }

    #[ntex::test]
    async fn test_malformed_json_body_returns_json_error() {
        let mut client = MockMessagingClient::new();
        client.expect_connection().never();
        client.expect_send_message().never();
        let client: Arc<dyn MessagingClient> = Arc::new(client);

        for uri in ["/api/whatsapp/send-text", "/api/whatsapp/send-image"] {
            let (app_state, _commands) =
                testing::app_state(testing::ready_state(), Some(client.clone()));
            let resp = call(
                app_state,
                test::TestRequest::post()
                    .uri(uri)
                    .header("content-type", "application/json")
                    .set_payload("{not json"),
            )
            .await;

            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body = json_body(resp).await;
            assert_eq!(body["success"], false);
            assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
        }
    }

    #[ntex::test]
    async fn test_send_text_when_not_ready_returns_503() {
        let (app_state, _commands) = testing::app_state(SessionState::new(5), None);

        let resp = call(
            app_state,
            test::TestRequest::post()
                .uri("/api/whatsapp/send-text")
                .set_json(&json!({"phoneNumber": "+1 (234) 567-8901", "message": "hi"})),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "WhatsApp client is not ready");
    }

    #[ntex::test]
    async fn test_send_text_rejects_bad_input() {
        let (app_state, _commands) = testing::app_state(testing::ready_state(), None);
        let resp = call(
            app_state,
            test::TestRequest::post()
                .uri("/api/whatsapp/send-text")
                .set_json(&json!({"phoneNumber": "12345", "message": "hi"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let (app_state, _commands) = testing::app_state(testing::ready_state(), None);
        let resp = call(
            app_state,
            test::TestRequest::post()
                .uri("/api/whatsapp/send-text")
                .set_json(&json!({"phoneNumber": "+12345678901"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[ntex::test]
    async fn test_send_image_missing_file_fails_before_client() {
        let mut client = MockMessagingClient::new();
        client.expect_connection().never();
        client.expect_get_number_id().never();
        client.expect_send_message().never();
        let client: Arc<dyn MessagingClient> = Arc::new(client);
        let (app_state, _commands) = testing::app_state(testing::ready_state(), Some(client));

        let resp = call(
            app_state,
            test::TestRequest::post()
                .uri("/api/whatsapp/send-image")
                .set_json(&json!({
                    "phoneNumber": "+12345678901",
                    "imagePath": "/definitely/not/here.png",
                })),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["success"], false);
    }

    #[ntex::test]
    async fn test_send_image_uploads_file_with_caption() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"\x89PNG fake").unwrap();

        let mut client = connected_client();
        client
            .expect_get_number_id()
            .returning(|_| Ok(Some("12345678901@c.us".to_string())));
        client
            .expect_send_message()
            .withf(|_, content| {
                matches!(
                    content,
                    MessageContent::Media { data, mime_type, caption, .. }
                        if data.as_slice() == b"\x89PNG fake"
                            && mime_type == "image/png"
                            && caption.as_deref() == Some("look")
                )
            })
            .returning(|_, _| {
                Ok(SentMessage {
                    id: "true_media".to_string(),
                })
            });
        let client: Arc<dyn MessagingClient> = Arc::new(client);
        let (app_state, _commands) = testing::app_state(testing::ready_state(), Some(client));

        let resp = call(
            app_state,
            test::TestRequest::post()
                .uri("/api/whatsapp/send-image")
                .set_json(&json!({
                    "phoneNumber": "+12345678901",
                    "imagePath": file.path().to_str().unwrap(),
                    "caption": "look",
                })),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["messageId"], "true_media");
    }

    #[ntex::test]
    async fn test_qr_returns_pending_code_or_404() {
        let pairing = SessionState {
            phase: SessionPhase::AwaitingPairing,
            initializing: true,
            qr_code: Some("2@abc,def".to_string()),
            ..SessionState::new(5)
        };
        let (app_state, _commands) = testing::app_state(pairing, None);
        let resp = call(app_state, test::TestRequest::get().uri("/api/whatsapp/qr")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["qrCode"], "2@abc,def");

        let (app_state, _commands) = testing::app_state(SessionState::new(5), None);
        let resp = call(app_state, test::TestRequest::get().uri("/api/whatsapp/qr")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[ntex::test]
    async fn test_status_reports_snapshot() {
        let (app_state, _commands) = testing::app_state(testing::ready_state(), None);

        let resp = call(app_state, test::TestRequest::get().uri("/api/whatsapp/status")).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["clientReady"], true);
        // no live client behind the ready flag
        assert_eq!(body["connected"], false);
        assert_eq!(body["state"], "ready");
        assert_eq!(body["isInitializing"], false);
        assert_eq!(body["reconnectExhausted"], false);
    }

    #[ntex::test]
    async fn test_status_reports_exhausted_reconnects() {
        let exhausted = SessionState {
            phase: SessionPhase::Disconnected,
            qr_code: Some("2@stale".to_string()),
            reconnect_attempts: 5,
            last_error: Some("NAVIGATION".to_string()),
            ..SessionState::new(5)
        };
        let (app_state, _commands) = testing::app_state(exhausted, None);

        let resp = call(app_state, test::TestRequest::get().uri("/api/whatsapp/status")).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["reconnectExhausted"], true);
        assert_eq!(body["qrCode"], "2@stale");
        assert_eq!(body["lastError"], "NAVIGATION");
        assert_eq!(body["state"], "disconnected");
    }

    #[ntex::test]
    async fn test_restart_queues_command_and_responds_immediately() {
        let (app_state, mut commands) = testing::app_state(testing::ready_state(), None);

        let resp = call(app_state, test::TestRequest::post().uri("/api/whatsapp/restart")).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(matches!(
            commands.try_recv(),
            Ok(Command::Input(Input::Restart))
        ));
    }
}
