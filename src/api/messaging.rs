//! Outbound delivery through the safe executor.
//!
//! A send resolves the recipient's chat id first and refuses unregistered
//! numbers without retrying; bridge failures are retried as transient.

use super::errors::ApiError;
use crate::{
    client::{MessageContent, SentMessage},
    metric,
    phone::NormalizedAddress,
    session::{RetryPolicy, SessionHandle, executor},
};

/// One outbound message, built per API call
#[derive(Debug, Clone)]
pub struct OutboundSendRequest {
    pub address: NormalizedAddress,
    pub content: MessageContent,
}

pub async fn send(
    session: &SessionHandle,
    policy: RetryPolicy,
    request: &OutboundSendRequest,
) -> Result<SentMessage, ApiError> {
    let result = executor::execute(session, policy, || deliver(session, request)).await;

    metric::incr_send_statds(match &result {
        Ok(_) => "sent",
        Err(ApiError::RecipientNotRegistered) => "not_registered",
        Err(ApiError::SessionNotReady) => "not_ready",
        Err(_) => "failed",
    });

    result
}

async fn deliver(
    session: &SessionHandle,
    request: &OutboundSendRequest,
) -> Result<SentMessage, ApiError> {
    // the client can be swapped between the probe and this point
    let client = session
        .current_client()
        .await
        .ok_or(ApiError::SessionNotReady)?;

    let chat_id = client
        .get_number_id(request.address.as_str())
        .await
        .map_err(|e| ApiError::Transient(format!("number lookup failed: {e}")))?
        .ok_or(ApiError::RecipientNotRegistered)?;

    client
        .send_message(&chat_id, &request.content)
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::testing,
        client::{MessagingClient, MockMessagingClient, testing::connected},
        phone,
    };
    use std::sync::Arc;

    fn connected_client() -> MockMessagingClient {
        let mut client = MockMessagingClient::new();
        client.expect_connection().returning(|| Ok(connected()));
        client
    }

    fn text_request() -> OutboundSendRequest {
        OutboundSendRequest {
            address: phone::normalize("+1 (234) 567-8901").unwrap(),
            content: MessageContent::Text("hi".into()),
        }
    }

    #[ntex::test]
    async fn test_unregistered_recipient_is_not_retried() {
        let mut client = connected_client();
        client
            .expect_get_number_id()
            .times(1)
            .returning(|_| Ok(None));
        client.expect_send_message().never();
        let client: Arc<dyn MessagingClient> = Arc::new(client);
        let (app_state, _commands) = testing::app_state(testing::ready_state(), Some(client));

        let result = send(&app_state.session, app_state.send_policy, &text_request()).await;

        assert_eq!(result, Err(ApiError::RecipientNotRegistered));
    }

    #[ntex::test]
    async fn test_transient_send_failure_is_retried() {
        let mut client = connected_client();
        client
            .expect_get_number_id()
            .times(2)
            .returning(|_| Ok(Some("12345678901@c.us".to_string())));
        let mut seq = mockall::Sequence::new();
        client
            .expect_send_message()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(anyhow::anyhow!("evaluation failed")));
        client
            .expect_send_message()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Ok(SentMessage {
                    id: "true_12345678901@c.us_3EB0".to_string(),
                })
            });
        let client: Arc<dyn MessagingClient> = Arc::new(client);
        let (app_state, _commands) = testing::app_state(testing::ready_state(), Some(client));

        let sent = send(&app_state.session, app_state.send_policy, &text_request())
            .await
            .unwrap();

        assert_eq!(sent.id, "true_12345678901@c.us_3EB0");
    }
}
