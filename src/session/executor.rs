//! Retry wrapper for operations against the messaging client.
//!
//! Every attempt first asks a [LivenessProbe] whether the session is really
//! usable; the action only runs against a live session. Retryable failures
//! back off linearly (`backoff * attempt`) until `max_retries` attempts
//! have been made, then the last error is returned.

use async_trait::async_trait;
use derive_more::{Display, Error};
use std::{fmt::Display as FmtDisplay, future::Future, time::Duration};

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[display("WhatsApp client is not ready")]
pub struct SessionNotReady;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_live(&self) -> bool;
}

/// Errors that may go away if the same operation is tried again
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, a value of 0 still makes one attempt
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

pub async fn execute<T, E, P, F, Fut>(probe: &P, policy: RetryPolicy, mut action: F) -> Result<T, E>
where
    P: LivenessProbe + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + From<SessionNotReady> + FmtDisplay,
{
    let attempts = policy.max_retries.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = if probe.is_live().await {
            action().await
        } else {
            Err(E::from(SessionNotReady))
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= attempts {
            return Err(err);
        }

        log::warn!("operation attempt {attempt}/{attempts} failed: {err}, retrying");
        tokio::time::sleep(policy.backoff * attempt).await;
    }
}
