//! Session lifecycle transitions.
//!
//! [transition] is pure: it maps the current [SessionState] and one [Input]
//! to the next state plus the [Effect]s the controller has to carry out.
//! Nothing here touches the client, timers or the network.

use super::state::{SessionPhase, SessionState};
use std::time::Duration;

/// Bounded exponential backoff for automatic reconnection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    /// Fixed delay between an explicit restart and the next start
    pub restart_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
            restart_delay: Duration::from_secs(2),
        }
    }
}

impl ReconnectPolicy {
    /// `min(base * 2^(attempt - 1), max)` for a 1-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Events emitted by the messaging client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Qr(String),
    Authenticated,
    AuthFailure(String),
    Ready,
    Disconnected(String),
    Message { from: String, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Initialize a new client. `expected_generation` is set by scheduled
    /// reconnects so a timer that outlived a restart is dropped.
    Start { expected_generation: Option<u64> },
    Restart,
    Lifecycle { generation: u64, event: LifecycleEvent },
    /// Creating or initializing the client failed
    InitFailed { generation: u64, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Destroy and drop the current client, if any
    ReleaseClient,
    CreateClient { generation: u64 },
    /// Feed `Start { expected_generation: Some(generation) }` back after `delay`
    ScheduleStart { delay: Duration, generation: u64 },
    ReconnectExhausted,
    LogIncomingMessage { from: String },
}

/// Computes the next state and the side effects for one input
pub fn transition(
    state: &SessionState,
    input: &Input,
    policy: &ReconnectPolicy,
) -> (SessionState, Vec<Effect>) {
    let mut next = state.clone();

    let effects = match input {
        Input::Start {
            expected_generation,
        } => {
            let stale = expected_generation.is_some_and(|g| g != state.generation);
            if state.initializing || stale {
                return (next, vec![]);
            }

            next.generation = state.generation + 1;
            next.phase = SessionPhase::Initializing;
            next.initializing = true;
            next.ready = false;
            vec![
                Effect::ReleaseClient,
                Effect::CreateClient {
                    generation: next.generation,
                },
            ]
        }
        Input::Restart => {
            // releasing bumps the generation so the old client's events
            // and any pending reconnect timer are ignored from here on
            next = SessionState {
                generation: state.generation + 1,
                ..SessionState::new(policy.max_attempts)
            };
            vec![
                Effect::ReleaseClient,
                Effect::ScheduleStart {
                    delay: policy.restart_delay,
                    generation: next.generation,
                },
            ]
        }
        Input::Lifecycle { generation, .. } | Input::InitFailed { generation, .. }
            if *generation != state.generation =>
        {
            vec![]
        }
        Input::Lifecycle { event, .. } => match event {
            LifecycleEvent::Qr(payload) => {
                next.qr_code = Some(payload.clone());
                next.phase = SessionPhase::AwaitingPairing;
                next.ready = false;
                vec![]
            }
            LifecycleEvent::Authenticated => {
                next.reconnect_attempts = 0;
                next.phase = SessionPhase::Authenticated;
                vec![]
            }
            LifecycleEvent::AuthFailure(reason) => {
                next.phase = SessionPhase::Failed;
                next.ready = false;
                next.initializing = false;
                next.last_error = Some(reason.clone());
                vec![]
            }
            LifecycleEvent::Ready => {
                next.phase = SessionPhase::Ready;
                next.ready = true;
                next.initializing = false;
                next.qr_code = None;
                next.reconnect_attempts = 0;
                next.last_error = None;
                vec![]
            }
            LifecycleEvent::Disconnected(reason) if state.phase.is_connecting_or_connected() => {
                disconnect(&mut next, reason, policy)
            }
            // Failed stays put until a restart, other phases have no live socket to lose
            LifecycleEvent::Disconnected(_) => vec![],
            LifecycleEvent::Message { from, .. } => {
                vec![Effect::LogIncomingMessage { from: from.clone() }]
            }
        },
        Input::InitFailed { reason, .. } if state.phase == SessionPhase::Initializing => {
            disconnect(&mut next, reason, policy)
        }
        // a late failure of `initialize` must not tear down a paired session
        Input::InitFailed { .. } => vec![],
    };

    (next, effects)
}

fn disconnect(next: &mut SessionState, reason: &str, policy: &ReconnectPolicy) -> Vec<Effect> {
    next.phase = SessionPhase::Disconnected;
    next.ready = false;
    next.initializing = false;
    next.last_error = Some(reason.to_string());

    if next.reconnect_attempts >= policy.max_attempts {
        return vec![Effect::ReconnectExhausted];
    }

    next.reconnect_attempts += 1;
    vec![Effect::ScheduleStart {
        delay: policy.delay_for(next.reconnect_attempts),
        generation: next.generation,
    }]
}
