use derive_more::Display;
use serde::Serialize;

/// Lifecycle phase of the messaging session
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    #[display("idle")]
    Idle,
    #[display("initializing")]
    Initializing,
    #[display("awaiting_pairing")]
    AwaitingPairing,
    #[display("authenticated")]
    Authenticated,
    #[display("ready")]
    Ready,
    #[display("disconnected")]
    Disconnected,
    #[display("failed")]
    Failed,
}

/// Snapshot of the session as seen by request handlers.
///
/// `ready` and `initializing` are never both true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub ready: bool,
    pub initializing: bool,
    /// Last pairing payload, cleared once the session is ready
    pub qr_code: Option<String>,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    /// Id of the current client; events from other generations are stale
    pub generation: u64,
    /// Reason of the last disconnection or failure
    pub last_error: Option<String>,
}

impl SessionPhase {
    /// Phases in which the client holds a socket that can drop
    pub fn is_connecting_or_connected(self) -> bool {
        matches!(
            self,
            SessionPhase::AwaitingPairing | SessionPhase::Authenticated | SessionPhase::Ready
        )
    }
}

impl SessionState {
    pub fn new(max_reconnect_attempts: u32) -> Self {
        Self {
            max_reconnect_attempts,
            ..Default::default()
        }
    }

    /// True once automatic reconnection has given up
    pub fn reconnect_exhausted(&self) -> bool {
        self.phase == SessionPhase::Disconnected
            && self.reconnect_attempts >= self.max_reconnect_attempts
    }
}
