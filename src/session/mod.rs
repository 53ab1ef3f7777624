//! WhatsApp session lifecycle
//!
//! ## Modules
//!
//! - [`state`] - Observable session snapshot
//! - [`machine`] - Pure lifecycle transitions and reconnect backoff
//! - [`scheduler`] - Delayed tasks for reconnects and restarts
//! - [`controller`] - Single owner of the client, drives [machine::transition]
//! - [`executor`] - Liveness-checked retries for client operations

pub mod controller;
pub mod executor;
pub mod machine;
pub mod scheduler;
pub mod state;

pub use controller::{SessionController, SessionHandle};
pub use executor::{LivenessProbe, Retryable, RetryPolicy, SessionNotReady};
pub use machine::{LifecycleEvent, ReconnectPolicy};
pub use scheduler::RuntimeScheduler;
pub use state::{SessionPhase, SessionState};
