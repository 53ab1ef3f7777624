//! # Session Controller
//!
//! Owns the messaging client and is the only writer of [SessionState].
//! Every input goes through one command channel and is handled to completion
//! before the next one, so lifecycle transitions never interleave.
//! Readers get a cheap [SessionHandle] holding a `watch` receiver of the
//! state and a shared slot with the live client.

use super::{
    executor::LivenessProbe,
    machine::{self, Effect, Input, LifecycleEvent, ReconnectPolicy},
    scheduler::Scheduler,
    state::SessionState,
};
use crate::{
    client::{ClientFactory, MessagingClient},
    metric,
};
use async_trait::async_trait;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc, oneshot, watch};

type ClientSlot = Arc<RwLock<Option<Arc<dyn MessagingClient>>>>;

pub enum Command {
    Input(Input),
    Shutdown(oneshot::Sender<()>),
}

pub struct SessionController {
    state: SessionState,
    policy: ReconnectPolicy,
    factory: Arc<dyn ClientFactory>,
    scheduler: Arc<dyn Scheduler>,
    client: ClientSlot,
    state_tx: watch::Sender<SessionState>,
    /// Own sender, used to feed init failures and timers back into the loop
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionController {
    pub fn new(
        policy: ReconnectPolicy,
        factory: Arc<dyn ClientFactory>,
        scheduler: Arc<dyn Scheduler>,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<Command>) {
        let state = SessionState::new(policy.max_attempts);
        let (state_tx, state_rx) = watch::channel(state.clone());
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let client: ClientSlot = Arc::new(RwLock::new(None));

        let handle = SessionHandle {
            commands: commands.clone(),
            state: state_rx,
            client: client.clone(),
        };

        let controller = Self {
            state,
            policy,
            factory,
            scheduler,
            client,
            state_tx,
            commands,
        };

        (controller, handle, commands_rx)
    }

    /// Event loop, returns after a shutdown command
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Input(input) => self.apply(input).await,
                Command::Shutdown(done) => {
                    info!("shutting down WhatsApp session");
                    self.release_client().await;
                    let _ = done.send(());
                    return;
                }
            }
        }
    }

    pub async fn apply(&mut self, input: Input) {
        let (next, effects) = machine::transition(&self.state, &input, &self.policy);

        if next.phase != self.state.phase {
            info!(
                "WhatsApp session {from} -> {to} (generation {generation})",
                from = self.state.phase,
                to = next.phase,
                generation = next.generation
            );
            metric::incr_session_statds(&next.phase.to_string());
        }

        self.state = next;
        self.state_tx.send_replace(self.state.clone());

        for effect in effects {
            self.perform(effect).await;
        }
    }

    async fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::ReleaseClient => self.release_client().await,
            Effect::CreateClient { generation } => self.create_client(generation).await,
            Effect::ScheduleStart { delay, generation } => {
                info!(
                    "scheduling WhatsApp session start in {delay:?} (reconnect attempts {attempt}/{max})",
                    attempt = self.state.reconnect_attempts,
                    max = self.policy.max_attempts
                );
                let commands = self.commands.clone();
                self.scheduler.schedule(
                    delay,
                    Box::new(move || {
                        let _ = commands.send(Command::Input(Input::Start {
                            expected_generation: Some(generation),
                        }));
                    }),
                );
            }
            Effect::ReconnectExhausted => {
                error!(
                    "WhatsApp session gave up after {max} reconnect attempts, restart required",
                    max = self.policy.max_attempts
                );
            }
            Effect::LogIncomingMessage { from } => info!("incoming WhatsApp message from {from}"),
        }
    }

    /// Destroys the current client, destroy errors are only logged
    async fn release_client(&mut self) {
        let previous = self.client.write().await.take();
        if let Some(client) = previous {
            if let Err(e) = client.destroy().await {
                warn!("failed to destroy previous WhatsApp client: {e}");
            }
        }
    }

    async fn create_client(&mut self, generation: u64) {
        let client = match self.factory.create(generation) {
            Ok(client) => client,
            Err(e) => {
                error!("failed to create WhatsApp client: {e}");
                let _ = self.commands.send(Command::Input(Input::InitFailed {
                    generation,
                    reason: e.to_string(),
                }));
                return;
            }
        };

        *self.client.write().await = Some(client.clone());

        // initialize resolves late (pairing happens meanwhile), keep the loop free
        let commands = self.commands.clone();
        ntex::rt::spawn(async move {
            if let Err(e) = client.initialize().await {
                error!("WhatsApp client initialization failed: {e}");
                let _ = commands.send(Command::Input(Input::InitFailed {
                    generation,
                    reason: e.to_string(),
                }));
            }
        });
    }
}

/// Read side of the session plus the commands request handlers may issue
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    client: ClientSlot,
}

impl SessionHandle {
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub async fn current_client(&self) -> Option<Arc<dyn MessagingClient>> {
        self.client.read().await.clone()
    }

    fn send(&self, input: Input) -> anyhow::Result<()> {
        self.commands
            .send(Command::Input(input))
            .map_err(|_| anyhow::anyhow!("WhatsApp session controller is not running"))
    }

    pub fn start(&self) -> anyhow::Result<()> {
        self.send(Input::Start {
            expected_generation: None,
        })
    }

    /// Schedules a teardown and a fresh initialization, returns immediately
    pub fn restart(&self) -> anyhow::Result<()> {
        self.send(Input::Restart)
    }

    pub fn dispatch(&self, generation: u64, event: LifecycleEvent) -> anyhow::Result<()> {
        self.send(Input::Lifecycle { generation, event })
    }

    /// Destroys the client and stops the controller loop
    pub async fn shutdown(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(Command::Shutdown(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Ready flag plus a check against the client itself, the ready event
    /// can be stale when the transport dropped silently
    pub async fn is_actually_ready(&self) -> bool {
        if !self.state.borrow().ready {
            return false;
        }

        let Some(client) = self.current_client().await else {
            return false;
        };

        match client.connection().await {
            Ok(connection) => connection.is_connected(),
            Err(e) => {
                warn!("WhatsApp state check failed: {e}");
                false
            }
        }
    }
}

#[async_trait]
impl LivenessProbe for SessionHandle {
    async fn is_live(&self) -> bool {
        self.is_actually_ready().await
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Handle over a fixed state and client, without a running controller
    pub fn detached_handle(
        state: SessionState,
        client: Option<Arc<dyn MessagingClient>>,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<Command>) {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (_, state_rx) = watch::channel(state);
        let handle = SessionHandle {
            commands,
            state: state_rx,
            client: Arc::new(RwLock::new(client)),
        };
        (handle, commands_rx)
    }
}
