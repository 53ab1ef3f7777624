use std::time::Duration;

/// Deferred work for the session controller
pub type ScheduledTask = Box<dyn FnOnce() + Send>;

/// Runs a task after a delay. Swapped for a recording fake in tests so
/// reconnect timing can be checked without sleeping.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: ScheduledTask);
}

/// Scheduler backed by the running ntex/tokio runtime
pub struct RuntimeScheduler;

impl Scheduler for RuntimeScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) {
        ntex::rt::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}
