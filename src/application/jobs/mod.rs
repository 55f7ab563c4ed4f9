//! Background jobs.
//!
//! Each job is a long-lived task woken either by its own interval or by an
//! explicit [`PeriodicJob::trigger`]. Jobs share state only through the
//! objects handed to them at spawn time.

mod expire_sessions;
mod refresh_posts;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

pub use expire_sessions::{expire_sessions, spawn_session_sweep};
pub use refresh_posts::{refresh_posts, spawn_post_refresh};

#[derive(Clone)]
pub struct JobTrigger(Arc<Notify>);

impl JobTrigger {
    pub fn fire(&self) {
        self.0.notify_one();
    }
}

pub struct PeriodicJob {
    name: &'static str,
    trigger: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl PeriodicJob {
    /// Spawn `run` every `period`, skipping the immediate first tick.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut run: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let trigger = Arc::new(Notify::new());
        let wake = trigger.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // Skip the first immediate tick
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = wake.notified() => {
                        debug!(job = name, "job triggered on demand");
                    }
                }
                run().await;
            }
        });

        Self {
            name,
            trigger,
            handle,
        }
    }

    /// Run the job as soon as possible without waiting for the next tick.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Detached handle that can wake the job from another task.
    pub fn trigger_handle(&self) -> JobTrigger {
        JobTrigger(self.trigger.clone())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop the job, waiting for the task to unwind.
    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
        debug!(job = self.name, "job stopped");
    }
}
