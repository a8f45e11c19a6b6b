//! # Sync Scheduler
//!
//! Runs background jobs (delta catalog sync, offline replay) on a fixed
//! interval until shut down.
//!
//! ```text
//!            ┌───────────────────────────────────────────┐
//!            │               scheduler task              │
//!  handle ──►│  select! {                                │
//!  RunNow    │    command  => run jobs | stop            │
//!  Shutdown  │    clock.sleep(interval) => run jobs      │
//!            │  }                                        │
//!            └───────────────────────────────────────────┘
//! ```
//!
//! Jobs run one after another; a tick never overlaps the previous one.
//! Jobs log their own failures.

use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{SyncError, SyncResult};

/// A unit of background work.
pub type SyncJob = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerCommand {
    RunNow,
    Shutdown,
}

pub struct SyncScheduler {
    clock: Arc<dyn Clock>,
    interval: Duration,
    run_immediately: bool,
    jobs: Vec<(String, SyncJob)>,
}

impl SyncScheduler {
    pub fn new(clock: Arc<dyn Clock>, interval: Duration) -> Self {
        SyncScheduler {
            clock,
            interval,
            run_immediately: false,
            jobs: Vec::new(),
        }
    }

    pub fn job(mut self, name: impl Into<String>, job: SyncJob) -> Self {
        self.jobs.push((name.into(), job));
        self
    }

    /// Run every job once before the first wait.
    pub fn run_immediately(mut self, run: bool) -> Self {
        self.run_immediately = run;
        self
    }

    /// Starts the task. Must be called inside a tokio runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (command_tx, command_rx) = mpsc::channel(4);
        let ticks = Arc::new(AtomicU64::new(0));

        info!(
            interval_secs = self.interval.as_secs(),
            jobs = self.jobs.len(),
            "Starting sync scheduler"
        );
        let task = tokio::spawn(self.run(command_rx, Arc::clone(&ticks)));

        SchedulerHandle {
            command_tx,
            ticks,
            task,
        }
    }

    async fn run(self, mut commands: mpsc::Receiver<SchedulerCommand>, ticks: Arc<AtomicU64>) {
        if self.run_immediately {
            self.tick(&ticks).await;
        }

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SchedulerCommand::RunNow) => self.tick(&ticks).await,
                    Some(SchedulerCommand::Shutdown) | None => {
                        info!("Sync scheduler received shutdown");
                        break;
                    }
                },
                _ = self.clock.sleep(self.interval) => self.tick(&ticks).await,
            }
        }
    }

    async fn tick(&self, ticks: &AtomicU64) {
        for (name, job) in &self.jobs {
            debug!(job = %name, "Running scheduled job");
            job().await;
        }
        ticks.fetch_add(1, Ordering::SeqCst);
    }
}

/// Handle for controlling a running scheduler.
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    ticks: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Completed ticks so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Asks for an extra tick without waiting for the interval.
    pub async fn run_now(&self) -> SyncResult<()> {
        self.command_tx
            .send(SchedulerCommand::RunNow)
            .await
            .map_err(|_| SyncError::ShuttingDown)
    }

    /// Signals the scheduler to stop after the current tick.
    pub async fn stop(&self) {
        let _ = self.command_tx.send(SchedulerCommand::Shutdown).await;
    }

    /// Stops the scheduler and waits for the current tick to finish.
    pub async fn shutdown(self) {
        self.stop().await;
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
