//! The tick loop.
//!
//! A [`TickScheduler`] owns an ordered list of [`TickPhase`]s and runs all
//! of them once per interval. A phase that returns an error or panics is
//! logged and skipped; the remaining phases of that tick and every later
//! tick still run.
//!
//! Ticks never overlap. The loop awaits each tick body before waiting for the
//! next interval, and missed intervals are skipped rather than bunched up.
//! A stopped loop still finishes the tick it is in, and the scheduler refuses
//! to start again until it has.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SimError;

/// One step of a tick.
pub trait TickPhase: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Run the phase once.
    fn run(&self) -> BoxFuture<'_, Result<(), SimError>>;
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// 1-based tick number.
    pub tick: u64,
    /// Phases that failed, in order.
    pub failed_phases: Vec<&'static str>,
}

impl TickReport {
    /// Returns true if every phase succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed_phases.is_empty()
    }
}

struct Shared {
    phases: Vec<Arc<dyn TickPhase>>,
    ticks: AtomicU64,
    failures: AtomicU64,
}

impl Shared {
    async fn tick(&self) -> TickReport {
        let tick = self.ticks.load(Ordering::SeqCst) + 1;
        let mut report = TickReport {
            tick,
            failed_phases: Vec::new(),
        };

        for phase in &self.phases {
            let name = phase.name();
            let result = match AssertUnwindSafe(phase.run()).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(SimError::PhasePanicked {
                    phase: name,
                    message: panic_message(payload.as_ref()),
                }),
            };
            if let Err(e) = result {
                warn!(tick, phase = name, error = %e, "tick phase failed");
                self.failures.fetch_add(1, Ordering::SeqCst);
                report.failed_phases.push(name);
            }
        }

        self.ticks.store(tick, Ordering::SeqCst);
        debug!(tick, failed = report.failed_phases.len(), "tick complete");
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives the phases on a fixed interval.
pub struct TickScheduler {
    interval: Duration,
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl TickScheduler {
    /// Creates a stopped scheduler. Phases run in the given order.
    pub fn new(interval: Duration, phases: Vec<Arc<dyn TickPhase>>) -> Self {
        Self {
            interval,
            shared: Arc::new(Shared {
                phases,
                ticks: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
            running: Mutex::new(None),
        }
    }

    /// Tick interval.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Phase names in run order.
    pub fn phase_names(&self) -> Vec<&'static str> {
        self.shared.phases.iter().map(|p| p.name()).collect()
    }

    /// Ticks run so far.
    pub fn ticks_completed(&self) -> u64 {
        self.shared.ticks.load(Ordering::SeqCst)
    }

    /// Phase failures so far, across all ticks.
    pub fn phase_failures(&self) -> u64 {
        self.shared.failures.load(Ordering::SeqCst)
    }

    /// Returns true while the loop is running and has not been stopped.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.cancel.is_cancelled() && !r.handle.is_finished())
    }

    /// Run every phase once, outside the loop.
    pub async fn tick_once(&self) -> TickReport {
        self.shared.tick().await
    }

    /// Start the loop on the current tokio runtime.
    ///
    /// Returns false, doing nothing, if it is already running or a stopped
    /// loop is still finishing its last tick. The first tick fires one
    /// interval after start.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock();
        if let Some(previous) = running.as_ref().filter(|r| !r.handle.is_finished()) {
            if previous.cancel.is_cancelled() {
                debug!("previous tick loop still draining");
            }
            return false;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let shared = Arc::clone(&self.shared);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await;

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                shared.tick().await;
            }
            debug!("tick loop exited");
        });

        *running = Some(Running { cancel, handle });
        info!(interval_ms = period.as_millis() as u64, phases = self.shared.phases.len(), "scheduler started");
        true
    }

    /// Stop scheduling new ticks. A tick already in progress finishes.
    ///
    /// Safe to call at any time, including when not running.
    pub fn stop(&self) {
        let guard = self.running.lock();
        if let Some(running) = guard.as_ref().filter(|r| !r.cancel.is_cancelled()) {
            running.cancel.cancel();
            info!(ticks = self.ticks_completed(), "scheduler stopped");
        }
    }

    /// Stop and wait for any in-progress tick to finish.
    pub async fn shutdown(&self) {
        let running = self.running.lock().take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.handle.await {
                warn!(error = %e, "tick loop ended abnormally");
            }
            info!(ticks = self.ticks_completed(), "scheduler shut down");
        }
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}
