//! Poll engine: scheduling, checkpointing and pause/resume.
//!
//! All engine state (enabled flag, interval, registry, pending loop handle)
//! lives behind one mutex, and checkpoint read-modify-writes happen while
//! holding it. Log-store queries and sink callbacks run outside the lock.
//!
//! Scheduled cycles are single-flight: a loop spawned while a cancelled
//! loop is still dispatching waits for it and then reads the advanced
//! checkpoint. A forced poll is not serialized against them; the checkpoint
//! is only ever raised to `max(current, newest delivered)`, so whichever
//! finishes last cannot regress it.
//!
//! ```text
//!            start()                      last sink deregistered
//! Stopped ───────────▶ Running ─────────────────────────────────▶ RunningPaused
//!    ▲                  │   ▲              first sink registered       │
//!    │      stop()      │   └─────────────────────────────────────────┘
//!    └──────────────────┴──────────────────────────────────────────────┘
//! ```

/// Cancellable scheduled poll loop.
pub mod scheduler;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::checkpoint::CheckpointStore;
use crate::dispatcher::{dispatch, DispatchReport};
use crate::entry::sort_batch;
use crate::registry::SubscriberRegistry;
use crate::sink::LogSink;
use crate::store::LogStore;

use scheduler::{CancelToken, ScheduledPoll};

/// Smallest accepted polling interval; shorter values are raised to it.
pub const MIN_POLLING_INTERVAL: Duration = Duration::from_secs(1);

/// Raises `interval` to `MIN_POLLING_INTERVAL` if needed.
#[must_use]
pub fn clamp_interval(interval: Duration) -> Duration {
    interval.max(MIN_POLLING_INTERVAL)
}

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time between scheduled polls (clamped to at least one second).
    pub polling_interval: Duration,
    /// Suspend the scheduled loop while no sink is registered.
    pub pause_if_empty: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            polling_interval: MIN_POLLING_INTERVAL,
            pause_if_empty: true,
        }
    }
}

/// Observable engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Disabled; nothing scheduled.
    Stopped,
    /// Enabled with a scheduled loop.
    Running,
    /// Enabled, but suspended with no scheduled loop.
    RunningPaused,
}

/// How a poll cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Entries (if any) were dispatched and the checkpoint updated.
    Completed,
    /// Reading the checkpoint failed; nothing was queried.
    CheckpointUnreadable,
    /// The log store query failed; checkpoint unchanged.
    QueryFailed,
    /// The scheduled loop was cancelled before dispatch.
    Cancelled,
    /// Entries were dispatched but the new checkpoint could not be written.
    CheckpointWriteFailed,
}

/// Summary of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// Exclusive lower bound used for the query.
    pub lower_bound: Option<DateTime<Utc>>,
    /// Entries returned by the store.
    pub fetched: usize,
    /// Delivery counts.
    pub dispatch: DispatchReport,
    /// Checkpoint after the cycle.
    pub checkpoint: Option<DateTime<Utc>>,
    /// How the cycle ended.
    pub outcome: PollOutcome,
}

struct EngineState {
    enabled: bool,
    interval: Duration,
    pause_if_empty: bool,
    registry: SubscriberRegistry,
    pending: Option<ScheduledPoll>,
}

impl EngineState {
    fn should_suspend(&self) -> bool {
        self.pause_if_empty && self.registry.is_empty()
    }

    fn cancel_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(p) => {
                p.cancel();
                true
            }
            None => false,
        }
    }
}

struct Shared {
    store: Arc<dyn LogStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    state: Mutex<EngineState>,
    // Held by a scheduled cycle from its first checkpoint read to its write.
    scheduled_cycle: Mutex<()>,
}

impl Shared {
    // State is consistent between statements, so a poisoned guard is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_cycle(&self, from: Option<DateTime<Utc>>, token: Option<&CancelToken>) -> PollReport {
        let cycle_id = Uuid::new_v4();

        let _single_flight = token.map(|_| {
            self.scheduled_cycle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
        });
        if token.is_some_and(CancelToken::is_cancelled) {
            tracing::debug!(%cycle_id, "scheduled poll cancelled while waiting for previous cycle");
            return PollReport {
                lower_bound: from,
                fetched: 0,
                dispatch: DispatchReport::default(),
                checkpoint: None,
                outcome: PollOutcome::Cancelled,
            };
        }

        let current = {
            let _guard = self.lock();
            self.checkpoints.read()
        };
        let current = match current {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(%cycle_id, error = %e, "failed to read checkpoint; skipping poll");
                return PollReport {
                    lower_bound: from,
                    fetched: 0,
                    dispatch: DispatchReport::default(),
                    checkpoint: None,
                    outcome: PollOutcome::CheckpointUnreadable,
                };
            }
        };

        let lower_bound = from.or(current);
        let mut report = PollReport {
            lower_bound,
            fetched: 0,
            dispatch: DispatchReport::default(),
            checkpoint: current,
            outcome: PollOutcome::Completed,
        };

        let mut entries = match self.store.query(lower_bound) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(%cycle_id, error = %e, "log store query failed; checkpoint unchanged");
                report.outcome = PollOutcome::QueryFailed;
                return report;
            }
        };
        sort_batch(&mut entries);
        report.fetched = entries.len();

        if token.is_some_and(CancelToken::is_cancelled) {
            tracing::warn!(%cycle_id, fetched = entries.len(), "scheduled poll cancelled before dispatch");
            report.outcome = PollOutcome::Cancelled;
            return report;
        }

        let Some(newest) = entries.last().map(|e| e.timestamp) else {
            tracing::debug!(%cycle_id, lower_bound = ?lower_bound, "poll found no new entries");
            return report;
        };

        let sinks = self.lock().registry.snapshot();
        report.dispatch = dispatch(&entries, &sinks);

        let guard = self.lock();
        let advanced = match self.checkpoints.read() {
            Ok(latest) => {
                let next = latest.max(Some(newest));
                if next == latest {
                    Ok(latest)
                } else {
                    self.checkpoints.write(next).map(|()| next)
                }
            }
            Err(e) => Err(e),
        };
        drop(guard);

        match advanced {
            Ok(checkpoint) => report.checkpoint = checkpoint,
            Err(e) => {
                tracing::error!(%cycle_id, error = %e, "failed to advance checkpoint");
                report.outcome = PollOutcome::CheckpointWriteFailed;
            }
        }

        tracing::debug!(
            %cycle_id,
            lower_bound = ?lower_bound,
            fetched = report.fetched,
            delivered = report.dispatch.delivered,
            failed = report.dispatch.failed,
            checkpoint_before = ?current,
            checkpoint_after = ?report.checkpoint,
            "poll cycle complete"
        );
        report
    }
}

/// The polling state machine.
///
/// Every public method takes `&self` and is atomic with respect to the
/// others, so an engine can be shared across threads behind an `Arc`.
pub struct PollEngine {
    shared: Arc<Shared>,
}

impl PollEngine {
    /// Creates a stopped engine.
    #[must_use]
    pub fn new(
        store: Arc<dyn LogStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: EngineConfig,
    ) -> Self {
        let interval = clamp_interval(config.polling_interval);
        if interval != config.polling_interval {
            tracing::debug!(
                requested_ms = config.polling_interval.as_millis() as u64,
                "polling interval raised to minimum"
            );
        }
        Self {
            shared: Arc::new(Shared {
                store,
                checkpoints,
                state: Mutex::new(EngineState {
                    enabled: false,
                    interval,
                    pause_if_empty: config.pause_if_empty,
                    registry: SubscriberRegistry::new(),
                    pending: None,
                }),
                scheduled_cycle: Mutex::new(()),
            }),
        }
    }

    fn schedule(&self, state: &mut EngineState) {
        let shared = Arc::clone(&self.shared);
        match scheduler::spawn(state.interval, move |token| {
            let _ = shared.run_cycle(None, Some(token));
        }) {
            Ok(handle) => {
                tracing::debug!(loop_id = %handle.id(), "scheduled poll loop");
                state.pending = Some(handle);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn poll loop");
            }
        }
    }

    /// Enables polling. Schedules a poll right away unless suspended for
    /// lack of sinks or a loop is already pending.
    pub fn start(&self) {
        let mut state = self.shared.lock();
        state.enabled = true;
        if state.should_suspend() {
            tracing::info!("polling enabled; paused until a sink registers");
            return;
        }
        if state.pending.is_none() {
            self.schedule(&mut state);
            tracing::info!(interval_ms = state.interval.as_millis() as u64, "polling started");
        }
    }

    /// Disables polling and cancels the scheduled loop.
    ///
    /// An in-flight `poll_immediately` is not affected.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        state.enabled = false;
        state.cancel_pending();
        tracing::info!("polling stopped");
    }

    /// Changes the interval, restarting the scheduled loop under it.
    pub fn set_polling_interval(&self, interval: Duration) {
        let mut state = self.shared.lock();
        state.cancel_pending();
        state.interval = clamp_interval(interval);
        tracing::info!(interval_ms = state.interval.as_millis() as u64, "polling interval changed");
        if state.enabled && !state.should_suspend() {
            self.schedule(&mut state);
        }
    }

    /// Registers a sink; resumes a paused engine when it is the first one.
    pub fn register_driver(&self, sink: Arc<dyn LogSink>) {
        self.register_drivers(std::iter::once(sink));
    }

    /// Registers sinks in order, with one resume decision for the batch.
    pub fn register_drivers(&self, sinks: impl IntoIterator<Item = Arc<dyn LogSink>>) {
        let mut state = self.shared.lock();
        let mut became_non_empty = false;
        for sink in sinks {
            became_non_empty |= state.registry.register(sink).became_non_empty();
        }
        if became_non_empty && state.enabled && state.pause_if_empty && state.pending.is_none() {
            self.schedule(&mut state);
            tracing::info!("polling resumed; sink registered");
        }
    }

    /// Removes a sink; soft-stops when the last one leaves.
    pub fn deregister_driver(&self, id: &str) {
        let mut state = self.shared.lock();
        let outcome = state.registry.deregister(id);
        if outcome.became_empty() && state.enabled && state.pause_if_empty && state.cancel_pending() {
            tracing::info!("polling paused; no sinks registered");
        }
    }

    /// Returns true if a sink with `id` is registered.
    #[must_use]
    pub fn is_driver_registered(&self, id: &str) -> bool {
        self.shared.lock().registry.is_registered(id)
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn driver_count(&self) -> usize {
        self.shared.lock().registry.len()
    }

    /// Changes the pause policy, applying it immediately.
    pub fn set_pause_if_empty(&self, pause: bool) {
        let mut state = self.shared.lock();
        state.pause_if_empty = pause;
        if !state.enabled {
            return;
        }
        if state.should_suspend() {
            if state.cancel_pending() {
                tracing::info!("polling paused; no sinks registered");
            }
        } else if state.pending.is_none() {
            self.schedule(&mut state);
            tracing::info!("polling resumed; pause policy disabled");
        }
    }

    /// Runs one cycle on the calling thread, independent of the schedule.
    ///
    /// `from` replaces the checkpoint as the lower bound for this cycle only.
    pub fn poll_immediately(&self, from: Option<DateTime<Utc>>) -> PollReport {
        self.shared.run_cycle(from, None)
    }

    /// Returns true if polling is enabled (running or paused).
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.shared.lock().enabled
    }

    /// Current effective interval.
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        self.shared.lock().interval
    }

    /// Current pause policy.
    #[must_use]
    pub fn pause_if_empty(&self) -> bool {
        self.shared.lock().pause_if_empty
    }

    /// Current checkpoint, or `None` if unset or unreadable.
    #[must_use]
    pub fn last_processed(&self) -> Option<DateTime<Utc>> {
        let _guard = self.shared.lock();
        match self.shared.checkpoints.read() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "failed to read checkpoint");
                None
            }
        }
    }

    /// Observable state.
    #[must_use]
    pub fn state(&self) -> PollState {
        let state = self.shared.lock();
        match (state.enabled, state.pending.is_some()) {
            (false, _) => PollState::Stopped,
            (true, true) => PollState::Running,
            (true, false) => PollState::RunningPaused,
        }
    }
}

impl Drop for PollEngine {
    fn drop(&mut self) {
        self.shared.lock().cancel_pending();
    }
}

impl std::fmt::Debug for PollEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("PollEngine")
            .field("enabled", &state.enabled)
            .field("interval", &state.interval)
            .field("pause_if_empty", &state.pause_if_empty)
            .field("registry", &state.registry)
            .field("pending", &state.pending.as_ref().map(ScheduledPoll::id))
            .finish()
    }
}
