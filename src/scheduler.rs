//! Cycle Scheduler
//!
//! Continuous mode runs a cycle immediately and then once per interval until
//! a [`StopSignal`] fires. Single-shot mode runs one cycle and renders the
//! `FINAL_RESPONSE:` line a parent process scrapes from stdout.
//!
//! Timing goes through `tokio::time`, so tests drive it with a paused clock.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::analysis::{collapse_whitespace, Analyzer};
use crate::fetcher::EventSource;
use crate::pipeline::{CycleOutcome, Pipeline};
use crate::publisher::Publish;

/// Prefix of the single-shot result line
pub const FINAL_RESPONSE_MARKER: &str = "FINAL_RESPONSE:";

/// Single-shot text when nothing new was found
pub const NO_NEW_TRANSACTIONS: &str = "No new transactions.";

/// Create a connected stop handle and signal
pub fn stop_signal() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(tx), StopSignal(rx))
}

/// Requests the scheduler to stop
#[derive(Debug)]
pub struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

/// Observed by the scheduler between and during cycles
#[derive(Debug, Clone)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once stop has been requested
    ///
    /// A dropped handle never resolves: only an explicit stop ends the loop.
    pub async fn stopped(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Drives pipeline cycles
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run cycles until stopped
    ///
    /// A stop during a cycle abandons it. Returns the number of cycles that
    /// ran to completion.
    pub async fn run_continuous<S, A, P>(
        &self,
        pipeline: &mut Pipeline<S, A, P>,
        mut stop: StopSignal,
    ) -> u64
    where
        S: EventSource,
        A: Analyzer,
        P: Publish,
    {
        info!("Polling every {:?}", self.interval);

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut completed = 0;

        loop {
            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                _ = timer.tick() => {}
            }

            tokio::select! {
                biased;
                _ = stop.stopped() => {
                    pipeline.abandon_cycle();
                    break;
                }
                _ = pipeline.run_cycle() => completed += 1,
            }
        }

        info!("Scheduler stopped after {} cycles", completed);
        completed
    }

    /// Run exactly one cycle
    pub async fn run_once<S, A, P>(&self, pipeline: &mut Pipeline<S, A, P>) -> CycleOutcome
    where
        S: EventSource,
        A: Analyzer,
        P: Publish,
    {
        pipeline.run_cycle().await
    }
}

/// Render the single-shot result line for an outcome
///
/// Always a single line. Publishing output is reported when the publisher
/// printed anything, otherwise the analysis text it was given.
pub fn final_response_line(outcome: &CycleOutcome) -> String {
    let text = match outcome {
        CycleOutcome::NoNewEvents => NO_NEW_TRANSACTIONS.to_string(),
        CycleOutcome::Published {
            analysis, output, ..
        } => {
            let published = collapse_whitespace(&output.stdout);
            if published.is_empty() {
                warn!("Publisher printed nothing, reporting analysis text");
                analysis.to_string()
            } else {
                published
            }
        }
        CycleOutcome::Failed(e) => collapse_whitespace(&format!("Error: {}", e)),
    };

    format!("{} {}", FINAL_RESPONSE_MARKER, text)
}
