//! Relay Pipeline
//!
//! One cycle: fetch → normalize → analyze → publish. Every stage failure is
//! turned into a [`CycleOutcome::Failed`]; nothing escapes to the scheduler.

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::analysis::{AnalysisError, AnalysisResult, Analyzer};
use crate::fetcher::{EventSource, FetchError};
use crate::normalizer::{normalize, Digest, Locale};
use crate::publisher::{Publish, PublishError, PublishOutcome};
use crate::store::FingerprintStore;

/// Where the pipeline is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Normalizing,
    Analyzing,
    Publishing,
}

/// Failure categories reported to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network or HTTP status failure
    Transport,
    /// Payload of an unexpected shape
    MalformedResponse,
    /// Publishing program failed or could not run
    ExternalProcess,
}

/// A stage failure that ended a cycle early
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

impl CycleError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CycleError::Fetch(FetchError::Malformed(_))
            | CycleError::Analysis(AnalysisError::Malformed(_)) => FailureKind::MalformedResponse,
            CycleError::Fetch(_) | CycleError::Analysis(_) => FailureKind::Transport,
            CycleError::Publish(_) => FailureKind::ExternalProcess,
        }
    }

    /// State the cycle was in when it failed
    pub fn stage(&self) -> CycleState {
        match self {
            CycleError::Fetch(_) => CycleState::Fetching,
            CycleError::Analysis(_) => CycleState::Analyzing,
            CycleError::Publish(_) => CycleState::Publishing,
        }
    }
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Every fetched transfer had been seen before
    NoNewEvents,
    /// New transfers were analyzed and published
    Published {
        digest: Digest,
        analysis: AnalysisResult,
        output: PublishOutcome,
    },
    /// A stage failed; later stages were skipped
    Failed(CycleError),
}

impl CycleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::Failed(_))
    }
}

/// The three relay stages plus the dedup store they share
pub struct Pipeline<S, A, P> {
    source: S,
    analyzer: A,
    publisher: P,
    store: FingerprintStore,
    locale: Locale,
    state: CycleState,
    cycles: u64,
}

impl<S, A, P> Pipeline<S, A, P>
where
    S: EventSource,
    A: Analyzer,
    P: Publish,
{
    pub fn new(source: S, analyzer: A, publisher: P, locale: Locale) -> Self {
        Self {
            source,
            analyzer,
            publisher,
            store: FingerprintStore::new(),
            locale,
            state: CycleState::Idle,
            cycles: 0,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    /// Cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one full cycle and return to `Idle`
    ///
    /// Takes `&mut self`, so two cycles can never touch the store at once.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycles += 1;
        let cycle = self.cycles;
        info!("Cycle {} started", cycle);

        let outcome = match self.try_cycle().await {
            Ok(Some((digest, analysis, output))) => {
                info!("Cycle {} published {} transfers", cycle, digest.len());
                CycleOutcome::Published {
                    digest,
                    analysis,
                    output,
                }
            }
            Ok(None) => {
                info!("Cycle {}: no new transfers", cycle);
                CycleOutcome::NoNewEvents
            }
            Err(e) => {
                error!("Cycle {} {} ({:?})", cycle, e, e.kind());
                CycleOutcome::Failed(e)
            }
        };

        self.transition(CycleState::Idle);
        outcome
    }

    async fn try_cycle(
        &mut self,
    ) -> Result<Option<(Digest, AnalysisResult, PublishOutcome)>, CycleError> {
        self.transition(CycleState::Fetching);
        let events = self.source.fetch().await?;
        debug!("Fetched {} transfers", events.len());

        self.transition(CycleState::Normalizing);
        let digest = match normalize(&events, &mut self.store, self.locale) {
            Some(digest) => digest,
            None => return Ok(None),
        };

        self.transition(CycleState::Analyzing);
        let analysis = self.analyzer.analyze(&digest).await?;
        info!("Analysis: {}", analysis);

        self.transition(CycleState::Publishing);
        let output = self.publisher.publish(analysis.as_str()).await?;
        info!("Publisher output: {}", output.stdout);

        Ok(Some((digest, analysis, output)))
    }

    /// Return to `Idle` after a cycle future was dropped part-way
    ///
    /// Fingerprints recorded by the abandoned cycle stay in the store.
    pub fn abandon_cycle(&mut self) {
        if self.state != CycleState::Idle {
            warn!("Cycle {} abandoned while {:?}", self.cycles, self.state);
            self.transition(CycleState::Idle);
        }
    }

    fn transition(&mut self, next: CycleState) {
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
