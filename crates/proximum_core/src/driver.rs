//! Simulation driver: runs the external engine in bounded chunks.
//!
//! A run advances the engine `chunk_size` epochs at a time, replaces the
//! snapshot with each (cumulative) result, publishes progress, and yields to
//! the scheduler between chunks so intermediate state can be observed.
//! [`SimulationDriver::reset`] is cooperative: it bumps the run generation and
//! the run loop checks it at each yield point and after each engine call.
//!
//! Phases: `Idle -> Initializing -> Running -> Idle`. A reset from any phase
//! ends in `Idle` with an empty snapshot; dropping a run's future ends in
//! `Idle` with the last applied snapshot.

use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::engine::{ChunkResult, EngineError, EstimationEngine};
use crate::node::Node;
use crate::stats::Stats;

/// Upper bound on epochs per engine call.
pub const DEFAULT_CHUNK_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    pub chunk_size: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    Idle,
    Initializing,
    Running,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("a simulation run is already in progress")]
    RunInProgress,
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// How a run that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every chunk was applied.
    Completed { chunks: usize },
    /// A reset was observed; `chunks_applied` chunks landed before it.
    Cancelled { chunks_applied: usize },
}

/// Latest applied engine state. `stats` is `None` until a chunk lands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub stats: Option<Stats>,
}

impl From<ChunkResult> for Snapshot {
    fn from(result: ChunkResult) -> Self {
        Self {
            nodes: result.nodes,
            stats: Some(result.stats),
        }
    }
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.stats.is_none()
    }
}

/// Step sizes for `total_steps` epochs in chunks of at most `chunk_size`.
///
/// Returns an empty plan for a zero chunk size.
pub fn chunk_plan(total_steps: usize, chunk_size: usize) -> Vec<usize> {
    if chunk_size == 0 {
        return Vec::new();
    }
    let chunks = total_steps.div_ceil(chunk_size);
    (0..chunks)
        .map(|i| chunk_size.min(total_steps - i * chunk_size))
        .collect()
}

#[derive(Debug)]
struct DriverState {
    phase: DriverPhase,
    snapshot: Snapshot,
    /// Id of the latest run; a reset bumps it so the loop of the run it
    /// cancelled can no longer write to the state.
    generation: u64,
}

/// Drives one [`EstimationEngine`]; at most one run is in flight at a time.
pub struct SimulationDriver<E> {
    engine: tokio::sync::Mutex<E>,
    state: Mutex<DriverState>,
    progress: watch::Sender<f64>,
    chunk_size: usize,
}

/// Puts the driver back to `Idle` when a run ends, including when the run
/// future is dropped mid-chunk. No-op once a reset or newer run owns the state.
struct RunGuard<'a, E: EstimationEngine> {
    driver: &'a SimulationDriver<E>,
    run: u64,
}

impl<E: EstimationEngine> Drop for RunGuard<'_, E> {
    fn drop(&mut self) {
        let mut state = self.driver.state();
        if state.generation == self.run && state.phase != DriverPhase::Idle {
            state.phase = DriverPhase::Idle;
            self.driver.set_progress(0.0);
        }
    }
}

impl<E: EstimationEngine> SimulationDriver<E> {
    pub fn new(engine: E) -> Self {
        Self::build(engine, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_config(engine: E, config: DriverConfig) -> Result<Self, DriverError> {
        if config.chunk_size == 0 {
            return Err(DriverError::InvalidChunkSize);
        }
        Ok(Self::build(engine, config.chunk_size))
    }

    fn build(engine: E, chunk_size: usize) -> Self {
        let (progress, _) = watch::channel(0.0);
        Self {
            engine: tokio::sync::Mutex::new(engine),
            state: Mutex::new(DriverState {
                phase: DriverPhase::Idle,
                snapshot: Snapshot::default(),
                generation: 0,
            }),
            progress,
            chunk_size,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn phase(&self) -> DriverPhase {
        self.state().phase
    }

    /// Percent of the current run completed, `0.0` when no run is active.
    pub fn progress(&self) -> f64 {
        *self.progress.borrow()
    }

    /// Receiver notified on every progress change.
    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.progress.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state().snapshot.clone()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.state().snapshot.nodes.clone()
    }

    pub fn stats(&self) -> Option<Stats> {
        self.state().snapshot.stats.clone()
    }

    /// Runs `config.n_epochs` epochs.
    ///
    /// The engine is initialized first when the snapshot is empty (a fresh
    /// simulation); otherwise the run continues the engine's existing state.
    /// On engine failure the last applied snapshot is kept.
    ///
    /// Dropping the returned future (an external timeout, say) stops the run
    /// and returns the driver to `Idle` with the last applied snapshot.
    pub async fn run(&self, config: &SimulationConfig) -> Result<RunOutcome, DriverError> {
        let (run, needs_initialize) = {
            let mut state = self.state();
            if state.phase != DriverPhase::Idle {
                return Err(DriverError::RunInProgress);
            }
            let needs_initialize = state.snapshot.nodes.is_empty();
            state.phase = if needs_initialize {
                DriverPhase::Initializing
            } else {
                DriverPhase::Running
            };
            state.generation += 1;
            (state.generation, needs_initialize)
        };
        let _guard = RunGuard { driver: self, run };
        info!(
            run,
            epochs = config.n_epochs,
            nodes = config.n_nodes,
            chunk_size = self.chunk_size,
            needs_initialize,
            "simulation run started"
        );

        let result = {
            let mut engine = self.engine.lock().await;
            self.run_chunks(&mut engine, config, needs_initialize, run)
                .await
        };

        match &result {
            Ok(RunOutcome::Completed { chunks }) => {
                info!(run, chunks, "simulation run completed");
            }
            Ok(RunOutcome::Cancelled { chunks_applied }) => {
                info!(run, chunks_applied, "simulation run cancelled");
            }
            Err(error) => {
                warn!(run, %error, "simulation run aborted");
            }
        }
        result
    }

    /// Returns the driver to `Idle` with an empty snapshot and zero progress.
    ///
    /// An in-flight run stops at its next yield point without issuing further
    /// engine calls, and a chunk it still has in flight is discarded.
    pub async fn reset(&self) {
        let mut state = self.state();
        if state.phase != DriverPhase::Idle {
            state.generation += 1;
            debug!(phase = ?state.phase, "cancellation requested");
        }
        state.phase = DriverPhase::Idle;
        state.snapshot = Snapshot::default();
        self.set_progress(0.0);
    }

    async fn run_chunks(
        &self,
        engine: &mut E,
        config: &SimulationConfig,
        needs_initialize: bool,
        run: u64,
    ) -> Result<RunOutcome, DriverError> {
        if needs_initialize {
            engine.initialize(config).await?;
            let mut state = self.state();
            if state.generation != run {
                return Ok(RunOutcome::Cancelled { chunks_applied: 0 });
            }
            state.snapshot = Snapshot::default();
            state.phase = DriverPhase::Running;
        }

        let plan = chunk_plan(config.n_epochs, self.chunk_size);
        let chunks = plan.len();
        for (i, steps) in plan.into_iter().enumerate() {
            if self.is_superseded(run) {
                return Ok(RunOutcome::Cancelled { chunks_applied: i });
            }

            let result = engine.advance(steps).await?;

            let progress = (i + 1) as f64 / chunks as f64 * 100.0;
            {
                let mut state = self.state();
                if state.generation != run {
                    debug!(run, chunk = i, "discarding chunk finished after reset");
                    return Ok(RunOutcome::Cancelled { chunks_applied: i });
                }
                state.snapshot = Snapshot::from(result);
                self.set_progress(progress);
            }
            debug!(run, chunk = i, steps, progress, "chunk applied");

            self.yield_point().await;
        }

        Ok(RunOutcome::Completed { chunks })
    }

    /// Hands control back to the scheduler between chunks.
    async fn yield_point(&self) {
        tokio::task::yield_now().await;
    }

    /// A reset since `run` started.
    fn is_superseded(&self, run: u64) -> bool {
        self.state().generation != run
    }

    fn set_progress(&self, value: f64) {
        self.progress.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    fn state(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{normalize, FormFields};
    use crate::test_helpers::{EngineCall, ScriptedEngine};

    fn config_with_epochs(epochs: usize) -> SimulationConfig {
        let form = FormFields::default()
            .with("nEpochs", epochs.to_string())
            .with("nNodes", "12");
        normalize(&form).expect("valid form")
    }

    #[test]
    fn chunk_plan_splits_epochs() {
        assert_eq!(chunk_plan(100, 25), vec![25, 25, 25, 25]);
        assert_eq!(chunk_plan(30, 25), vec![25, 5]);
        assert_eq!(chunk_plan(25, 25), vec![25]);
        assert_eq!(chunk_plan(1, 25), vec![1]);
        assert!(chunk_plan(0, 25).is_empty());
        assert!(chunk_plan(10, 0).is_empty());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let result = SimulationDriver::with_config(
            ScriptedEngine::new(3),
            DriverConfig { chunk_size: 0 },
        );
        assert!(matches!(result, Err(DriverError::InvalidChunkSize)));
    }

    #[tokio::test]
    async fn run_issues_chunks_and_clears_progress() {
        let engine = ScriptedEngine::new(12);
        let log = engine.log();
        let driver = SimulationDriver::new(engine);

        let outcome = driver.run(&config_with_epochs(30)).await.expect("run succeeds");

        assert_eq!(outcome, RunOutcome::Completed { chunks: 2 });
        assert_eq!(
            log.calls(),
            vec![
                EngineCall::Initialize { n_nodes: 12 },
                EngineCall::Advance { steps: 25 },
                EngineCall::Advance { steps: 5 },
            ]
        );
        assert_eq!(driver.progress(), 0.0);
        assert_eq!(driver.phase(), DriverPhase::Idle);
        assert_eq!(driver.nodes().len(), 12);
        assert_eq!(driver.stats().map(|stats| stats.epochs()), Some(30));
    }

    #[tokio::test]
    async fn second_run_continues_without_initialize() {
        let engine = ScriptedEngine::new(12);
        let log = engine.log();
        let driver = SimulationDriver::new(engine);
        let config = config_with_epochs(10);

        driver.run(&config).await.expect("first run");
        driver.run(&config).await.expect("second run");

        assert_eq!(log.initialize_count(), 1);
        assert_eq!(driver.stats().map(|stats| stats.epochs()), Some(20));
    }

    #[tokio::test]
    async fn reset_while_idle_clears_snapshot_and_reinitializes_next_run() {
        let engine = ScriptedEngine::new(12);
        let log = engine.log();
        let driver = SimulationDriver::new(engine);
        let config = config_with_epochs(5);

        driver.run(&config).await.expect("first run");
        driver.reset().await;
        assert!(driver.snapshot().is_empty());

        driver.run(&config).await.expect("run after reset");
        assert_eq!(log.initialize_count(), 2);
    }
}
