//! Contract of the external estimation engine.
//!
//! The engine is stateful: `initialize` starts a fresh simulation and every
//! `advance` returns the *cumulative* state (all nodes, every completed
//! epoch's stats), never a delta.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SimulationConfig;
use crate::node::Node;
use crate::stats::Stats;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine initialization failed: {0}")]
    Initialize(String),
    #[error("engine advance failed: {0}")]
    Advance(String),
    #[error("engine is not initialized")]
    NotInitialized,
}

/// Cumulative engine state returned by one `advance` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub nodes: Vec<Node>,
    pub stats: Stats,
}

impl ChunkResult {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Stepped estimation engine driven by [`crate::driver::SimulationDriver`].
#[allow(async_fn_in_trait)]
pub trait EstimationEngine {
    async fn initialize(&mut self, config: &SimulationConfig) -> Result<(), EngineError>;

    /// Runs `steps` more epochs and returns the cumulative state.
    async fn advance(&mut self, steps: usize) -> Result<ChunkResult, EngineError>;
}

/// Plays back previously recorded chunk results in order.
///
/// Each `advance` returns the next recording regardless of `steps`;
/// `initialize` rewinds to the first one.
#[derive(Debug, Clone, Default)]
pub struct ReplayEngine {
    chunks: Vec<ChunkResult>,
    cursor: usize,
    initialized: bool,
}

impl ReplayEngine {
    pub fn new(chunks: Vec<ChunkResult>) -> Self {
        Self {
            chunks,
            cursor: 0,
            initialized: false,
        }
    }

    /// Parses one JSON chunk per non-empty line.
    pub fn from_json_lines(text: &str) -> Result<Self, serde_json::Error> {
        let chunks = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(ChunkResult::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(chunks))
    }

    pub fn remaining(&self) -> usize {
        self.chunks.len().saturating_sub(self.cursor)
    }
}

impl EstimationEngine for ReplayEngine {
    async fn initialize(&mut self, _config: &SimulationConfig) -> Result<(), EngineError> {
        self.cursor = 0;
        self.initialized = true;
        Ok(())
    }

    async fn advance(&mut self, steps: usize) -> Result<ChunkResult, EngineError> {
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }
        let chunk = self.chunks.get(self.cursor).cloned().ok_or_else(|| {
            EngineError::Advance(format!(
                "recording exhausted after {} chunk(s), {steps} more step(s) requested",
                self.cursor
            ))
        })?;
        self.cursor += 1;
        Ok(chunk)
    }
}
