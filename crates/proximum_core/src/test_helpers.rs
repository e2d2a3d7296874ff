//! Test helpers: deterministic nodes, recorded chunks and a scripted engine.
//!
//! Shared by unit tests, the integration tests under `tests/` and the benches.

use std::f64::consts::PI;
use std::sync::{Arc, Mutex, PoisonError};

use h3o::{CellIndex, LatLng, Resolution};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Notify;

use crate::config::SimulationConfig;
use crate::engine::{ChunkResult, EngineError, EstimationEngine};
use crate::node::{Node, Position, Uncertainty, Wgs84};
use crate::stats::Stats;

/// A valid resolution 10 cell in the San Francisco Bay Area.
pub const TEST_CELL: u64 = 0x8a1fb46622dffff;

/// Center of the synthetic network, in degrees.
pub const TEST_CENTER: (f64, f64) = (37.7749, -122.4194);

/// # Panics
///
/// Panics if the test cell constant is invalid (should never happen).
pub fn test_cell() -> CellIndex {
    CellIndex::try_from(TEST_CELL).expect("TEST_CELL should be a valid H3 cell")
}

/// Position at the given coordinate, indexed at resolution 9.
///
/// # Panics
///
/// Panics on a non-finite coordinate.
pub fn position_at(lat_deg: f64, lng_deg: f64) -> Position {
    let wgs84 = Wgs84::from_degrees(lat_deg, lng_deg);
    let index = LatLng::new(lat_deg, lng_deg)
        .expect("finite test coordinate")
        .to_cell(Resolution::Nine);
    Position {
        index,
        ecef: wgs84.to_ecef(),
        wgs84,
    }
}

/// A node with fixed, easily predicted values.
///
/// Estimates are offset from the truth by small, distinct amounts and the
/// uncertainty ellipse points due east with variances 4e4 / 1e4 m².
pub fn sample_node(id: usize) -> Node {
    let lat = TEST_CENTER.0 + id as f64 * 0.01;
    let lng = TEST_CENTER.1;
    Node {
        id,
        true_position: position_at(lat, lng),
        true_message_speed: 2.0e8,
        true_latency: 0.002,
        asserted_position: position_at(lat + 0.002, lng),
        ls_position: position_at(lat, lng + 0.001),
        kf_position: position_at(lat + 0.0005, lng + 0.0005),
        kf_estimated_message_speed: 1.9e8,
        kf_estimated_latency: 0.0025,
        uncertainty: Uncertainty {
            major_axis: [1.0, 0.0],
            minor_axis: None,
            major_variance: 4.0e4,
            minor_variance: 1.0e4,
        },
    }
}

/// `n` nodes scattered around [`TEST_CENTER`], reproducible per `seed`.
pub fn synthetic_nodes(n: usize, seed: u64) -> Vec<Node> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|id| {
            let lat = TEST_CENTER.0 + rng.gen_range(-0.08..0.08);
            let lng = TEST_CENTER.1 + rng.gen_range(-0.08..0.08);
            let mut jitter = || rng.gen_range(-0.005..0.005);
            let asserted = (lat + jitter(), lng + jitter());
            let ls = (lat + jitter(), lng + jitter());
            let kf = (lat + jitter(), lng + jitter());

            let angle: f64 = rng.gen_range(0.0..PI);
            let (sin, cos) = angle.sin_cos();
            let major_variance = rng.gen_range(1.0e4..1.0e6);
            let minor_variance = major_variance * rng.gen_range(0.1..1.0);

            Node {
                id,
                true_position: position_at(lat, lng),
                true_message_speed: rng.gen_range(1.5e8..2.5e8),
                true_latency: rng.gen_range(0.0..0.01),
                asserted_position: position_at(asserted.0, asserted.1),
                ls_position: position_at(ls.0, ls.1),
                kf_position: position_at(kf.0, kf.1),
                kf_estimated_message_speed: rng.gen_range(1.5e8..2.5e8),
                kf_estimated_latency: rng.gen_range(0.0..0.01),
                uncertainty: Uncertainty {
                    major_axis: [cos, sin],
                    minor_axis: Some([-sin, cos]),
                    major_variance,
                    minor_variance,
                },
            }
        })
        .collect()
}

/// Error series for `epochs` completed epochs; estimates improve each epoch.
pub fn synthetic_stats(epochs: usize) -> Stats {
    let decay = |scale: f64, floor: f64| {
        (0..epochs)
            .map(|i| scale / (i + 1) as f64 + floor)
            .collect::<Vec<_>>()
    };
    Stats {
        ls_rms_error: decay(5000.0, 0.0),
        kf_rms_error: decay(3000.0, 100.0),
        assertion_rms_error: vec![8000.0; epochs],
    }
}

pub fn synthetic_chunk(n_nodes: usize, epochs: usize, seed: u64) -> ChunkResult {
    ChunkResult {
        nodes: synthetic_nodes(n_nodes, seed),
        stats: synthetic_stats(epochs),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCall {
    Initialize { n_nodes: usize },
    Advance { steps: usize },
}

/// Shared record of the calls a [`ScriptedEngine`] received.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<EngineCall>>>);

impl CallLog {
    fn record(&self, call: EngineCall) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn advance_steps(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Advance { steps } => Some(steps),
                EngineCall::Initialize { .. } => None,
            })
            .collect()
    }

    pub fn initialize_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, EngineCall::Initialize { .. }))
            .count()
    }
}

/// Holds one `advance` call open until the test releases it.
#[derive(Debug, Default)]
pub struct ChunkGate {
    entered: Notify,
    released: Notify,
}

impl ChunkGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Resolves once the gated `advance` call has started.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

/// In-process engine returning synthetic cumulative results.
///
/// Failures and a gate can be scripted for a given advance call (0-based).
#[derive(Debug)]
pub struct ScriptedEngine {
    seed: u64,
    n_nodes: usize,
    total_epochs: usize,
    advances: usize,
    initialized: bool,
    fail_initialize: bool,
    fail_at_advance: Option<usize>,
    gate: Option<(usize, Arc<ChunkGate>)>,
    log: CallLog,
}

impl ScriptedEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            n_nodes: 0,
            total_epochs: 0,
            advances: 0,
            initialized: false,
            fail_initialize: false,
            fail_at_advance: None,
            gate: None,
            log: CallLog::default(),
        }
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn failing_at_advance(mut self, call: usize) -> Self {
        self.fail_at_advance = Some(call);
        self
    }

    pub fn gated_at_advance(mut self, call: usize, gate: Arc<ChunkGate>) -> Self {
        self.gate = Some((call, gate));
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl EstimationEngine for ScriptedEngine {
    async fn initialize(&mut self, config: &SimulationConfig) -> Result<(), EngineError> {
        self.log.record(EngineCall::Initialize {
            n_nodes: config.n_nodes,
        });
        if self.fail_initialize {
            return Err(EngineError::Initialize("scripted failure".to_string()));
        }
        self.n_nodes = config.n_nodes;
        self.total_epochs = 0;
        self.initialized = true;
        Ok(())
    }

    async fn advance(&mut self, steps: usize) -> Result<ChunkResult, EngineError> {
        self.log.record(EngineCall::Advance { steps });
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }
        let call = self.advances;
        self.advances += 1;

        if let Some((gated_call, gate)) = &self.gate {
            if *gated_call == call {
                gate.entered.notify_one();
                gate.released.notified().await;
            }
        }
        if self.fail_at_advance == Some(call) {
            return Err(EngineError::Advance(format!("scripted failure at call {call}")));
        }

        self.total_epochs += steps;
        Ok(ChunkResult {
            nodes: synthetic_nodes(self.n_nodes, self.seed.wrapping_add(self.total_epochs as u64)),
            stats: synthetic_stats(self.total_epochs),
        })
    }
}
