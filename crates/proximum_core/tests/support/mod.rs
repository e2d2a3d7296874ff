#![allow(dead_code)]

use proximum_core::config::{normalize, FormFields, SimulationConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Stock form with the node and epoch counts overridden.
pub fn form_with(n_nodes: usize, n_epochs: usize) -> FormFields {
    FormFields::default()
        .with("nNodes", n_nodes.to_string())
        .with("nEpochs", n_epochs.to_string())
}

pub fn config_with(n_nodes: usize, n_epochs: usize) -> SimulationConfig {
    normalize(&form_with(n_nodes, n_epochs)).expect("test form should normalize")
}

/// Records every progress value published until it drops back to 0 after a
/// non-zero value (end of a run) or the driver goes away.
pub fn collect_progress(mut rx: watch::Receiver<f64>) -> JoinHandle<Vec<f64>> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let value = *rx.borrow_and_update();
            seen.push(value);
            if value == 0.0 && seen.len() > 1 {
                break;
            }
        }
        seen
    })
}
