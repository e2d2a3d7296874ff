use serde::{Deserialize, Serialize};

/// Per-epoch root-mean-square position error in meters, one entry per
/// completed epoch for each estimation method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(rename = "ls_estimation_rms_error")]
    pub ls_rms_error: Vec<f64>,
    #[serde(rename = "kf_estimation_rms_error")]
    pub kf_rms_error: Vec<f64>,
    pub assertion_rms_error: Vec<f64>,
}

/// One chart row: epoch number (1-based) and errors in kilometers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorRow {
    pub epoch: usize,
    pub ls_km: f64,
    pub kf_km: f64,
    pub asserted_km: f64,
}

impl Stats {
    /// Completed epochs; the shortest series bounds it if the engine ever
    /// returns ragged arrays.
    pub fn epochs(&self) -> usize {
        self.ls_rms_error
            .len()
            .min(self.kf_rms_error.len())
            .min(self.assertion_rms_error.len())
    }

    pub fn is_empty(&self) -> bool {
        self.epochs() == 0
    }

    pub fn error_rows_km(&self) -> Vec<ErrorRow> {
        (0..self.epochs())
            .map(|i| ErrorRow {
                epoch: i + 1,
                ls_km: self.ls_rms_error[i] / 1000.0,
                kf_km: self.kf_rms_error[i] / 1000.0,
                asserted_km: self.assertion_rms_error[i] / 1000.0,
            })
            .collect()
    }

    pub fn latest(&self) -> Option<ErrorRow> {
        self.error_rows_km().pop()
    }
}
