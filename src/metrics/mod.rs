pub mod analyzer;
pub mod sink;

pub use sink::MetricsSink;

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One row per processed frame, per client. Field order is the on-disk
/// column order and is load-bearing for downstream tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub round: u64,
    pub client_id: u32,
    pub dataset_size: u32,
    pub staleness: u32,
    pub local_accuracy: f64,
    pub update_norm: f64,
    pub skipped: u8,
    pub cpu_usage: f64,
    pub latency: f64,
}

impl ClientRecord {
    /// Applies the stream's rounding contract: accuracy and update norm to
    /// 4 places, CPU to 2, latency to 4.
    pub fn new(
        round: u64,
        client_id: u32,
        dataset_size: u32,
        staleness: u32,
        local_accuracy: f64,
        update_norm: f64,
        skipped: bool,
        cpu_usage: f64,
        latency: f64,
    ) -> Self {
        Self {
            round,
            client_id,
            dataset_size,
            staleness,
            local_accuracy: round_to(local_accuracy, 4),
            update_norm: round_to(update_norm, 4),
            skipped: skipped as u8,
            cpu_usage: round_to(cpu_usage, 2),
            latency: round_to(latency, 4),
        }
    }
}

/// One row per aggregated round. `global_mse` keeps its historical name
/// even though it holds a weighted mean of update magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub round: u64,
    pub global_accuracy: f64,
    pub global_mse: f64,
    pub server_time: f64,
}

impl ServerRecord {
    pub fn new(round: u64, global_accuracy: f64, global_mse: f64) -> Self {
        Self {
            round,
            global_accuracy: round_to(global_accuracy, 4),
            global_mse: round_to(global_mse, 6),
            server_time: epoch_seconds(),
        }
    }
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
