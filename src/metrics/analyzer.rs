use super::{MetricsSink, ServerRecord, round_to};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Summary over the server stream of one or more runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub rounds: usize,
    pub first_round: u64,
    pub last_round: u64,
    pub avg_global_accuracy: f64,
    pub avg_update_magnitude: f64,
}

pub fn load_server_records(dir: &Path) -> Result<Vec<ServerRecord>> {
    let path = MetricsSink::server_log_path(dir);
    let mut reader = csv::Reader::from_path(&path)
        .with_context(|| format!("reading server log {}", path.display()))?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

pub fn analyze(records: &[ServerRecord]) -> RunReport {
    if records.is_empty() {
        return RunReport {
            rounds: 0,
            first_round: 0,
            last_round: 0,
            avg_global_accuracy: 0.0,
            avg_update_magnitude: 0.0,
        };
    }

    let n = records.len() as f64;
    RunReport {
        rounds: records.len(),
        first_round: records.iter().map(|r| r.round).min().unwrap_or(0),
        last_round: records.iter().map(|r| r.round).max().unwrap_or(0),
        avg_global_accuracy: round_to(
            records.iter().map(|r| r.global_accuracy).sum::<f64>() / n,
            4,
        ),
        avg_update_magnitude: round_to(records.iter().map(|r| r.global_mse).sum::<f64>() / n, 6),
    }
}
