use crate::client::EdgeClient;
use crate::metrics::{MetricsSink, ServerRecord};
use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

pub type SharedClient = Arc<Mutex<EdgeClient>>;

/// Asynchronous-FL weight: larger, more accurate and fresher clients
/// dominate the aggregate. Finite and non-negative for staleness >= 0,
/// accuracy >= 0 (denominator >= 1).
pub fn update_weight(dataset_size: u32, local_accuracy: f64, staleness: u32) -> f64 {
    (dataset_size as f64 * local_accuracy) / (1.0 + staleness as f64)
}

/// What one aggregation round produced, after rounding. Mirrors the
/// ServerRecord that was appended.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    pub round: u64,
    pub contributors: usize,
    pub global_accuracy: f64,
    pub global_update_magnitude: f64,
}

/// The server side of the protocol: collects pending client updates,
/// folds them into global metrics, appends one server record per round.
pub struct Aggregator {
    metrics: MetricsSink,
}

impl Aggregator {
    pub fn new(metrics: MetricsSink) -> Self {
        Self { metrics }
    }

    /// Runs one aggregation round over the client set.
    ///
    /// Contributors are clients holding a pending update; their updates
    /// are consumed here whether or not a record gets written. Returns
    /// None for rounds that produce no record: no contributors, or a
    /// degenerate round where no finite weighted mean exists.
    ///
    /// The global accuracy deliberately averages over ALL clients with
    /// positive accuracy while the update magnitude is weighted over
    /// contributors only. Historical behavior, kept as-is.
    pub fn aggregate(&self, clients: &[SharedClient], round_id: u64) -> Result<Option<RoundOutcome>> {
        let mut weights = Vec::new();
        let mut updates = Vec::new();
        let mut accuracies = Vec::new();

        for client in clients {
            let mut client = client.lock();

            if client.has_pending_update() {
                weights.push(update_weight(
                    client.dataset_size(),
                    client.local_accuracy(),
                    client.staleness(),
                ));
                updates.push(client.update_norm());
                client.consume_update();
            }

            if client.local_accuracy() > 0.0 {
                accuracies.push(client.local_accuracy());
            }
        }

        if updates.is_empty() {
            debug!("round {}: no contributors", round_id);
            return Ok(None);
        }

        let weight_sum: f64 = weights.iter().sum();
        if weight_sum <= 0.0 || accuracies.is_empty() {
            debug!(
                "round {}: degenerate ({} contributors, weight sum {:.4}, {} accuracy samples), no record",
                round_id,
                updates.len(),
                weight_sum,
                accuracies.len()
            );
            return Ok(None);
        }

        let global_update_magnitude = weights
            .iter()
            .zip(&updates)
            .map(|(w, u)| w * u)
            .sum::<f64>()
            / weight_sum;
        let global_accuracy = accuracies.iter().sum::<f64>() / accuracies.len() as f64;

        let record = ServerRecord::new(round_id, global_accuracy, global_update_magnitude);
        self.metrics.log_server(&record)?;

        info!(
            "round {}: {} contributors, global accuracy {:.4}, update magnitude {:.6}",
            round_id,
            updates.len(),
            record.global_accuracy,
            record.global_mse
        );

        Ok(Some(RoundOutcome {
            round: round_id,
            contributors: updates.len(),
            global_accuracy: record.global_accuracy,
            global_update_magnitude: record.global_mse,
        }))
    }
}
