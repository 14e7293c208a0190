pub mod config;
pub use config::SimConfig;

use crate::client::EdgeClient;
use crate::metrics::{MetricsSink, analyzer};
use crate::monitor::{CpuMonitor, FixedLoad, LoadSampler};
use crate::policy::PolicyRegistry;
use crate::server::{Aggregator, RoundOutcome, SharedClient};
use crate::vision::{FrameSource, SyntheticDetector, SyntheticFrameSource, SyntheticPredictor};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Drives the frame loop: a scheduling check on every client each frame,
/// per-client inference when wired, and an aggregation round every
/// `round_interval` frames.
pub struct Simulation {
    config: SimConfig,
    pub metrics: MetricsSink,
    clients: Vec<SharedClient>,
    aggregator: Aggregator,
    source: Box<dyn FrameSource>,
    frame_num: u64,
    round: u64,
    last_outcome: Option<RoundOutcome>,
}

impl Simulation {
    /// Builds the sink, clients and capabilities. Capability construction
    /// failures surface here, before any frame runs.
    pub fn new(config: SimConfig) -> Result<Self> {
        let metrics = MetricsSink::open(&config.log_dir)?;

        let mut clients = Vec::new();
        for id in 1..=config.num_clients {
            let low_resource = config.low_resource_clients.contains(&id);
            let seed = config.seed.wrapping_add(id as u64);

            let detector =
                SyntheticDetector::new(config.conf_threshold, config.max_faces, seed)?;
            let predictor =
                SyntheticPredictor::new(config.smoothing_window, low_resource, seed)?;
            let sampler: Box<dyn LoadSampler> = match config.fixed_load {
                Some(load) => Box::new(FixedLoad(load)),
                None => Box::new(CpuMonitor::new()),
            };
            let policy = PolicyRegistry::global()
                .create(&config.policy_name)
                .ok_or_else(|| anyhow::anyhow!("Unknown policy: {}", config.policy_name))?;

            metrics.register_client(id)?;
            clients.push(Arc::new(Mutex::new(EdgeClient::new(
                id,
                low_resource,
                config.pad,
                Box::new(detector),
                Box::new(predictor),
                sampler,
                policy,
                metrics.clone(),
                seed,
            ))));
        }

        let aggregator = Aggregator::new(metrics.clone());
        let source = Box::new(SyntheticFrameSource::new(
            config.frame_width,
            config.frame_height,
            config.seed,
        ));

        Ok(Self {
            config,
            metrics,
            clients,
            aggregator,
            source,
            frame_num: 0,
            round: 0,
            last_outcome: None,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Starting simulation: {}", self.config.name);
        info!("Policy: {}", self.config.policy_name);
        info!(
            "Clients: {} ({} low-resource), round every {} frames",
            self.config.num_clients,
            self.config.low_resource_clients.len(),
            self.config.round_interval
        );
        info!("Frames: {}", self.config.frames);

        let cancel_token = CancellationToken::new();
        let cancel = cancel_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping after this frame");
                cancel.cancel();
            }
        });

        let pb = ProgressBar::new(self.config.frames);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.orange/yellow} {pos}/{len} frames {msg}")?
                .progress_chars("█▓░"),
        );

        let mut tick = (self.config.fps > 0.0)
            .then(|| interval(Duration::from_secs_f64(1.0 / self.config.fps)));

        for _ in 0..self.config.frames {
            if cancel_token.is_cancelled() {
                break;
            }
            if let Some(tick) = tick.as_mut() {
                tick.tick().await;
            }

            self.step()?;

            pb.inc(1);
            pb.set_message(match &self.last_outcome {
                Some(outcome) => format!(
                    "| Round {} | Acc: {:.4} | Upd: {:.4}",
                    outcome.round, outcome.global_accuracy, outcome.global_update_magnitude
                ),
                None => format!("| Round {}", self.round),
            });
        }

        pb.finish_with_message("Simulation complete");

        self.save_results()?;
        Ok(())
    }

    /// One frame of the loop. Scheduling runs every frame regardless of
    /// round boundaries; the round counter increments before aggregation.
    pub fn step(&mut self) -> Result<()> {
        self.frame_num += 1;

        for client in &self.clients {
            client.lock().check_resources(self.config.cpu_threshold);
        }

        if self.config.inference {
            let frame = self.source.next_frame()?;
            for client in &self.clients {
                client.lock().process_frame(&frame, self.round)?;
            }
        }

        if self.frame_num % self.config.round_interval == 0 {
            self.round += 1;
            info!("[SERVER] Aggregation round {}", self.round);
            if let Some(outcome) = self.aggregator.aggregate(&self.clients, self.round)? {
                self.last_outcome = Some(outcome);
            }
        }

        Ok(())
    }

    pub fn frame_num(&self) -> u64 {
        self.frame_num
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn clients(&self) -> &[SharedClient] {
        &self.clients
    }

    fn save_results(&self) -> Result<()> {
        let dir = self.metrics.dir();
        if !MetricsSink::server_log_path(&dir).exists() {
            info!("No aggregation round produced a record; nothing to analyze");
            return Ok(());
        }

        let records = analyzer::load_server_records(&dir)?;
        let report = analyzer::analyze(&records);

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let json_path = dir.join(format!("{}_{}_analysis.json", self.config.name, timestamp));
        std::fs::write(&json_path, serde_json::to_string_pretty(&report)?)?;
        info!("Analysis saved to: {}", json_path.display());

        info!("Rounds recorded: {}", report.rounds);
        info!("Avg global accuracy: {:.4}", report.avg_global_accuracy);
        info!("Avg update magnitude: {:.6}", report.avg_update_magnitude);

        Ok(())
    }
}
