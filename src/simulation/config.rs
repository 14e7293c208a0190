use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub name: String,
    /// Accuracy policy looked up in the global registry.
    pub policy_name: String,
    pub num_clients: u32,
    /// Client ids that deactivate under load pressure.
    pub low_resource_clients: Vec<u32>,
    pub frames: u64,
    /// Frames between aggregation rounds.
    pub round_interval: u64,
    /// CPU percentage above which low-resource clients skip.
    pub cpu_threshold: f64,
    /// Minimum detector confidence, enforced inside the detector.
    pub conf_threshold: f32,
    pub max_faces: u32,
    /// Label smoothing history length for the predictor.
    pub smoothing_window: usize,
    /// Padding around detection boxes before prediction, in pixels.
    pub pad: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Frame pacing; 0 runs unpaced.
    pub fps: f64,
    /// false runs scheduling + aggregation only, no per-frame inference.
    pub inference: bool,
    /// Replaces the CPU sampler with a constant, for reproducible runs.
    pub fixed_load: Option<f64>,
    pub seed: u64,
    pub log_dir: PathBuf,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "edge_sim".to_string(),
            policy_name: "bernoulli".to_string(),
            num_clients: 3,
            low_resource_clients: vec![2, 3],
            frames: 300,
            round_interval: 30,
            cpu_threshold: 50.0,
            conf_threshold: 0.6,
            max_faces: 3,
            smoothing_window: 7,
            pad: 25,
            frame_width: 640,
            frame_height: 480,
            fps: 0.0,
            inference: true,
            fixed_load: None,
            seed: 42,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl SimConfig {
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy_name = policy.into();
        self
    }

    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_round_interval(mut self, round_interval: u64) -> Self {
        self.round_interval = round_interval;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }
}
