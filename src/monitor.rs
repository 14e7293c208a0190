use std::fmt;
use std::time::Duration;

use sysinfo::{CpuExt, System, SystemExt};

/// Source of instantaneous system load, as a percentage in [0, 100].
///
/// Sampling is allowed to block for a bounded window (the refresh delta
/// below), never indefinitely. There is no failure mode; implementations
/// return a best-effort value.
pub trait LoadSampler: Send + fmt::Debug {
    fn sample(&mut self) -> f64;
    fn name(&self) -> &str;
}

/// CPU utilization sampler backed by sysinfo.
///
/// sysinfo computes usage as a delta between two refreshes, so each sample
/// blocks for `window` (default 100ms) between them.
#[derive(Debug)]
pub struct CpuMonitor {
    system: System,
    window: Duration,
}

impl CpuMonitor {
    pub fn new() -> Self {
        Self::with_window(Duration::from_millis(100))
    }

    pub fn with_window(window: Duration) -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        Self { system, window }
    }
}

impl Default for CpuMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSampler for CpuMonitor {
    fn sample(&mut self) -> f64 {
        std::thread::sleep(self.window);
        self.system.refresh_cpu();
        (self.system.global_cpu_info().cpu_usage() as f64).clamp(0.0, 100.0)
    }

    fn name(&self) -> &str {
        "cpu"
    }
}

/// Constant-load sampler for tests and scheduling-only runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedLoad(pub f64);

impl LoadSampler for FixedLoad {
    fn sample(&mut self) -> f64 {
        self.0.clamp(0.0, 100.0)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
