pub mod client;
pub mod server;
pub mod monitor;
pub mod vision;
pub mod policy;
pub mod metrics;
pub mod simulation;

pub use client::EdgeClient;
pub use server::Aggregator;
pub use monitor::LoadSampler;
pub use policy::AccuracyPolicy;
pub use simulation::{Simulation, SimConfig};
pub use metrics::MetricsSink;

pub mod prelude {
    pub use crate::client::EdgeClient;
    pub use crate::server::{Aggregator, RoundOutcome};
    pub use crate::monitor::{CpuMonitor, FixedLoad, LoadSampler};
    pub use crate::policy::{AccuracyPolicy, PolicyRegistry};
    pub use crate::simulation::{Simulation, SimConfig};
    pub use crate::vision::{Detection, FaceDetector, Frame, Prediction};
    pub use crate::metrics::{ClientRecord, MetricsSink, ServerRecord};
}
