use crate::metrics::{ClientRecord, MetricsSink};
use crate::monitor::LoadSampler;
use crate::policy::AccuracyPolicy;
use crate::vision::{AgePredictor, FaceDetector, Frame};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::time::Instant;
use tracing::{debug, trace};

const DATASET_SIZE_MIN: u32 = 80;
const DATASET_SIZE_MAX: u32 = 300;
const FULL_UPDATE_MEAN: f64 = 1.0;
const PARTIAL_UPDATE_MEAN: f64 = 0.5;
const UPDATE_NORM_SPREAD: f64 = 0.1;

/// One simulated federated participant.
///
/// Owns its inference capabilities, load sampler and accuracy policy;
/// everything it mutates is its own state. Aggregation reads the fields
/// through accessors and consumes the pending update explicitly.
#[derive(Debug)]
pub struct EdgeClient {
    id: u32,
    low_resource: bool,
    dataset_size: u32,
    local_accuracy: f64,
    update_norm: f64,
    staleness: u32,
    has_update: bool,
    active: bool,
    pad: u32,
    detector: Box<dyn FaceDetector>,
    predictor: Box<dyn AgePredictor>,
    sampler: Box<dyn LoadSampler>,
    policy: Box<dyn AccuracyPolicy>,
    update_dist: Normal<f64>,
    metrics: MetricsSink,
    rng: StdRng,
}

impl EdgeClient {
    pub fn new(
        id: u32,
        low_resource: bool,
        pad: u32,
        detector: Box<dyn FaceDetector>,
        predictor: Box<dyn AgePredictor>,
        sampler: Box<dyn LoadSampler>,
        policy: Box<dyn AccuracyPolicy>,
        metrics: MetricsSink,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let dataset_size = rng.gen_range(DATASET_SIZE_MIN..=DATASET_SIZE_MAX);

        // Partial (frozen-layer) participants produce smaller updates
        let mean = if low_resource {
            PARTIAL_UPDATE_MEAN
        } else {
            FULL_UPDATE_MEAN
        };
        let update_dist = Normal::new(mean, UPDATE_NORM_SPREAD).unwrap();

        debug!(
            "client {} up: dataset {}, low_resource {}, policy {}",
            id,
            dataset_size,
            low_resource,
            policy.name()
        );

        Self {
            id,
            low_resource,
            dataset_size,
            local_accuracy: 0.0,
            update_norm: 0.0,
            staleness: 0,
            has_update: false,
            active: true,
            pad,
            detector,
            predictor,
            sampler,
            policy,
            update_dist,
            metrics,
            rng,
        }
    }

    /// Adaptive scheduling check, once per frame. A loaded machine only
    /// deactivates clients flagged as low-resource; each skipped frame
    /// bumps their staleness.
    pub fn check_resources(&mut self, cpu_threshold: f64) -> bool {
        let cpu = self.sampler.sample();

        if cpu > cpu_threshold && self.low_resource {
            self.active = false;
            self.staleness += 1;
            debug!(
                "client {} skipped: cpu {:.1}% over {:.1}%, staleness {}",
                self.id, cpu, cpu_threshold, self.staleness
            );
        } else {
            self.active = true;
        }

        self.active
    }

    /// Local inference over one frame. No-op while inactive. On success
    /// the client holds a pending update until aggregation consumes it,
    /// and one record lands in its metric stream.
    pub fn process_frame(&mut self, frame: &Frame, round_id: u64) -> Result<()> {
        if !self.active {
            return Ok(());
        }

        let start = Instant::now();
        let detections = self.detector.detect(frame)?;

        let mut correct = 0u32;
        let mut total = 0u32;

        for detection in &detections {
            let Some(region) = frame.crop_padded(&detection.bbox, self.pad) else {
                continue;
            };
            let prediction = self.predictor.predict(&region)?;
            trace!(
                "client {} detection: {} {} (conf {:.2})",
                self.id, prediction.gender, prediction.age_bucket, detection.confidence
            );

            if self.policy.detection_correct(&mut self.rng) {
                correct += 1;
            }
            total += 1;
        }

        self.local_accuracy = if total > 0 {
            f64::from(correct) / f64::from(total)
        } else {
            self.policy.fallback_accuracy(&mut self.rng)
        };

        self.update_norm = self.update_dist.sample(&mut self.rng).abs();
        self.has_update = true;
        self.staleness = 0;

        let cpu = self.sampler.sample();
        let latency = start.elapsed().as_secs_f64();

        let record = ClientRecord::new(
            round_id,
            self.id,
            self.dataset_size,
            self.staleness,
            self.local_accuracy,
            self.update_norm,
            false,
            cpu,
            latency,
        );
        self.metrics.log_client(&record)?;

        Ok(())
    }

    /// Marks the pending update as consumed by an aggregation round.
    pub fn consume_update(&mut self) {
        self.has_update = false;
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_low_resource(&self) -> bool {
        self.low_resource
    }

    pub fn dataset_size(&self) -> u32 {
        self.dataset_size
    }

    pub fn local_accuracy(&self) -> f64 {
        self.local_accuracy
    }

    pub fn update_norm(&self) -> f64 {
        self.update_norm
    }

    pub fn staleness(&self) -> u32 {
        self.staleness
    }

    pub fn has_pending_update(&self) -> bool {
        self.has_update
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
impl EdgeClient {
    pub(crate) fn force_dataset_size(&mut self, dataset_size: u32) {
        self.dataset_size = dataset_size;
    }

    pub(crate) fn force_state(
        &mut self,
        local_accuracy: f64,
        update_norm: f64,
        staleness: u32,
        has_update: bool,
    ) {
        self.local_accuracy = local_accuracy;
        self.update_norm = update_norm;
        self.staleness = staleness;
        self.has_update = has_update;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::FixedLoad;
    use crate::policy::builtin::{Bernoulli, Perfect};
    use crate::vision::{BoundingBox, Detection, Prediction};

    #[derive(Debug)]
    struct ScriptedDetector(Vec<Detection>);

    impl FaceDetector for ScriptedDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[derive(Debug)]
    struct StubPredictor;

    impl AgePredictor for StubPredictor {
        fn predict(&mut self, _region: &Frame) -> Result<Prediction> {
            Ok(Prediction {
                gender: "Male",
                age_bucket: "(25-32)",
            })
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn detection(x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            confidence: 0.9,
        }
    }

    fn frame() -> Frame {
        Frame::new(64, 64, vec![0; 64 * 64])
    }

    fn client(
        low_resource: bool,
        load: f64,
        detections: Vec<Detection>,
        sink: MetricsSink,
    ) -> EdgeClient {
        EdgeClient::new(
            1,
            low_resource,
            4,
            Box::new(ScriptedDetector(detections)),
            Box::new(StubPredictor),
            Box::new(FixedLoad(load)),
            Box::new(Bernoulli::reference()),
            sink,
            42,
        )
    }

    fn temp_sink() -> (tempfile::TempDir, MetricsSink) {
        let dir = tempfile::tempdir().unwrap();
        let sink = MetricsSink::open(dir.path()).unwrap();
        (dir, sink)
    }

    #[test]
    fn staleness_counts_consecutive_skips_and_resets_on_processing() {
        let (_dir, sink) = temp_sink();
        let mut client = client(true, 90.0, vec![detection(10, 10, 30, 30)], sink);

        for expected in 1..=3 {
            assert!(!client.check_resources(50.0));
            assert_eq!(client.staleness(), expected);
        }

        // Load below threshold: client reactivates, processing resets staleness
        assert!(client.check_resources(95.0));
        client.process_frame(&frame(), 1).unwrap();
        assert_eq!(client.staleness(), 0);
        assert!(client.has_pending_update());
    }

    #[test]
    fn full_clients_ignore_load_pressure() {
        let (_dir, sink) = temp_sink();
        let mut client = client(false, 99.0, vec![], sink);
        assert!(client.check_resources(10.0));
        assert_eq!(client.staleness(), 0);
    }

    #[test]
    fn skipped_frame_is_a_noop() {
        let (dir, sink) = temp_sink();
        let mut client = client(true, 90.0, vec![detection(10, 10, 30, 30)], sink);
        client.check_resources(50.0);
        client.process_frame(&frame(), 1).unwrap();

        assert!(!client.has_pending_update());
        assert_eq!(client.local_accuracy(), 0.0);
        assert!(!MetricsSink::client_log_path(dir.path(), 1).exists());
    }

    #[test]
    fn zero_detections_fall_back_to_plausible_accuracy() {
        let (_dir, sink) = temp_sink();
        let mut client = client(false, 20.0, vec![], sink);
        client.process_frame(&frame(), 1).unwrap();

        assert!(client.has_pending_update());
        let acc = client.local_accuracy();
        assert!((0.6..0.9).contains(&acc), "fallback accuracy was {acc}");
    }

    #[test]
    fn out_of_frame_detections_do_not_count() {
        let (_dir, sink) = temp_sink();
        // Box entirely outside the 64x64 frame: crop is empty, so the
        // frame counts as faceless and takes the fallback path
        let mut client = client(false, 20.0, vec![detection(200, 200, 260, 260)], sink);
        client.process_frame(&frame(), 1).unwrap();
        assert!((0.6..0.9).contains(&client.local_accuracy()));
    }

    #[test]
    fn accuracy_is_correct_over_total_detections() {
        let (_dir, sink) = temp_sink();
        let mut client = EdgeClient::new(
            1,
            false,
            0,
            Box::new(ScriptedDetector(vec![
                detection(0, 0, 16, 16),
                detection(20, 20, 40, 40),
                detection(5, 30, 25, 50),
            ])),
            Box::new(StubPredictor),
            Box::new(FixedLoad(20.0)),
            Box::new(Perfect),
            sink,
            42,
        );
        client.process_frame(&frame(), 1).unwrap();
        assert_eq!(client.local_accuracy(), 1.0);
    }

    #[test]
    fn pending_update_lives_until_consumed() {
        let (_dir, sink) = temp_sink();
        let mut client = client(false, 20.0, vec![], sink);

        assert!(!client.has_pending_update());
        client.process_frame(&frame(), 1).unwrap();
        assert!(client.has_pending_update());
        client.consume_update();
        assert!(!client.has_pending_update());

        client.process_frame(&frame(), 2).unwrap();
        assert!(client.has_pending_update());
    }

    #[test]
    fn processed_frame_emits_one_record() {
        let (dir, sink) = temp_sink();
        let mut client = client(false, 33.0, vec![detection(10, 10, 30, 30)], sink);
        client.process_frame(&frame(), 5).unwrap();
        client.process_frame(&frame(), 5).unwrap();

        let mut reader =
            csv::Reader::from_path(MetricsSink::client_log_path(dir.path(), 1)).unwrap();
        let records: Vec<ClientRecord> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].round, 5);
        assert_eq!(records[0].client_id, 1);
        assert_eq!(records[0].skipped, 0);
        assert_eq!(records[0].staleness, 0);
        assert_eq!(records[0].cpu_usage, 33.0);
        assert!(records[0].latency >= 0.0);
    }

    #[test]
    fn update_norms_track_the_capability_mean() {
        let (_dir, sink) = temp_sink();
        let mut full = client(false, 20.0, vec![], sink.clone());
        let mut partial = EdgeClient::new(
            2,
            true,
            4,
            Box::new(ScriptedDetector(vec![])),
            Box::new(StubPredictor),
            Box::new(FixedLoad(20.0)),
            Box::new(Bernoulli::reference()),
            sink,
            43,
        );

        let mut full_sum = 0.0;
        let mut partial_sum = 0.0;
        for round in 0..50 {
            full.process_frame(&frame(), round).unwrap();
            partial.process_frame(&frame(), round).unwrap();
            assert!(full.update_norm() >= 0.0);
            assert!(partial.update_norm() >= 0.0);
            full_sum += full.update_norm();
            partial_sum += partial.update_norm();
        }

        let full_mean = full_sum / 50.0;
        let partial_mean = partial_sum / 50.0;
        assert!((full_mean - 1.0).abs() < 0.1, "full mean {full_mean}");
        assert!((partial_mean - 0.5).abs() < 0.1, "partial mean {partial_mean}");
    }
}
