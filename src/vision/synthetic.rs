// Simulation stand-ins for the DNN-backed capabilities. They produce
// plausible detections and labels from seeded randomness so runs are
// reproducible end to end.

use super::{AGE_BUCKETS, BoundingBox, Detection, FaceDetector, Frame, FrameSource, GENDER_LABELS};
use super::{AgePredictor, Prediction};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug)]
pub struct SyntheticDetector {
    conf_threshold: f32,
    max_faces: u32,
    rng: StdRng,
}

impl SyntheticDetector {
    pub fn new(conf_threshold: f32, max_faces: u32, seed: u64) -> Result<Self> {
        if !(0.0..=1.0).contains(&conf_threshold) {
            anyhow::bail!("confidence threshold must be in [0, 1], got {conf_threshold}");
        }
        Ok(Self {
            conf_threshold,
            max_faces,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl FaceDetector for SyntheticDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let w = frame.width() as i32;
        let h = frame.height() as i32;
        if w < 2 || h < 2 {
            return Ok(Vec::new());
        }

        let count = self.rng.gen_range(0..=self.max_faces);
        let mut detections = Vec::new();

        for _ in 0..count {
            let size = self.rng.gen_range(1..=w.min(h).min(96));
            let x1 = self.rng.gen_range(0..=w - size);
            let y1 = self.rng.gen_range(0..=h - size);
            let confidence: f32 = self.rng.gen_range(0.0..1.0);

            // Thresholding is the detector's job, not the caller's
            if confidence > self.conf_threshold {
                detections.push(Detection {
                    bbox: BoundingBox::new(x1, y1, x1 + size, y1 + size),
                    confidence,
                });
            }
        }

        Ok(detections)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Draws random labels and smooths them over a bounded history window,
/// reporting the majority label seen recently.
#[derive(Debug)]
pub struct SyntheticPredictor {
    partial: bool,
    window: usize,
    age_history: VecDeque<&'static str>,
    gender_history: VecDeque<&'static str>,
    rng: StdRng,
}

impl SyntheticPredictor {
    pub fn new(window: usize, partial: bool, seed: u64) -> Result<Self> {
        if window == 0 {
            anyhow::bail!("smoothing window must be at least 1");
        }
        if partial {
            debug!("partial update mode: base layers frozen, classifier layers only");
        }
        Ok(Self {
            partial,
            window,
            age_history: VecDeque::with_capacity(window),
            gender_history: VecDeque::with_capacity(window),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    fn remember(history: &mut VecDeque<&'static str>, window: usize, label: &'static str) {
        if history.len() == window {
            history.pop_front();
        }
        history.push_back(label);
    }

    fn majority(history: &VecDeque<&'static str>) -> &'static str {
        let mut best = history[0];
        let mut best_count = 0;
        for &candidate in history {
            let count = history.iter().filter(|&&l| l == candidate).count();
            if count > best_count {
                best = candidate;
                best_count = count;
            }
        }
        best
    }
}

impl AgePredictor for SyntheticPredictor {
    fn predict(&mut self, _region: &Frame) -> Result<Prediction> {
        let gender = GENDER_LABELS[self.rng.gen_range(0..GENDER_LABELS.len())];
        let age = AGE_BUCKETS[self.rng.gen_range(0..AGE_BUCKETS.len())];

        Self::remember(&mut self.gender_history, self.window, gender);
        Self::remember(&mut self.age_history, self.window, age);

        Ok(Prediction {
            gender: Self::majority(&self.gender_history),
            age_bucket: Self::majority(&self.age_history),
        })
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Noise frames standing in for a camera.
#[derive(Debug)]
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    rng: StdRng,
}

impl SyntheticFrameSource {
    pub fn new(width: u32, height: u32, seed: u64) -> Self {
        Self {
            width,
            height,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl FrameSource for SyntheticFrameSource {
    fn next_frame(&mut self) -> Result<Frame> {
        let mut data = vec![0u8; (self.width * self.height) as usize];
        self.rng.fill(&mut data[..]);
        Ok(Frame::new(self.width, self.height, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise_frame() -> Frame {
        SyntheticFrameSource::new(320, 240, 7).next_frame().unwrap()
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        assert!(SyntheticDetector::new(1.5, 3, 0).is_err());
        assert!(SyntheticDetector::new(-0.1, 3, 0).is_err());
    }

    #[test]
    fn rejects_zero_smoothing_window() {
        assert!(SyntheticPredictor::new(0, false, 0).is_err());
    }

    #[test]
    fn impossible_threshold_filters_everything() {
        let mut detector = SyntheticDetector::new(1.0, 5, 42).unwrap();
        let frame = noise_frame();
        for _ in 0..20 {
            assert!(detector.detect(&frame).unwrap().is_empty());
        }
    }

    #[test]
    fn detections_stay_inside_the_frame() {
        let mut detector = SyntheticDetector::new(0.0, 5, 42).unwrap();
        let frame = noise_frame();
        for _ in 0..50 {
            for det in detector.detect(&frame).unwrap() {
                assert!(det.bbox.x1 >= 0 && det.bbox.y1 >= 0);
                assert!(det.bbox.x2 <= frame.width() as i32);
                assert!(det.bbox.y2 <= frame.height() as i32);
                assert!((0.0..=1.0).contains(&det.confidence));
            }
        }
    }

    #[test]
    fn predictions_use_known_labels() {
        let mut predictor = SyntheticPredictor::new(7, false, 3).unwrap();
        let frame = noise_frame();
        for _ in 0..20 {
            let p = predictor.predict(&frame).unwrap();
            assert!(GENDER_LABELS.contains(&p.gender));
            assert!(AGE_BUCKETS.contains(&p.age_bucket));
        }
    }

    #[test]
    fn smoothing_reports_the_majority_label() {
        let mut history = VecDeque::new();
        for label in ["Male", "Female", "Male", "Male", "Female"] {
            SyntheticPredictor::remember(&mut history, 7, label);
        }
        assert_eq!(SyntheticPredictor::majority(&history), "Male");
    }

    #[test]
    fn smoothing_window_is_bounded() {
        let mut history = VecDeque::new();
        for _ in 0..20 {
            SyntheticPredictor::remember(&mut history, 7, "Male");
        }
        assert_eq!(history.len(), 7);
    }
}
