pub mod synthetic;

pub use synthetic::{SyntheticDetector, SyntheticFrameSource, SyntheticPredictor};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const AGE_BUCKETS: [&str; 8] = [
    "(0-2)", "(4-6)", "(8-12)", "(15-20)", "(25-32)", "(38-43)", "(48-53)", "(60+)",
];
pub const GENDER_LABELS: [&str; 2] = ["Male", "Female"];

/// A single-channel video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Cut out a detection box expanded by `pad` pixels on every side.
    ///
    /// Coordinates are clamped to the frame bounds; returns None when the
    /// clamped region is empty (detector boxes may sit partially or fully
    /// outside the frame).
    pub fn crop_padded(&self, bbox: &BoundingBox, pad: u32) -> Option<Frame> {
        let pad = pad as i64;
        let x1 = (bbox.x1 as i64 - pad).clamp(0, self.width as i64) as u32;
        let y1 = (bbox.y1 as i64 - pad).clamp(0, self.height as i64) as u32;
        let x2 = (bbox.x2 as i64 + pad).clamp(0, self.width as i64) as u32;
        let y2 = (bbox.y2 as i64 + pad).clamp(0, self.height as i64) as u32;

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let width = x2 - x1;
        let height = y2 - y1;
        let mut data = Vec::with_capacity((width * height) as usize);
        for row in y1..y2 {
            let start = (row * self.width + x1) as usize;
            data.extend_from_slice(&self.data[start..start + width as usize]);
        }

        Some(Frame::new(width, height, data))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// One detected face region with its confidence in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Predictor output. The scheduling core never interprets the labels,
/// it only counts simulated correctness per detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub gender: &'static str,
    pub age_bucket: &'static str,
}

/// Face detection capability. Confidence thresholding happens inside the
/// detector; callers receive only detections the detector stands behind.
pub trait FaceDetector: Send + fmt::Debug {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
    fn name(&self) -> &str;
}

/// Age/gender prediction capability over a cropped face region.
pub trait AgePredictor: Send + fmt::Debug {
    fn predict(&mut self, region: &Frame) -> Result<Prediction>;
    fn name(&self) -> &str;
}

/// Supplies the frames the loop runs on.
pub trait FrameSource: Send + fmt::Debug {
    fn next_frame(&mut self) -> Result<Frame>;
}
