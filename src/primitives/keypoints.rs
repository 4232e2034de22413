//! Keypoint detection: Harris, FAST and ORB.
//!
//! All three produce an unordered set of `(row, col)` locations. Descriptors
//! are not computed.

use std::path::PathBuf;

use image::Rgb;
use imageproc::drawing::draw_hollow_circle_mut;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::FrameAlgorithm;
use crate::error::{Error, Result};
use crate::pipeline::{Frame, NpyArray, Outputs, PathTemplate, Sink};
use crate::vision::{self, Capability, Keypoint};

const MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const MARKER_RADIUS: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarrisParams {
    /// Fraction of the strongest response a corner must exceed.
    pub threshold: f64,
    pub block_size: usize,
    pub aperture_size: u32,
    pub k: f64,
}

impl Default for HarrisParams {
    fn default() -> Self {
        Self {
            threshold: 0.01,
            block_size: 3,
            aperture_size: 3,
            k: 0.04,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastParams {
    /// Intensity difference, 0..=255.
    pub threshold: u32,
    pub non_max_suppression: bool,
}

impl Default for FastParams {
    fn default() -> Self {
        Self {
            threshold: 1,
            non_max_suppression: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrbScore {
    #[default]
    Harris,
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbParams {
    pub max_features: usize,
    pub score_type: OrbScore,
}

impl Default for OrbParams {
    fn default() -> Self {
        Self {
            max_features: 500,
            score_type: OrbScore::Harris,
        }
    }
}

pub struct HarrisKeypointDetector {
    params: HarrisParams,
}

impl HarrisKeypointDetector {
    pub fn new(params: HarrisParams) -> Result<Self> {
        if !(params.threshold >= 0.0 && params.threshold.is_finite()) {
            return Err(Error::config(format!(
                "harris threshold must be a non-negative fraction, got {}",
                params.threshold
            )));
        }
        if params.block_size == 0 {
            return Err(Error::config("harris block_size must be positive"));
        }
        if !matches!(params.aperture_size, 1 | 3 | 5 | 7) {
            return Err(Error::config(format!(
                "harris aperture_size must be 1, 3, 5 or 7, got {}",
                params.aperture_size
            )));
        }
        vision::require(Capability::Harris)?;
        Ok(Self { params })
    }
}

impl FrameAlgorithm for HarrisKeypointDetector {
    type Output = Keypoints;

    fn process_frame(&mut self, frame: &Frame) -> Result<Keypoints> {
        vision::harris(&vision::gray(frame), &self.params).map(Keypoints)
    }
}

pub struct FastKeypointDetector {
    threshold: u8,
    non_max_suppression: bool,
}

impl FastKeypointDetector {
    pub fn new(params: FastParams) -> Result<Self> {
        let threshold = u8::try_from(params.threshold).map_err(|_| {
            Error::config(format!(
                "fast threshold must be at most 255, got {}",
                params.threshold
            ))
        })?;
        vision::require(Capability::Fast)?;
        Ok(Self {
            threshold,
            non_max_suppression: params.non_max_suppression,
        })
    }
}

impl FrameAlgorithm for FastKeypointDetector {
    type Output = Keypoints;

    fn process_frame(&mut self, frame: &Frame) -> Result<Keypoints> {
        vision::fast(&vision::gray(frame), self.threshold, self.non_max_suppression)
            .map(Keypoints)
    }
}

pub struct OrbKeypointDetector {
    params: OrbParams,
}

impl OrbKeypointDetector {
    pub fn new(params: OrbParams) -> Result<Self> {
        if params.max_features == 0 {
            return Err(Error::config("orb max_features must be positive"));
        }
        vision::require(Capability::Orb)?;
        Ok(Self { params })
    }
}

impl FrameAlgorithm for OrbKeypointDetector {
    type Output = Keypoints;

    fn process_frame(&mut self, frame: &Frame) -> Result<Keypoints> {
        vision::orb(&vision::gray(frame), &self.params).map(Keypoints)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keypoints(pub Vec<Keypoint>);

impl Keypoints {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `N x 2` matrix of `[row, col]`; `0 x 2` when nothing was found.
    pub fn to_array(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.0.len(), 2), |(i, j)| {
            let k = &self.0[i];
            if j == 0 {
                k.row
            } else {
                k.col
            }
        })
    }

    /// `frame` with a circle drawn around every keypoint.
    pub fn draw(&self, frame: &Frame) -> Frame {
        let mut out = frame.clone();
        for k in &self.0 {
            let center = (k.col.round() as i32, k.row.round() as i32);
            draw_hollow_circle_mut(&mut out, center, MARKER_RADIUS, MARKER_COLOR);
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeypointOutputs {
    pub coords: Option<PathTemplate>,
    pub video: Option<PathBuf>,
}

fn encode_coords(keypoints: &Keypoints) -> NpyArray {
    keypoints.to_array().into()
}

fn encode_video(keypoints: &Keypoints, frame: &Frame) -> Frame {
    keypoints.draw(frame)
}

impl Outputs<Keypoints> for KeypointOutputs {
    fn sinks(&self) -> Vec<Sink<Keypoints>> {
        let mut sinks = Vec::new();
        if let Some(t) = &self.coords {
            sinks.push(Sink::array("keypoints", t, encode_coords));
        }
        if let Some(p) = &self.video {
            sinks.push(Sink::video("keypoint video", p, encode_video));
        }
        sinks
    }
}
