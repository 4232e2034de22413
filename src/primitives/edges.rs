//! Canny edge extraction.

use std::path::PathBuf;

use image::{GrayImage, Rgb};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::FrameAlgorithm;
use crate::error::{Error, Result};
use crate::pipeline::{Frame, NpyArray, Outputs, PathTemplate, Sink};
use crate::vision::{self, Capability};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CannyParams {
    pub threshold1: f64,
    pub threshold2: f64,
    /// Sobel aperture: 3, 5 or 7.
    pub aperture_size: u32,
    /// L2 instead of L1 gradient magnitude.
    pub l2_gradient: bool,
}

impl Default for CannyParams {
    fn default() -> Self {
        Self {
            threshold1: 200.0,
            threshold2: 50.0,
            aperture_size: 3,
            l2_gradient: false,
        }
    }
}

pub struct CannyEdgeDetector {
    params: CannyParams,
}

impl CannyEdgeDetector {
    pub fn new(params: CannyParams) -> Result<Self> {
        if !matches!(params.aperture_size, 3 | 5 | 7) {
            return Err(Error::config(format!(
                "canny aperture_size must be 3, 5 or 7, got {}",
                params.aperture_size
            )));
        }
        if params.threshold1.is_nan() || params.threshold2.is_nan() {
            return Err(Error::config("canny thresholds must be numbers"));
        }
        vision::require(Capability::Canny {
            aperture: params.aperture_size,
        })?;
        Ok(Self { params })
    }
}

impl FrameAlgorithm for CannyEdgeDetector {
    type Output = EdgeMask;

    fn process_frame(&mut self, frame: &Frame) -> Result<EdgeMask> {
        vision::canny(&vision::gray(frame), &self.params).map(EdgeMask)
    }
}

/// Edge pixels are 255, everything else 0.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMask(pub GrayImage);

impl EdgeMask {
    pub fn to_bool_array(&self) -> Array2<bool> {
        let (w, h) = self.0.dimensions();
        Array2::from_shape_fn((h as usize, w as usize), |(r, c)| {
            self.0.get_pixel(c as u32, r as u32)[0] != 0
        })
    }

    /// The mask repeated over three channels.
    pub fn to_frame(&self) -> Frame {
        let (w, h) = self.0.dimensions();
        Frame::from_fn(w, h, |x, y| {
            let v = self.0.get_pixel(x, y)[0];
            Rgb([v, v, v])
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EdgeOutputs {
    pub mask: Option<PathTemplate>,
    pub video: Option<PathBuf>,
}

fn encode_mask(edges: &EdgeMask) -> NpyArray {
    edges.to_bool_array().into()
}

fn encode_video(edges: &EdgeMask, _frame: &Frame) -> Frame {
    edges.to_frame()
}

impl Outputs<EdgeMask> for EdgeOutputs {
    fn sinks(&self) -> Vec<Sink<EdgeMask>> {
        let mut sinks = Vec::new();
        if let Some(t) = &self.mask {
            sinks.push(Sink::array("edges", t, encode_mask));
        }
        if let Some(p) = &self.video {
            sinks.push(Sink::video("edge video", p, encode_video));
        }
        sinks
    }
}
