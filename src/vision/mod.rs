//! Vision providers behind the per-frame primitives.
//!
//! The numerics come from an external library chosen at build time. With
//! the `opencv` feature every primitive runs on OpenCV; without it a thin
//! `imageproc` provider covers Canny and FAST, and primitives it cannot
//! serve are refused when they are constructed (see [`require`]).

pub mod color;
#[cfg(feature = "opencv")]
mod cv;
#[cfg(not(feature = "opencv"))]
mod pure;

#[cfg(feature = "opencv")]
use cv as provider;
#[cfg(not(feature = "opencv"))]
use pure as provider;

pub use provider::{background_model, canny, farneback, fast, harris, orb, PROVIDER};

use std::fmt::{Display, Formatter};

use image::GrayImage;

use crate::error::{Error, Result};
use crate::pipeline::Frame;

pub const MASK_BACKGROUND: u8 = 0;
pub const MASK_SHADOW: u8 = 127;
pub const MASK_FOREGROUND: u8 = 255;

/// Something a provider may or may not be able to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    DenseFlow,
    BackgroundModel,
    Canny { aperture: u32 },
    Harris,
    Fast,
    Orb,
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::DenseFlow => f.write_str("farneback optical flow"),
            Capability::BackgroundModel => f.write_str("background models"),
            Capability::Canny { aperture } => write!(f, "canny with aperture {}", aperture),
            Capability::Harris => f.write_str("harris corners"),
            Capability::Fast => f.write_str("fast corners"),
            Capability::Orb => f.write_str("orb keypoints"),
        }
    }
}

pub fn supports(capability: Capability) -> bool {
    provider::supports(capability)
}

/// Fails with `UnsupportedBackend` unless the compiled provider offers
/// `capability`.
pub fn require(capability: Capability) -> Result<()> {
    if supports(capability) {
        Ok(())
    } else {
        Err(unsupported(capability))
    }
}

pub(crate) fn unsupported(capability: Capability) -> Error {
    Error::UnsupportedBackend {
        backend: PROVIDER.to_string(),
        capability: capability.to_string(),
    }
}

pub fn gray(frame: &Frame) -> GrayImage {
    image::imageops::grayscale(frame)
}

/// A detected point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub row: f32,
    pub col: f32,
    /// Detector response; larger is stronger.
    pub score: f32,
}

impl Keypoint {
    pub fn new(row: f32, col: f32, score: f32) -> Self {
        Self { row, col, score }
    }
}

/// A learned statistical model of a scene's static content.
pub trait BackgroundModel {
    /// Classifies every pixel of `frame` and folds the frame into the model.
    ///
    /// Returns a mask of `MASK_BACKGROUND`, `MASK_SHADOW` or `MASK_FOREGROUND`.
    /// `learning_rate` is forwarded untouched; negative values select the
    /// model's automatic rate.
    fn apply(&mut self, frame: &Frame, learning_rate: f64) -> Result<GrayImage>;

    /// Current estimate of the background, or `None` if the model cannot
    /// produce one.
    fn background_image(&self) -> Result<Option<Frame>>;

    /// Forgets everything learned; the next frame starts a fresh model.
    fn clear(&mut self);
}
