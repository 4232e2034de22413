//! Foreground / background separation with a learned background model.

use std::path::PathBuf;

use image::GrayImage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::FrameAlgorithm;
use crate::error::{Error, Result};
use crate::pipeline::{Frame, NpyArray, Outputs, PathTemplate, Sink};
use crate::vision::{self, BackgroundModel, Capability, MASK_BACKGROUND};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mog2Params {
    pub history: u32,
    /// Squared Mahalanobis distance under which a pixel matches a mode.
    pub threshold: f64,
    /// Negative selects the model's automatic rate.
    pub learning_rate: f64,
    pub detect_shadows: bool,
}

impl Default for Mog2Params {
    fn default() -> Self {
        Self {
            history: 500,
            threshold: 16.0,
            learning_rate: -1.0,
            detect_shadows: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnParams {
    pub history: u32,
    /// Squared colour distance under which a sample counts as a neighbour.
    pub threshold: f64,
    pub learning_rate: f64,
    pub detect_shadows: bool,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            history: 500,
            threshold: 400.0,
            learning_rate: -1.0,
            detect_shadows: false,
        }
    }
}

/// Which statistical model backs a separator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum BackgroundMethod {
    Mog2(Mog2Params),
    Knn(KnnParams),
}

impl BackgroundMethod {
    pub fn name(&self) -> &'static str {
        match self {
            BackgroundMethod::Mog2(_) => "mog2",
            BackgroundMethod::Knn(_) => "knn",
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            BackgroundMethod::Mog2(p) => p.learning_rate,
            BackgroundMethod::Knn(p) => p.learning_rate,
        }
    }

    fn validate(&self) -> Result<()> {
        let (history, threshold) = match self {
            BackgroundMethod::Mog2(p) => (p.history, p.threshold),
            BackgroundMethod::Knn(p) => (p.history, p.threshold),
        };
        if history == 0 {
            return Err(Error::config(format!("{} history must be positive", self.name())));
        }
        if !(threshold > 0.0) {
            return Err(Error::config(format!(
                "{} threshold must be positive, got {}",
                self.name(),
                threshold
            )));
        }
        Ok(())
    }
}

impl From<Mog2Params> for BackgroundMethod {
    fn from(p: Mog2Params) -> Self {
        BackgroundMethod::Mog2(p)
    }
}

impl From<KnnParams> for BackgroundMethod {
    fn from(p: KnnParams) -> Self {
        BackgroundMethod::Knn(p)
    }
}

/// Source of background models, declaring what its models can do.
pub trait BackgroundModelFactory {
    fn name(&self) -> &str;

    /// Whether models for `method` can reconstruct a background image.
    fn supports_background_image(&self, method: &BackgroundMethod) -> bool;

    fn create(&self, method: &BackgroundMethod) -> Result<Box<dyn BackgroundModel>>;
}

/// The models of the compiled vision provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeModels;

impl BackgroundModelFactory for NativeModels {
    fn name(&self) -> &str {
        vision::PROVIDER
    }

    fn supports_background_image(&self, _method: &BackgroundMethod) -> bool {
        vision::supports(Capability::BackgroundModel)
    }

    fn create(&self, method: &BackgroundMethod) -> Result<Box<dyn BackgroundModel>> {
        vision::background_model(method)
    }
}

/// Splits every frame into a foreground mask and the current background.
pub struct BackgroundSeparator {
    method: BackgroundMethod,
    backend: String,
    model: Box<dyn BackgroundModel>,
}

impl BackgroundSeparator {
    pub fn new(method: impl Into<BackgroundMethod>) -> Result<Self> {
        Self::with_factory(method, &NativeModels)
    }

    /// Fails with `UnsupportedBackend` when `factory` cannot provide a
    /// background image for `method`.
    pub fn with_factory(
        method: impl Into<BackgroundMethod>,
        factory: &dyn BackgroundModelFactory,
    ) -> Result<Self> {
        let method = method.into();
        method.validate()?;
        if !factory.supports_background_image(&method) {
            return Err(Error::UnsupportedBackend {
                backend: factory.name().to_string(),
                capability: format!("background image retrieval for {}", method.name()),
            });
        }
        let model = factory.create(&method)?;
        Ok(Self {
            method,
            backend: factory.name().to_string(),
            model,
        })
    }
}

impl FrameAlgorithm for BackgroundSeparator {
    type Output = BackgroundSeparation;

    fn reset(&mut self) {
        self.model.clear();
    }

    fn process_frame(&mut self, frame: &Frame) -> Result<BackgroundSeparation> {
        let mask = self.model.apply(frame, self.method.learning_rate())?;
        let background = self
            .model
            .background_image()?
            .ok_or_else(|| Error::UnsupportedBackend {
                backend: self.backend.clone(),
                capability: format!("background image retrieval for {}", self.method.name()),
            })?;
        Ok(BackgroundSeparation { mask, background })
    }
}

#[derive(Debug, Clone)]
pub struct BackgroundSeparation {
    /// 0 background, 127 shadow, 255 foreground.
    pub mask: GrayImage,
    pub background: Frame,
}

impl BackgroundSeparation {
    /// `frame` with every background pixel set to black.
    pub fn foreground(&self, frame: &Frame) -> Frame {
        let mut out = frame.clone();
        for (px, m) in out.pixels_mut().zip(self.mask.pixels()) {
            if m[0] == MASK_BACKGROUND {
                px.0 = [0, 0, 0];
            }
        }
        out
    }

    pub fn mask_array(&self) -> Array2<u8> {
        let (w, h) = self.mask.dimensions();
        Array2::from_shape_fn((h as usize, w as usize), |(r, c)| {
            self.mask.get_pixel(c as u32, r as u32)[0]
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundOutputs {
    pub mask: Option<PathTemplate>,
    pub foreground_video: Option<PathBuf>,
    pub background_video: Option<PathBuf>,
}

fn encode_mask(result: &BackgroundSeparation) -> NpyArray {
    result.mask_array().into()
}

fn encode_foreground(result: &BackgroundSeparation, frame: &Frame) -> Frame {
    result.foreground(frame)
}

fn encode_background(result: &BackgroundSeparation, _frame: &Frame) -> Frame {
    result.background.clone()
}

impl Outputs<BackgroundSeparation> for BackgroundOutputs {
    fn sinks(&self) -> Vec<Sink<BackgroundSeparation>> {
        let mut sinks = Vec::new();
        if let Some(t) = &self.mask {
            sinks.push(Sink::array("mask", t, encode_mask));
        }
        if let Some(p) = &self.foreground_video {
            sinks.push(Sink::video("foreground video", p, encode_foreground));
        }
        if let Some(p) = &self.background_video {
            sinks.push(Sink::video("background video", p, encode_background));
        }
        sinks
    }
}
