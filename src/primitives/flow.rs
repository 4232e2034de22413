//! Dense optical flow between consecutive frames.

use std::cell::OnceCell;
use std::f32::consts::TAU;
use std::path::PathBuf;

use image::GrayImage;
use ndarray::{s, Array2, Array3, Zip};
use serde::{Deserialize, Serialize};

use super::FrameAlgorithm;
use crate::error::{Error, Result};
use crate::pipeline::{Frame, NpyArray, Outputs, PathTemplate, Sink};
use crate::vision::color::polar_to_rgb;
use crate::vision::{self, Capability};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarnebackParams {
    /// Image scale between pyramid levels, in `(0, 1)`.
    pub pyramid_scale: f64,
    pub pyramid_levels: usize,
    /// Averaging window; larger values are more robust but blur motion edges.
    pub window_size: usize,
    pub iterations: usize,
    /// Neighbourhood used for the polynomial expansion.
    pub poly_n: usize,
    pub poly_sigma: f64,
    /// Gaussian instead of box averaging window.
    pub use_gaussian_filter: bool,
}

impl Default for FarnebackParams {
    fn default() -> Self {
        Self {
            pyramid_scale: 0.5,
            pyramid_levels: 3,
            window_size: 15,
            iterations: 3,
            poly_n: 7,
            poly_sigma: 1.5,
            use_gaussian_filter: false,
        }
    }
}

impl FarnebackParams {
    fn validate(&self) -> Result<()> {
        if !(self.pyramid_scale > 0.0 && self.pyramid_scale < 1.0) {
            return Err(Error::config(format!(
                "farneback pyramid_scale must be in (0, 1), got {}",
                self.pyramid_scale
            )));
        }
        if self.window_size == 0 || self.poly_n == 0 || self.iterations == 0 {
            return Err(Error::config(
                "farneback window_size, poly_n and iterations must be positive",
            ));
        }
        if self.poly_sigma <= 0.0 {
            return Err(Error::config(format!(
                "farneback poly_sigma must be positive, got {}",
                self.poly_sigma
            )));
        }
        Ok(())
    }
}

/// Farneback flow from the previous frame to the current one.
///
/// The first frame of a run is compared with itself.
pub struct OpticalFlowFarneback {
    params: FarnebackParams,
    prev: Option<GrayImage>,
}

impl OpticalFlowFarneback {
    pub fn new(params: FarnebackParams) -> Result<Self> {
        params.validate()?;
        vision::require(Capability::DenseFlow)?;
        Ok(Self { params, prev: None })
    }
}

impl FrameAlgorithm for OpticalFlowFarneback {
    type Output = FlowField;

    fn reset(&mut self) {
        self.prev = None;
    }

    fn process_frame(&mut self, frame: &Frame) -> Result<FlowField> {
        let gray = vision::gray(frame);
        let prev = self.prev.take().unwrap_or_else(|| gray.clone());
        let flow = vision::farneback(&prev, &gray, &self.params);
        self.prev = Some(gray);
        Ok(FlowField::new(flow?))
    }
}

/// Per-pixel displacement `[row, col, (dx, dy)]`.
#[derive(Debug, Clone)]
pub struct FlowField {
    cartesian: Array3<f32>,
    polar: OnceCell<Array3<f32>>,
}

impl FlowField {
    pub fn new(cartesian: Array3<f32>) -> Self {
        Self {
            cartesian,
            polar: OnceCell::new(),
        }
    }

    pub fn cartesian(&self) -> &Array3<f32> {
        &self.cartesian
    }

    /// `[row, col, (magnitude, angle)]`, angle in radians within `[0, 2π)`.
    pub fn polar(&self) -> &Array3<f32> {
        self.polar.get_or_init(|| {
            let (rows, cols, _) = self.cartesian.dim();
            let mut polar = Array3::<f32>::zeros((rows, cols, 2));
            Zip::from(polar.lanes_mut(ndarray::Axis(2)))
                .and(self.cartesian.lanes(ndarray::Axis(2)))
                .for_each(|mut out, v| {
                    let (dx, dy) = (v[0], v[1]);
                    out[0] = dx.hypot(dy);
                    out[1] = angle_of(dx, dy);
                });
            polar
        })
    }

    pub fn magnitude(&self) -> Array2<f32> {
        self.polar().slice(s![.., .., 0]).to_owned()
    }

    pub fn angle(&self) -> Array2<f32> {
        self.polar().slice(s![.., .., 1]).to_owned()
    }

    /// Direction as hue, speed as brightness.
    pub fn visualize(&self) -> Frame {
        polar_to_rgb(&self.magnitude(), &self.angle())
    }
}

fn angle_of(dx: f32, dy: f32) -> f32 {
    let a = dy.atan2(dx);
    let a = if a < 0.0 { a + TAU } else { a };
    if a >= TAU {
        0.0
    } else {
        a
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowOutputs {
    pub cartesian: Option<PathTemplate>,
    pub polar: Option<PathTemplate>,
    pub video: Option<PathBuf>,
}

fn encode_cartesian(flow: &FlowField) -> NpyArray {
    flow.cartesian().clone().into()
}

fn encode_polar(flow: &FlowField) -> NpyArray {
    flow.polar().clone().into()
}

fn encode_video(flow: &FlowField, _frame: &Frame) -> Frame {
    flow.visualize()
}

impl Outputs<FlowField> for FlowOutputs {
    fn sinks(&self) -> Vec<Sink<FlowField>> {
        let mut sinks = Vec::new();
        if let Some(t) = &self.cartesian {
            sinks.push(Sink::array("cartesian", t, encode_cartesian));
        }
        if let Some(t) = &self.polar {
            sinks.push(Sink::array("polar", t, encode_polar));
        }
        if let Some(p) = &self.video {
            sinks.push(Sink::video("flow video", p, encode_video));
        }
        sinks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "opencv")]
    fn blob(offset: u32) -> Frame {
        Frame::from_fn(64, 64, |x, y| {
            let (cx, cy) = (30.0 + offset as f32, 32.0);
            let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
            let v = (255.0 * (-d2 / 60.0).exp()).round() as u8;
            image::Rgb([v, v, v])
        })
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_needs_a_flow_provider() {
        assert!(matches!(
            OpticalFlowFarneback::new(FarnebackParams::default()),
            Err(Error::UnsupportedBackend { .. })
        ));
    }

    #[cfg(feature = "opencv")]
    #[test]
    fn test_black_frame_has_zero_flow() {
        let mut flow = OpticalFlowFarneback::new(FarnebackParams::default()).unwrap();
        let black = Frame::new(40, 32);
        for _ in 0..2 {
            let field = flow.process_frame(&black).unwrap();
            assert_eq!(field.cartesian().dim(), (32, 40, 2));
            assert!(field.cartesian().iter().all(|v| *v == 0.0));
        }
    }

    #[cfg(feature = "opencv")]
    #[test]
    fn test_first_frame_is_compared_with_itself() {
        let params = FarnebackParams::default();
        let frame = blob(0);
        let gray = vision::gray(&frame);
        let expected = vision::farneback(&gray, &gray, &params).unwrap();

        let mut flow = OpticalFlowFarneback::new(params).unwrap();
        assert_eq!(flow.process_frame(&frame).unwrap().cartesian(), &expected);

        // after a reset the next frame has no predecessor again
        flow.process_frame(&blob(2)).unwrap();
        flow.reset();
        assert_eq!(flow.process_frame(&frame).unwrap().cartesian(), &expected);
    }

    #[cfg(feature = "opencv")]
    #[test]
    fn test_motion_points_right() {
        let mut flow = OpticalFlowFarneback::new(FarnebackParams::default()).unwrap();
        flow.process_frame(&blob(0)).unwrap();
        let field = flow.process_frame(&blob(2)).unwrap();
        let dx = field.cartesian()[[32, 31, 0]];
        assert!(dx > 0.5, "dx = {}", dx);
    }

    #[test]
    fn test_polar_of_known_vectors() {
        let mut cartesian = Array3::<f32>::zeros((1, 3, 2));
        cartesian[[0, 0, 0]] = 3.0;
        cartesian[[0, 0, 1]] = 4.0;
        cartesian[[0, 1, 0]] = 0.0;
        cartesian[[0, 1, 1]] = -2.0;
        let field = FlowField::new(cartesian);

        let magnitude = field.magnitude();
        let angle = field.angle();
        assert!((magnitude[[0, 0]] - 5.0).abs() < 1e-6);
        assert!((angle[[0, 0]] - 4.0f32.atan2(3.0)).abs() < 1e-6);
        assert!((magnitude[[0, 1]] - 2.0).abs() < 1e-6);
        assert!((angle[[0, 1]] - 1.5 * std::f32::consts::PI).abs() < 1e-5);
        assert_eq!(magnitude[[0, 2]], 0.0);
        assert!(angle.iter().all(|a| (0.0..TAU).contains(a)));
    }

    #[test]
    fn test_invalid_params() {
        for params in [
            FarnebackParams {
                pyramid_scale: 1.0,
                ..Default::default()
            },
            FarnebackParams {
                window_size: 0,
                ..Default::default()
            },
            FarnebackParams {
                poly_sigma: 0.0,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                OpticalFlowFarneback::new(params),
                Err(Error::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_outputs_request_only_configured_sinks() {
        let outputs = FlowOutputs {
            polar: Some(PathTemplate::parse("out/polar/%05d.npy").unwrap()),
            video: Some(PathBuf::from("out/flow.mp4")),
            ..Default::default()
        };
        let names: Vec<_> = outputs.sinks().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["polar", "flow video"]);

        let field = FlowField::new(Array3::zeros((4, 6, 2)));
        assert_eq!(encode_polar(&field).shape(), &[4, 6, 2]);
        assert_eq!(encode_video(&field, &Frame::new(6, 4)).dimensions(), (6, 4));
    }
}
