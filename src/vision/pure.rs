//! `imageproc` provider, used when OpenCV is not compiled in.
//!
//! Only Canny with the 3x3 Sobel aperture and FAST-9 are available. Note that
//! `imageproc`'s Canny smooths with a Gaussian before differentiating.

use image::GrayImage;
use imageproc::corners::corners_fast9;
use imageproc::suppress::local_maxima;
use ndarray::Array3;

use super::{unsupported, BackgroundModel, Capability, Keypoint};
use crate::error::Result;
use crate::primitives::{BackgroundMethod, CannyParams, FarnebackParams, HarrisParams, OrbParams};

pub const PROVIDER: &str = "imageproc";

pub fn supports(capability: Capability) -> bool {
    matches!(
        capability,
        Capability::Canny { aperture: 3 } | Capability::Fast
    )
}

pub fn canny(gray: &GrayImage, p: &CannyParams) -> Result<GrayImage> {
    if p.aperture_size != 3 {
        return Err(unsupported(Capability::Canny {
            aperture: p.aperture_size,
        }));
    }
    let low = p.threshold1.min(p.threshold2) as f32;
    let high = p.threshold1.max(p.threshold2) as f32;
    Ok(imageproc::edges::canny(gray, low, high))
}

pub fn fast(gray: &GrayImage, threshold: u8, non_max_suppression: bool) -> Result<Vec<Keypoint>> {
    let mut corners = corners_fast9(gray, threshold);
    if non_max_suppression {
        corners = local_maxima(&corners, 1);
    }
    Ok(corners
        .iter()
        .map(|c| Keypoint::new(c.y as f32, c.x as f32, c.score))
        .collect())
}

pub fn farneback(_prev: &GrayImage, _next: &GrayImage, _p: &FarnebackParams) -> Result<Array3<f32>> {
    Err(unsupported(Capability::DenseFlow))
}

pub fn harris(_gray: &GrayImage, _p: &HarrisParams) -> Result<Vec<Keypoint>> {
    Err(unsupported(Capability::Harris))
}

pub fn orb(_gray: &GrayImage, _p: &OrbParams) -> Result<Vec<Keypoint>> {
    Err(unsupported(Capability::Orb))
}

pub fn background_model(_method: &BackgroundMethod) -> Result<Box<dyn BackgroundModel>> {
    Err(unsupported(Capability::BackgroundModel))
}
