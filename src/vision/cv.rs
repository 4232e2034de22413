//! OpenCV provider.
//!
//! Frames cross into OpenCV as continuous `Mat`s in their own channel order;
//! nothing here depends on BGR.

use image::GrayImage;
use ndarray::Array3;
use opencv::core::{self, KeyPoint, Mat, Point, Ptr, Vec3b, Vector};
use opencv::features2d::{FastFeatureDetector, FastFeatureDetector_DetectorType, ORB_ScoreType, ORB};
use opencv::prelude::*;
use opencv::{imgproc, video};

use super::{BackgroundModel, Capability, Keypoint};
use crate::error::{Error, Result};
use crate::pipeline::Frame;
use crate::primitives::{
    BackgroundMethod, CannyParams, FarnebackParams, HarrisParams, OrbParams, OrbScore,
};

pub const PROVIDER: &str = "opencv";

pub fn supports(_capability: Capability) -> bool {
    true
}

fn gray_mat(gray: &GrayImage) -> Result<Mat> {
    let mat = Mat::new_rows_cols_with_data(
        gray.height() as i32,
        gray.width() as i32,
        gray.as_raw().as_slice(),
    )?;
    Ok(mat.try_clone()?)
}

fn frame_mat(frame: &Frame) -> Result<Mat> {
    let pixels: Vec<Vec3b> = frame.pixels().map(|p| Vec3b::from(p.0)).collect();
    let mat = Mat::new_rows_cols_with_data(frame.height() as i32, frame.width() as i32, &pixels)?;
    Ok(mat.try_clone()?)
}

fn to_gray(mat: &Mat) -> Result<GrayImage> {
    let (w, h) = (mat.cols() as u32, mat.rows() as u32);
    GrayImage::from_raw(w, h, mat.data_bytes()?.to_vec())
        .ok_or_else(|| Error::Vision(format!("expected a {}x{} single channel mat", w, h)))
}

fn to_frame(mat: &Mat) -> Result<Frame> {
    let (w, h) = (mat.cols() as u32, mat.rows() as u32);
    Frame::from_raw(w, h, mat.data_bytes()?.to_vec())
        .ok_or_else(|| Error::Vision(format!("expected a {}x{} three channel mat", w, h)))
}

/// Dense flow from `prev` to `next` as `[row, col, (dx, dy)]`.
pub fn farneback(prev: &GrayImage, next: &GrayImage, p: &FarnebackParams) -> Result<Array3<f32>> {
    let (prev, next) = (gray_mat(prev)?, gray_mat(next)?);
    let flags = if p.use_gaussian_filter {
        video::OPTFLOW_FARNEBACK_GAUSSIAN
    } else {
        0
    };
    let mut flow = Mat::default();
    video::calc_optical_flow_farneback(
        &prev,
        &next,
        &mut flow,
        p.pyramid_scale,
        p.pyramid_levels as i32,
        p.window_size as i32,
        p.iterations as i32,
        p.poly_n as i32,
        p.poly_sigma,
        flags,
    )?;
    let (rows, cols) = (flow.rows() as usize, flow.cols() as usize);
    let values = flow.reshape(1, 0)?.data_typed::<f32>()?.to_vec();
    Array3::from_shape_vec((rows, cols, 2), values).map_err(|e| Error::Vision(e.to_string()))
}

pub fn canny(gray: &GrayImage, p: &CannyParams) -> Result<GrayImage> {
    let src = gray_mat(gray)?;
    let mut edges = Mat::default();
    imgproc::canny(
        &src,
        &mut edges,
        p.threshold1,
        p.threshold2,
        p.aperture_size as i32,
        p.l2_gradient,
    )?;
    to_gray(&edges)
}

/// Every pixel of the 3x3-dilated Harris response above `threshold * max`.
pub fn harris(gray: &GrayImage, p: &HarrisParams) -> Result<Vec<Keypoint>> {
    let mut src = Mat::default();
    gray_mat(gray)?.convert_to(&mut src, core::CV_32F, 1.0, 0.0)?;
    let mut response = Mat::default();
    imgproc::corner_harris(
        &src,
        &mut response,
        p.block_size as i32,
        p.aperture_size as i32,
        p.k,
        core::BORDER_DEFAULT,
    )?;
    let mut dilated = Mat::default();
    imgproc::dilate(
        &response,
        &mut dilated,
        &Mat::default(),
        Point::new(-1, -1),
        1,
        core::BORDER_CONSTANT,
        imgproc::morphology_default_border_value()?,
    )?;

    let mut max = 0.0;
    core::min_max_loc(&dilated, None, Some(&mut max), None, None, &core::no_array())?;
    let cutoff = (p.threshold * max) as f32;
    let cols = dilated.cols().max(1) as usize;
    Ok(dilated
        .data_typed::<f32>()?
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > cutoff)
        .map(|(i, v)| Keypoint::new((i / cols) as f32, (i % cols) as f32, *v))
        .collect())
}

pub fn fast(gray: &GrayImage, threshold: u8, non_max_suppression: bool) -> Result<Vec<Keypoint>> {
    let mut detector = FastFeatureDetector::create(
        threshold as i32,
        non_max_suppression,
        FastFeatureDetector_DetectorType::TYPE_9_16,
    )?;
    detect(&mut detector, gray)
}

pub fn orb(gray: &GrayImage, p: &OrbParams) -> Result<Vec<Keypoint>> {
    let score = match p.score_type {
        OrbScore::Harris => ORB_ScoreType::HARRIS_SCORE,
        OrbScore::Fast => ORB_ScoreType::FAST_SCORE,
    };
    let features = i32::try_from(p.max_features).unwrap_or(i32::MAX);
    let mut detector = ORB::create(features, 1.2, 8, 31, 0, 2, score, 31, 20)?;
    detect(&mut detector, gray)
}

fn detect(detector: &mut impl Feature2DTrait, gray: &GrayImage) -> Result<Vec<Keypoint>> {
    let mut found = Vector::<KeyPoint>::new();
    detector.detect(&gray_mat(gray)?, &mut found, &core::no_array())?;
    Ok(found
        .iter()
        .map(|k| {
            let pt = k.pt();
            Keypoint::new(pt.y, pt.x, k.response())
        })
        .collect())
}

enum Subtractor {
    Mog2(Ptr<video::BackgroundSubtractorMOG2>),
    Knn(Ptr<video::BackgroundSubtractorKNN>),
}

impl Subtractor {
    fn create(method: &BackgroundMethod) -> Result<Self> {
        Ok(match method {
            BackgroundMethod::Mog2(p) => Subtractor::Mog2(video::create_background_subtractor_mog2(
                i32::try_from(p.history).unwrap_or(i32::MAX),
                p.threshold,
                p.detect_shadows,
            )?),
            BackgroundMethod::Knn(p) => Subtractor::Knn(video::create_background_subtractor_knn(
                i32::try_from(p.history).unwrap_or(i32::MAX),
                p.threshold,
                p.detect_shadows,
            )?),
        })
    }
}

/// MOG2 or KNN subtractor, created on the first frame after construction or
/// [`BackgroundModel::clear`].
struct OpenCvModel {
    method: BackgroundMethod,
    subtractor: Option<Subtractor>,
}

pub fn background_model(method: &BackgroundMethod) -> Result<Box<dyn BackgroundModel>> {
    Ok(Box::new(OpenCvModel {
        method: *method,
        subtractor: Some(Subtractor::create(method)?),
    }))
}

impl BackgroundModel for OpenCvModel {
    fn apply(&mut self, frame: &Frame, learning_rate: f64) -> Result<GrayImage> {
        let image = frame_mat(frame)?;
        let subtractor = match self.subtractor.take() {
            Some(s) => s,
            None => Subtractor::create(&self.method)?,
        };
        let mut mask = Mat::default();
        match self.subtractor.insert(subtractor) {
            Subtractor::Mog2(s) => s.apply(&image, &mut mask, learning_rate)?,
            Subtractor::Knn(s) => s.apply(&image, &mut mask, learning_rate)?,
        }
        to_gray(&mask)
    }

    fn background_image(&self) -> Result<Option<Frame>> {
        let mut background = Mat::default();
        match &self.subtractor {
            None => return Ok(None),
            Some(Subtractor::Mog2(s)) => s.get_background_image(&mut background)?,
            Some(Subtractor::Knn(s)) => s.get_background_image(&mut background)?,
        }
        if background.empty() {
            return Ok(None);
        }
        to_frame(&background).map(Some)
    }

    fn clear(&mut self) {
        self.subtractor = None;
    }
}
