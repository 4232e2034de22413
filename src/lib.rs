//! Streams video frame by frame through a vision algorithm and persists
//! what it derives: per-frame `.npy` arrays and annotated videos.
//!
//! Four algorithm families are provided in [`primitives`]: dense optical
//! flow, background subtraction, edge detection and keypoint detection.
//! [`pipeline::StreamingPipeline`] drives any of them over a
//! [`pipeline::VideoBackend`]; with the `ffmpeg` feature that backend is
//! [`pipeline::FfmpegBackend`]. The numerics behind the families come from
//! the provider in [`vision`]: OpenCV with the `opencv` feature, otherwise a
//! reduced `imageproc` set.

pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod primitives;
pub mod vision;

pub use error::{Error, Result};
