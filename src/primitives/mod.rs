//! Algorithm families run by the pipeline.

pub mod background;
pub mod edges;
pub mod flow;
pub mod keypoints;

use crate::error::Result;
use crate::pipeline::Frame;

pub use background::{
    BackgroundMethod, BackgroundModelFactory, BackgroundOutputs, BackgroundSeparation, BackgroundSeparator,
    KnnParams, Mog2Params, NativeModels,
};
pub use edges::{CannyEdgeDetector, CannyParams, EdgeMask, EdgeOutputs};
pub use flow::{FarnebackParams, FlowField, FlowOutputs, OpticalFlowFarneback};
pub use keypoints::{
    FastKeypointDetector, FastParams, HarrisKeypointDetector, HarrisParams, KeypointOutputs,
    Keypoints, OrbKeypointDetector, OrbParams, OrbScore,
};
pub use crate::vision::Keypoint;

/// A stateful per-frame transform.
///
/// Parameters are fixed at construction. `reset` clears cross-frame state so
/// one instance can be reused across runs; the pipeline calls it once before
/// the first frame of every run.
pub trait FrameAlgorithm {
    type Output;

    fn reset(&mut self) {}

    fn process_frame(&mut self, frame: &Frame) -> Result<Self::Output>;
}

impl<A: FrameAlgorithm + ?Sized> FrameAlgorithm for Box<A> {
    type Output = A::Output;

    fn reset(&mut self) {
        (**self).reset()
    }

    fn process_frame(&mut self, frame: &Frame) -> Result<Self::Output> {
        (**self).process_frame(frame)
    }
}
