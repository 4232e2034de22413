//! Streaming pipeline: one algorithm, one input video, any number of sinks.
//!
//! Data Flow:
//! ```text
//!                                           ┌─► ArrayEncoder ─► %05d.npy per frame
//!                                           │
//! FrameSource ──► FrameAlgorithm::process ──┤
//!   (decode)          (per frame)           │
//!                                           └─► FrameEncoder ─► FrameSink (video)
//! ```
//!
//! Output videos take the input's frame rate and size. Directories for every
//! sink exist before the first frame is read.

pub mod pipe;
pub mod stream;
pub mod types;

pub use pipe::StreamingPipeline;
pub use stream::{Frame, FrameRate, FrameSink, FrameSource, StreamInfo, VideoBackend};
pub use types::{NoOutputs, NpyArray, Outputs, PathTemplate, RunSummary, Sink};

#[cfg(feature = "ffmpeg")]
pub use stream::FfmpegBackend;
