use std::fmt::{Display, Formatter};
use std::path::Path;

use crate::error::Result;

/// Decoded picture handed to algorithms: packed 8-bit RGB.
pub type Frame = image::RgbImage;

/// Frames per second as an exact ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub num: i32,
    pub den: i32,
}

impl FrameRate {
    pub fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Properties of an input stream that size every output video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub frame_rate: FrameRate,
    pub width: u32,
    pub height: u32,
}

impl StreamInfo {
    pub fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// An open input video.
pub trait FrameSource {
    fn info(&self) -> StreamInfo;

    /// Next frame in stream order; `Ok(None)` once exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn close(&mut self) -> Result<()>;
}

/// An open output video.
pub trait FrameSink {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Opens input and output videos. The pipeline never touches a codec directly.
pub trait VideoBackend {
    fn name(&self) -> &str;

    fn open_reader(&self, path: &Path) -> Result<Box<dyn FrameSource>>;

    fn open_writer(&self, path: &Path, info: StreamInfo) -> Result<Box<dyn FrameSink>>;
}

#[cfg(feature = "ffmpeg")]
pub use self::ffmpeg::FfmpegBackend;

#[cfg(feature = "ffmpeg")]
mod ffmpeg {
    use std::path::{Path, PathBuf};

    use ffmpeg_io::{RgbFrame, Settings, VideoReader, VideoWriter};

    use super::{Frame, FrameRate, FrameSink, FrameSource, StreamInfo, VideoBackend};
    use crate::error::{Error, Result};

    /// FFmpeg-backed reader and writer.
    #[derive(Debug, Clone, Default)]
    pub struct FfmpegBackend {
        /// Encoder name for output videos; `None` uses the container default.
        pub codec: Option<String>,
    }

    impl FfmpegBackend {
        pub fn new() -> Result<Self> {
            ffmpeg_io::init().map_err(|e| Error::video("initialising ffmpeg", e))?;
            Ok(Self::default())
        }

        pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
            self.codec = Some(codec.into());
            self
        }
    }

    impl VideoBackend for FfmpegBackend {
        fn name(&self) -> &str {
            "ffmpeg"
        }

        fn open_reader(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
            let reader = VideoReader::open(path)
                .map_err(|e| Error::video(format!("opening {}", path.display()), e))?;
            let rate = reader.frame_rate();
            let (width, height) = reader.frame_size();
            Ok(Box::new(FfmpegSource {
                path: path.to_path_buf(),
                info: StreamInfo {
                    frame_rate: FrameRate::new(rate.numerator(), rate.denominator()),
                    width,
                    height,
                },
                reader: Some(reader),
            }))
        }

        fn open_writer(&self, path: &Path, info: StreamInfo) -> Result<Box<dyn FrameSink>> {
            let settings = Settings {
                width: info.width,
                height: info.height,
                frame_rate: to_rational(info.frame_rate),
                codec: self.codec.clone(),
                ..Default::default()
            };
            let writer = VideoWriter::create(path, settings)
                .map_err(|e| Error::video(format!("creating {}", path.display()), e))?;
            Ok(Box::new(FfmpegSink {
                path: path.to_path_buf(),
                writer: Some(writer),
            }))
        }
    }

    fn to_rational(rate: FrameRate) -> ffmpeg_io::Rational {
        if rate.num <= 0 || rate.den <= 0 {
            // unknown input rate; any positive rate keeps the encoder happy
            return ffmpeg_io::Rational::new(25, 1);
        }
        ffmpeg_io::Rational::new(rate.num, rate.den)
    }

    struct FfmpegSource {
        path: PathBuf,
        info: StreamInfo,
        reader: Option<VideoReader>,
    }

    impl FrameSource for FfmpegSource {
        fn info(&self) -> StreamInfo {
            self.info
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };
            let decoded = reader
                .next_frame()
                .map_err(|e| Error::video(format!("decoding {}", self.path.display()), e))?;
            match decoded {
                Some(rgb) => Frame::from_raw(rgb.width, rgb.height, rgb.data)
                    .map(Some)
                    .ok_or_else(|| Error::video("decoded frame", "buffer size mismatch")),
                None => Ok(None),
            }
        }

        fn close(&mut self) -> Result<()> {
            self.reader.take();
            Ok(())
        }
    }

    struct FfmpegSink {
        path: PathBuf,
        writer: Option<VideoWriter>,
    }

    impl FrameSink for FfmpegSink {
        fn write(&mut self, frame: &Frame) -> Result<()> {
            let writer = self.writer.as_mut().ok_or_else(|| {
                Error::video(format!("writing {}", self.path.display()), "sink closed")
            })?;
            let rgb = RgbFrame::new(frame.width(), frame.height(), frame.as_raw().clone())
                .map_err(|e| Error::video("encoding frame", e))?;
            writer
                .write(&rgb)
                .map_err(|e| Error::video(format!("writing {}", self.path.display()), e))
        }

        fn close(&mut self) -> Result<()> {
            match self.writer.take() {
                Some(mut writer) => writer
                    .finish()
                    .map_err(|e| Error::video(format!("finishing {}", self.path.display()), e)),
                None => Ok(()),
            }
        }
    }
}
