//! Container and stream summary, in the spirit of `ffprobe`.

use std::fmt;
use std::path::Path;

use crate::stream::AvStream;

/// Per-stream summary.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub index: usize,
    /// "video" | "audio" | "subtitle" etc.
    pub codec_type: String,
    pub codec_name: String,
    /// Frame rate as "num/den"; meaningless for non-video streams.
    pub rate: String,
    /// Number of frames if the container records it.
    pub frames: Option<i64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub format_name: String,
    /// Duration in seconds; None if unknown (e.g. raw h264).
    pub duration_sec: Option<f64>,
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    pub fn video_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter().filter(|s| s.codec_type == "video")
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "format_name={}", self.format_name)?;
        match self.duration_sec {
            Some(d) => writeln!(f, "duration_sec={:.3}", d)?,
            None => writeln!(f, "duration_sec=N/A")?,
        }
        for s in &self.streams {
            write!(f, "stream #{}: {} ({})", s.index, s.codec_type, s.codec_name)?;
            if let (Some(w), Some(h)) = (s.width, s.height) {
                write!(f, " {}x{} @ {}", w, h, s.rate)?;
            }
            if let Some(n) = s.frames {
                write!(f, ", {} frames", n)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Opens a file and returns its media metadata.
pub fn probe(path: &Path) -> anyhow::Result<MediaInfo> {
    let input = ffmpeg_next::format::input(path)?;

    let format_name = input.format().name().to_string();
    // AV_TIME_BASE = 1_000_000; duration is in 1/AV_TIME_BASE seconds
    let duration_sec = {
        let d = input.duration();
        if d == ffmpeg_next::ffi::AV_NOPTS_VALUE as i64 || d <= 0 {
            None
        } else {
            Some(d as f64 / 1_000_000.0)
        }
    };

    let streams = input
        .streams()
        .map(|stream| {
            let frames = Some(stream.frames()).filter(|n| *n > 0);
            let av_stream = AvStream::from(stream);
            let params = av_stream.parameters();
            let rate = av_stream.rate();
            let (width, height) = if av_stream.is_video() {
                (Some(av_stream.width()), Some(av_stream.height()))
            } else {
                (None, None)
            };
            StreamInfo {
                index: av_stream.index(),
                codec_type: format!("{:?}", params.medium()).to_lowercase(),
                codec_name: format!("{:?}", params.id()).to_lowercase(),
                rate: format!("{}/{}", rate.numerator(), rate.denominator()),
                frames,
                width,
                height,
            }
        })
        .collect();

    Ok(MediaInfo {
        format_name,
        duration_sec,
        streams,
    })
}
