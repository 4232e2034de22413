use ffmpeg_next::ffi::AVCodecParameters;
use ffmpeg_next::format::stream::Stream;
use ffmpeg_next::{Rational, codec::Parameters, media};

/// What a decoder needs to know about one demuxed stream, detached from the
/// input's lifetime.
#[derive(Clone)]
pub struct AvStream {
    index: usize,
    parameters: Parameters,
    time_base: Rational,
    rate: Rational,
}

impl AvStream {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /// Average frame rate, or the container's base rate when unknown.
    pub fn rate(&self) -> Rational {
        self.rate
    }

    pub fn is_video(&self) -> bool {
        self.parameters.medium() == media::Type::Video
    }

    pub fn width(&self) -> u32 {
        self.codecpar().width.max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.codecpar().height.max(0) as u32
    }

    fn codecpar(&self) -> &AVCodecParameters {
        // Parameters owns a valid AVCodecParameters for its whole lifetime
        unsafe { &*self.parameters.as_ptr() }
    }
}

impl From<Stream<'_>> for AvStream {
    fn from(stream: Stream<'_>) -> Self {
        let avg = stream.avg_frame_rate();
        let rate = if avg.numerator() > 0 && avg.denominator() > 0 {
            avg
        } else {
            stream.rate()
        };
        Self {
            index: stream.index(),
            parameters: stream.parameters(),
            time_base: stream.time_base(),
            rate,
        }
    }
}
