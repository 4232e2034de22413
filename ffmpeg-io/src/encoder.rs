use ffmpeg_next::{Dictionary, Rational, picture};

#[derive(Debug, Clone)]
pub struct Settings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Rational,
    pub keyframe_interval: u32,
    /// `None` picks the container's default video codec.
    pub codec: Option<String>,
    pub pixel_format: ffmpeg_next::format::Pixel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frame_rate: Rational::new(25, 1),
            keyframe_interval: 25,
            codec: Some("libx264".to_string()),
            pixel_format: ffmpeg_next::format::Pixel::YUV420P,
        }
    }
}

/// Video encoder with frame-index based timestamps.
pub struct Encoder {
    inner: ffmpeg_next::codec::encoder::Video,
    encoder_time_base: Rational,
    keyframe_interval: i64,
    frame_index: i64,
}

impl Encoder {
    pub fn new(
        codec: ffmpeg_next::Codec,
        settings: &Settings,
        global_header: bool,
    ) -> anyhow::Result<Self> {
        let ctx = ffmpeg_next::codec::Context::new_with_codec(codec);
        let mut encoder = ctx.encoder().video()?;
        encoder.set_width(settings.width);
        encoder.set_height(settings.height);
        encoder.set_format(settings.pixel_format);
        encoder.set_frame_rate(Some(settings.frame_rate));
        // one tick per frame
        encoder.set_time_base(settings.frame_rate.invert());
        encoder.set_gop(settings.keyframe_interval);
        if global_header {
            encoder.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut opts = Dictionary::new();
        if codec.name() == "libx264" {
            opts.set("preset", "ultrafast");
        }
        let encoder = encoder.open_with(opts)?;
        log::info!("encoder opened successfully: {}", codec.name());

        Ok(Self {
            inner: encoder,
            encoder_time_base: settings.frame_rate.invert(),
            keyframe_interval: settings.keyframe_interval.max(1) as i64,
            frame_index: 0,
        })
    }

    pub fn send_frame(&mut self, frame: &mut ffmpeg_next::frame::Video) -> anyhow::Result<()> {
        if self.frame_index % self.keyframe_interval == 0 {
            frame.set_kind(picture::Type::I);
        }
        frame.set_pts(Some(self.frame_index));
        self.inner.send_frame(frame)?;
        self.frame_index += 1;
        Ok(())
    }

    pub fn send_eof(&mut self) -> anyhow::Result<()> {
        self.inner.send_eof()?;
        Ok(())
    }

    /// `Ok(None)` when the encoder needs more frames or is fully drained.
    pub fn receive_packet(&mut self) -> anyhow::Result<Option<ffmpeg_next::Packet>> {
        let mut packet = ffmpeg_next::Packet::empty();
        match self.inner.receive_packet(&mut packet) {
            Ok(()) => Ok(Some(packet)),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
                Ok(None)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn time_base(&self) -> Rational {
        self.encoder_time_base
    }

    pub fn format(&self) -> ffmpeg_next::format::Pixel {
        self.inner.format()
    }

    pub fn inner(&self) -> &ffmpeg_next::codec::encoder::Video {
        &self.inner
    }
}
