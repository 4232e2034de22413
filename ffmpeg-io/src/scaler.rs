use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context, flag::Flags};

/// Pixel-format converter between decoded frames and packed RGB24.
pub struct Scaler {
    context: Context,
}

impl Scaler {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    /// Same-size conversion from `format` into packed RGB24.
    pub fn to_rgb24(format: Pixel, width: u32, height: u32) -> anyhow::Result<Self> {
        let context = Context::get(
            format,
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            Flags::BILINEAR,
        )?;
        Ok(Self::new(context))
    }

    /// Same-size conversion from packed RGB24 into an encoder's `format`.
    pub fn from_rgb24(format: Pixel, width: u32, height: u32) -> anyhow::Result<Self> {
        let context = Context::get(
            Pixel::RGB24,
            width,
            height,
            format,
            width,
            height,
            Flags::BILINEAR,
        )?;
        Ok(Self::new(context))
    }

    pub fn run(
        &mut self,
        frame: &ffmpeg_next::frame::Video,
        dst: &mut ffmpeg_next::frame::Video,
    ) -> anyhow::Result<()> {
        self.context.run(frame, dst).map_err(|e| e.into())
    }
}

unsafe impl Send for Scaler {}
