use std::fmt::{Display, Formatter};

use ffmpeg_next::format::Pixel;

/// Tightly packed RGB24 picture (`width * height * 3` bytes, no row padding).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> anyhow::Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            anyhow::bail!(
                "rgb frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            );
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Copies an RGB24 ffmpeg frame, dropping the per-row stride padding.
    pub fn from_video(frame: &ffmpeg_next::frame::Video) -> anyhow::Result<Self> {
        if frame.format() != Pixel::RGB24 {
            anyhow::bail!("expected rgb24 frame, got {:?}", frame.format());
        }
        let width = frame.width();
        let height = frame.height();
        let row_len = width as usize * 3;
        let stride = frame.stride(0);
        let plane = frame.data(0);

        let mut data = Vec::with_capacity(row_len * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            data.extend_from_slice(&plane[start..start + row_len]);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Builds an RGB24 ffmpeg frame, honouring the destination stride.
    pub fn to_video(&self) -> ffmpeg_next::frame::Video {
        let mut frame = ffmpeg_next::frame::Video::new(Pixel::RGB24, self.width, self.height);
        let row_len = self.width as usize * 3;
        if row_len == 0 {
            return frame;
        }
        let stride = frame.stride(0);
        let plane = frame.data_mut(0);
        for (row, src) in self.data.chunks_exact(row_len).enumerate() {
            let start = row * stride;
            plane[start..start + row_len].copy_from_slice(src);
        }
        frame
    }
}

impl Display for RgbFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "RgbFrame {{ width: {}, height: {}, data: {} }}",
            self.width,
            self.height,
            self.data.len()
        )
    }
}
