use std::path::Path;

use ffmpeg_next::Rational;

use crate::{decoder::Decoder, frame::RgbFrame, input::AvInput, scaler::Scaler};

/// Pull-based video reader yielding RGB24 frames in stream order.
pub struct VideoReader {
    input: AvInput,
    decoder: Decoder,
    scaler: Scaler,
    frame_number: u64,
    eof_sent: bool,
}

impl VideoReader {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let input = AvInput::new(path, None)?;
        let stream = input
            .best_video_stream()
            .ok_or_else(|| anyhow::anyhow!("no video stream in {}", path.display()))?
            .clone();
        let decoder = Decoder::new(&stream)?;
        let scaler = Scaler::to_rgb24(decoder.format(), decoder.width(), decoder.height())?;

        log::debug!(
            "opened {}: stream {}, {}x{} @ {}/{}",
            path.display(),
            stream.index(),
            decoder.width(),
            decoder.height(),
            stream.rate().numerator(),
            stream.rate().denominator()
        );

        Ok(Self {
            input,
            decoder,
            scaler,
            frame_number: 0,
            eof_sent: false,
        })
    }

    pub fn frame_rate(&self) -> Rational {
        self.decoder.stream().rate()
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.decoder.width(), self.decoder.height())
    }

    /// Number of frames returned so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Decodes the next frame; `Ok(None)` once the stream is exhausted.
    pub fn next_frame(&mut self) -> anyhow::Result<Option<RgbFrame>> {
        loop {
            if let Some(decoded) = self.decoder.receive_frame()? {
                let mut rgb = ffmpeg_next::frame::Video::empty();
                self.scaler.run(&decoded, &mut rgb)?;
                self.frame_number += 1;
                return RgbFrame::from_video(&rgb).map(Some);
            }

            if self.eof_sent {
                return Ok(None);
            }

            let stream_index = self.decoder.stream().index();
            match self.input.read_packet(stream_index) {
                Some(packet) => self.decoder.send_packet(packet)?,
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }
}

impl Iterator for VideoReader {
    type Item = anyhow::Result<RgbFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
