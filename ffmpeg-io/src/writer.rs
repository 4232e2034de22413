use std::path::{Path, PathBuf};

use crate::{
    encoder::{Encoder, Settings},
    frame::RgbFrame,
    output::AvOutput,
    scaler::Scaler,
};

/// Push-based video writer accepting RGB24 frames.
///
/// `finish` flushes the encoder and writes the container trailer exactly once;
/// a writer dropped without `finish` is finished on drop and errors are logged.
pub struct VideoWriter {
    path: PathBuf,
    output: AvOutput,
    encoder: Encoder,
    scaler: Scaler,
    width: u32,
    height: u32,
    frames_written: u64,
    finished: bool,
}

impl VideoWriter {
    pub fn create(path: &Path, settings: Settings) -> anyhow::Result<Self> {
        let mut output = AvOutput::new(path)?;

        let codec = match settings.codec {
            Some(ref name) => match ffmpeg_next::encoder::find_by_name(name) {
                Some(codec) => codec,
                None => {
                    log::warn!("encoder {} not available, using container default", name);
                    output
                        .default_video_codec(path)
                        .ok_or_else(|| anyhow::anyhow!("codec not found: {}", name))?
                }
            },
            None => output
                .default_video_codec(path)
                .ok_or_else(|| anyhow::anyhow!("no video codec for {}", path.display()))?,
        };

        let encoder = Encoder::new(codec, &settings, output.needs_global_header())?;
        output.add_stream(&encoder)?;
        output.write_header()?;
        let scaler = Scaler::from_rgb24(encoder.format(), settings.width, settings.height)?;

        Ok(Self {
            path: path.to_path_buf(),
            output,
            encoder,
            scaler,
            width: settings.width,
            height: settings.height,
            frames_written: 0,
            finished: false,
        })
    }

    pub fn write(&mut self, frame: &RgbFrame) -> anyhow::Result<()> {
        if self.finished {
            anyhow::bail!("writer for {} already finished", self.path.display());
        }
        if frame.width != self.width || frame.height != self.height {
            anyhow::bail!(
                "frame size {}x{} does not match writer size {}x{}",
                frame.width,
                frame.height,
                self.width,
                self.height
            );
        }

        let rgb = frame.to_video();
        let mut converted = ffmpeg_next::frame::Video::empty();
        self.scaler.run(&rgb, &mut converted)?;
        self.encoder.send_frame(&mut converted)?;
        self.drain()?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn finish(&mut self) -> anyhow::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.encoder.send_eof()?;
        self.drain()?;
        self.output.finish()?;
        log::debug!(
            "finished {} after {} frames",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }

    fn drain(&mut self) -> anyhow::Result<()> {
        let time_base = self.encoder.time_base();
        while let Some(packet) = self.encoder.receive_packet()? {
            self.output.write_packet(packet, time_base)?;
        }
        Ok(())
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("finish {} on drop: {:#}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
#[path = "writer_test.rs"]
mod writer_test;
