use std::path::Path;

use ffmpeg_next::Rational;

use crate::encoder::Encoder;

/// Muxer writing a single encoded video stream to a file.
pub struct AvOutput {
    inner: ffmpeg_next::format::context::Output,
    stream_index: Option<usize>,
    have_written_header: bool,
    have_written_trailer: bool,
}

impl AvOutput {
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let output = ffmpeg_next::format::output(path)?;
        Ok(Self {
            inner: output,
            stream_index: None,
            have_written_header: false,
            have_written_trailer: false,
        })
    }

    /// Whether encoders feeding this container must emit global headers.
    pub fn needs_global_header(&self) -> bool {
        self.inner
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER)
    }

    /// Encoder the container format would pick for `path` when none is requested.
    pub fn default_video_codec(&self, path: &Path) -> Option<ffmpeg_next::Codec> {
        let id = self
            .inner
            .format()
            .codec(&path, ffmpeg_next::media::Type::Video);
        ffmpeg_next::encoder::find(id)
    }

    pub fn add_stream(&mut self, encoder: &Encoder) -> anyhow::Result<usize> {
        let codec = encoder.inner().codec();
        let mut writer_stream = self.inner.add_stream(codec)?;
        writer_stream.set_parameters(encoder.inner());
        writer_stream.set_time_base(encoder.time_base());
        let index = writer_stream.index();
        self.stream_index = Some(index);
        Ok(index)
    }

    fn stream_time_base(&self, stream_index: usize) -> anyhow::Result<Rational> {
        self.inner
            .stream(stream_index)
            .map(|s| s.time_base())
            .ok_or_else(|| anyhow::anyhow!("stream not found"))
    }

    pub fn write_header(&mut self) -> anyhow::Result<()> {
        if !self.have_written_header {
            self.inner.write_header()?;
            self.have_written_header = true;
        }
        Ok(())
    }

    pub fn write_packet(
        &mut self,
        mut packet: ffmpeg_next::Packet,
        time_base: Rational,
    ) -> anyhow::Result<()> {
        self.write_header()?;
        let stream_index = self
            .stream_index
            .ok_or_else(|| anyhow::anyhow!("no stream added to output"))?;
        packet.set_stream(stream_index);
        packet.set_position(-1);
        let out_time_base = self.stream_time_base(stream_index)?;
        packet.rescale_ts(time_base, out_time_base);
        packet.write_interleaved(&mut self.inner)?;
        Ok(())
    }

    pub fn finish(&mut self) -> anyhow::Result<()> {
        if self.have_written_header && !self.have_written_trailer {
            self.have_written_trailer = true;
            self.inner.write_trailer()?;
        }
        Ok(())
    }
}
