use std::ffi::CString;
use std::path::Path;

use ffmpeg_next::Dictionary;

use crate::stream::AvStream;

/// Demuxer over a file or URL.
pub struct AvInput {
    inner: ffmpeg_next::format::context::Input,
    streams: Vec<AvStream>,
}

impl AvInput {
    /// Resolve input format by name (e.g. "rawvideo", "v4l2") via FFmpeg's av_find_input_format.
    fn find_input_format(name: &str) -> anyhow::Result<ffmpeg_next::format::format::Input> {
        let cname = CString::new(name)
            .map_err(|e| anyhow::anyhow!("invalid format name {:?}: {}", name, e))?;
        let ptr = unsafe { ffmpeg_next::ffi::av_find_input_format(cname.as_ptr()) };
        if ptr.is_null() {
            return Err(anyhow::anyhow!("input format not found: {}", name));
        }
        Ok(unsafe { ffmpeg_next::format::format::Input::wrap(ptr as *mut _) })
    }

    pub fn new(path: &Path, format: Option<&str>) -> anyhow::Result<Self> {
        use ffmpeg_next::format::format::Format;

        let input = match format {
            Some(fmt_name) => {
                let fmt = Self::find_input_format(fmt_name)?;
                let ctx =
                    ffmpeg_next::format::open_with(path, &Format::Input(fmt), Dictionary::new())?;
                ctx.input()
            }
            None => ffmpeg_next::format::input(path)?,
        };

        let streams = input.streams().map(AvStream::from).collect();
        Ok(Self {
            inner: input,
            streams,
        })
    }

    pub fn streams(&self) -> &[AvStream] {
        &self.streams
    }

    /// The stream FFmpeg considers the primary video stream.
    pub fn best_video_stream(&self) -> Option<&AvStream> {
        let index = self
            .inner
            .streams()
            .best(ffmpeg_next::media::Type::Video)?
            .index();
        self.streams.iter().find(|s| s.index() == index)
    }

    /// Next packet belonging to `stream_index`; `None` at end of input.
    pub fn read_packet(&mut self, stream_index: usize) -> Option<ffmpeg_next::Packet> {
        for (stream, packet) in self.inner.packets() {
            if stream.index() == stream_index {
                return Some(packet);
            }
        }
        None
    }
}
