//! Synchronous FFmpeg video reading and writing.
//!
//! ```text
//! file ──► AvInput (demux) ──► Decoder ──► Scaler ──► RgbFrame
//!
//! RgbFrame ──► Scaler ──► Encoder ──► AvOutput (mux) ──► file
//! ```
//!
//! Everything here blocks the calling thread; frames come out strictly in
//! stream order.

/// Registers FFmpeg components. Call once at startup before opening any file.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod input;
pub mod metadata;
pub mod output;
pub mod reader;
pub mod scaler;
pub mod stream;
pub mod writer;

pub use encoder::Settings;
pub use ffmpeg_next::Rational;
pub use frame::RgbFrame;
pub use metadata::probe;
pub use reader::VideoReader;
pub use writer::VideoWriter;
