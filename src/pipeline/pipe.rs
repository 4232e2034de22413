use std::path::Path;

use crate::error::{Error, Result};
use crate::pipeline::stream::{FrameSink, FrameSource, VideoBackend};
use crate::pipeline::types::{Outputs, RunSummary, Sink};
use crate::primitives::FrameAlgorithm;

/// Drives one algorithm over one video, feeding every requested sink.
///
/// A run opens the reader and each video writer, visits every frame in
/// stream order and releases everything it opened exactly once, in reverse
/// order of acquisition, whether the run succeeded or not.
pub struct StreamingPipeline<'a> {
    backend: &'a dyn VideoBackend,
}

impl<'a> StreamingPipeline<'a> {
    pub fn new(backend: &'a dyn VideoBackend) -> Self {
        Self { backend }
    }

    pub fn process<A, O>(&self, algorithm: &mut A, input: &Path, outputs: &O) -> Result<RunSummary>
    where
        A: FrameAlgorithm + ?Sized,
        O: Outputs<A::Output> + ?Sized,
    {
        let sinks = outputs.sinks();
        for sink in &sinks {
            if let Some(dir) = sink.output_dir() {
                std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
            }
        }

        algorithm.reset();

        log::info!(
            "Pipe: processing {} with {} sink(s) via {}",
            input.display(),
            sinks.len(),
            self.backend.name()
        );
        let mut reader = self.backend.open_reader(input)?;
        let info = reader.info();
        log::debug!(
            "Pipe: input {}x{} @ {} ({:.2} fps)",
            info.width,
            info.height,
            info.frame_rate,
            info.frame_rate.as_f64()
        );

        let mut writers: Vec<Option<Box<dyn FrameSink>>> = Vec::with_capacity(sinks.len());
        let mut result = Ok(RunSummary::default());
        for sink in &sinks {
            match sink {
                Sink::Video { name, path, .. } => match self.backend.open_writer(path, info) {
                    Ok(writer) => {
                        log::debug!("Pipe: opened {} sink {}", name, path.display());
                        writers.push(Some(writer));
                    }
                    Err(e) => {
                        result = Err(e);
                        break;
                    }
                },
                Sink::Array { .. } => writers.push(None),
            }
        }

        if result.is_ok() {
            result = run_frames(algorithm, reader.as_mut(), &sinks, &mut writers);
        }

        for (sink, slot) in sinks.iter().zip(writers.iter_mut()).rev() {
            if let Some(mut writer) = slot.take() {
                let closed = writer.close();
                log::debug!("Pipe: closed {} sink", sink.name());
                keep_first_error(&mut result, closed, sink.name());
            }
        }
        keep_first_error(&mut result, reader.close(), "input");

        match &result {
            Ok(summary) => log::info!(
                "Pipe: {} done, {} frame(s), {} array(s), {} video frame(s)",
                input.display(),
                summary.frames,
                summary.arrays_written,
                summary.video_frames_written
            ),
            Err(e) => log::error!("Pipe: {} failed: {}", input.display(), e),
        }
        result
    }
}

fn run_frames<A>(
    algorithm: &mut A,
    reader: &mut dyn FrameSource,
    sinks: &[Sink<A::Output>],
    writers: &mut [Option<Box<dyn FrameSink>>],
) -> Result<RunSummary>
where
    A: FrameAlgorithm + ?Sized,
{
    let mut summary = RunSummary::default();
    while let Some(frame) = reader.next_frame()? {
        let index = summary.frames + 1;
        let output = algorithm.process_frame(&frame)?;

        for (sink, slot) in sinks.iter().zip(writers.iter_mut()) {
            match sink {
                Sink::Array {
                    template, encode, ..
                } => {
                    encode(&output).write(&template.render(index))?;
                    summary.arrays_written += 1;
                }
                Sink::Video { name, encode, .. } => {
                    let picture = encode(&output, &frame);
                    if picture.dimensions() != frame.dimensions() {
                        return Err(Error::video(
                            format!("{} sink, frame {}", name, index),
                            format!(
                                "visualization is {:?}, input is {:?}",
                                picture.dimensions(),
                                frame.dimensions()
                            ),
                        ));
                    }
                    if let Some(writer) = slot.as_mut() {
                        writer.write(&picture)?;
                        summary.video_frames_written += 1;
                    }
                }
            }
        }
        summary.frames = index;
    }
    Ok(summary)
}

fn keep_first_error(result: &mut Result<RunSummary>, closed: Result<()>, what: &str) {
    if let Err(e) = closed {
        if result.is_ok() {
            *result = Err(e);
        } else {
            log::warn!("Pipe: closing {} also failed: {}", what, e);
        }
    }
}

#[cfg(test)]
#[path = "pipe_test.rs"]
mod pipe_test;
