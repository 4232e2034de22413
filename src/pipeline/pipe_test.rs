// ============================================================================
// StreamingPipeline Tests
// ============================================================================

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ndarray::Array1;

use super::StreamingPipeline;
use crate::error::{Error, Result};
use crate::pipeline::stream::{Frame, FrameRate, FrameSink, FrameSource, StreamInfo, VideoBackend};
use crate::pipeline::types::{NoOutputs, NpyArray, Outputs, PathTemplate, Sink};
use crate::primitives::FrameAlgorithm;

// ------------------------------------------------------------------------
// In-memory backend
// ------------------------------------------------------------------------

#[derive(Default)]
struct Journal {
    events: Vec<String>,
    frames_read: usize,
    written: HashMap<PathBuf, usize>,
    writer_infos: Vec<StreamInfo>,
}

#[derive(Default, Clone, Copy)]
struct Faults {
    read_at: Option<usize>,
    open_writer: bool,
    close_writer: bool,
}

struct MemoryBackend {
    frames: Vec<Frame>,
    info: StreamInfo,
    faults: Faults,
    journal: Rc<RefCell<Journal>>,
}

impl MemoryBackend {
    fn new(count: usize) -> Self {
        let frames = (0..count)
            .map(|i| Frame::from_pixel(8, 6, image::Rgb([i as u8, 0, 0])))
            .collect();
        Self {
            frames,
            info: StreamInfo {
                frame_rate: FrameRate::new(30000, 1001),
                width: 8,
                height: 6,
            },
            faults: Faults::default(),
            journal: Rc::default(),
        }
    }

    fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    fn events(&self) -> Vec<String> {
        self.journal.borrow().events.clone()
    }

    fn count(&self, event: &str) -> usize {
        self.journal
            .borrow()
            .events
            .iter()
            .filter(|e| e.as_str() == event)
            .count()
    }
}

impl VideoBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn open_reader(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        self.journal.borrow_mut().events.push("open reader".into());
        if !path.to_string_lossy().ends_with(".mp4") {
            return Err(Error::video(
                format!("opening {}", path.display()),
                "not a video",
            ));
        }
        Ok(Box::new(MemorySource {
            frames: self.frames.clone(),
            position: 0,
            info: self.info,
            fail_at: self.faults.read_at,
            journal: Rc::clone(&self.journal),
        }))
    }

    fn open_writer(&self, path: &Path, info: StreamInfo) -> Result<Box<dyn FrameSink>> {
        let name = file_name(path);
        if self.faults.open_writer {
            return Err(Error::video(format!("creating {}", name), "no encoder"));
        }
        let mut journal = self.journal.borrow_mut();
        journal.events.push(format!("open writer {}", name));
        journal.writer_infos.push(info);
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            fail_close: self.faults.close_writer,
            journal: Rc::clone(&self.journal),
        }))
    }
}

struct MemorySource {
    frames: Vec<Frame>,
    position: usize,
    info: StreamInfo,
    fail_at: Option<usize>,
    journal: Rc<RefCell<Journal>>,
}

impl FrameSource for MemorySource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.position + 1) {
            return Err(Error::video("decoding", "corrupt packet"));
        }
        let frame = self.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
            self.journal.borrow_mut().frames_read += 1;
        }
        Ok(frame)
    }

    fn close(&mut self) -> Result<()> {
        self.journal.borrow_mut().events.push("close reader".into());
        Ok(())
    }
}

struct MemorySink {
    path: PathBuf,
    fail_close: bool,
    journal: Rc<RefCell<Journal>>,
}

impl FrameSink for MemorySink {
    fn write(&mut self, _frame: &Frame) -> Result<()> {
        *self
            .journal
            .borrow_mut()
            .written
            .entry(self.path.clone())
            .or_default() += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let name = file_name(&self.path);
        self.journal
            .borrow_mut()
            .events
            .push(format!("close writer {}", name));
        if self.fail_close {
            return Err(Error::video(format!("finishing {}", name), "disk full"));
        }
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ------------------------------------------------------------------------
// Test algorithm and outputs
// ------------------------------------------------------------------------

/// Emits the 1-based position of each frame within the current run.
#[derive(Default)]
struct Counter {
    resets: usize,
    seen: u64,
    fail_at: Option<u64>,
    require_dir: Option<PathBuf>,
}

impl FrameAlgorithm for Counter {
    type Output = u64;

    fn reset(&mut self) {
        self.resets += 1;
        self.seen = 0;
    }

    fn process_frame(&mut self, _frame: &Frame) -> Result<u64> {
        if let Some(dir) = &self.require_dir {
            assert!(dir.is_dir(), "{} missing before first frame", dir.display());
        }
        self.seen += 1;
        if self.fail_at == Some(self.seen) {
            return Err(Error::config(format!("boom on frame {}", self.seen)));
        }
        Ok(self.seen)
    }
}

#[derive(Default)]
struct CounterOutputs {
    array: Option<PathTemplate>,
    video: Option<PathBuf>,
    second_video: Option<PathBuf>,
}

fn encode_count(count: &u64) -> NpyArray {
    Array1::from_elem(1, *count as f32).into()
}

fn encode_same(_count: &u64, frame: &Frame) -> Frame {
    frame.clone()
}

fn encode_thumbnail(_count: &u64, _frame: &Frame) -> Frame {
    Frame::new(1, 1)
}

impl Outputs<u64> for CounterOutputs {
    fn sinks(&self) -> Vec<Sink<u64>> {
        let mut sinks = Vec::new();
        if let Some(template) = &self.array {
            sinks.push(Sink::array("count", template, encode_count));
        }
        if let Some(path) = &self.video {
            sinks.push(Sink::video("video", path, encode_same));
        }
        if let Some(path) = &self.second_video {
            sinks.push(Sink::video("second", path, encode_same));
        }
        sinks
    }
}

fn read_count(path: &Path) -> f32 {
    let array: Array1<f32> = ndarray_npy::read_npy(path).unwrap();
    array[0]
}

// ------------------------------------------------------------------------
// Runs
// ------------------------------------------------------------------------

#[test]
fn test_no_sinks_visits_every_frame_without_writes() {
    let backend = MemoryBackend::new(7);
    let mut algorithm = Counter::default();

    let summary = StreamingPipeline::new(&backend)
        .process(&mut algorithm, Path::new("in.mp4"), &NoOutputs)
        .unwrap();

    assert_eq!(summary.frames, 7);
    assert_eq!(summary.writes(), 0);
    assert_eq!(algorithm.seen, 7);
    assert_eq!(backend.journal.borrow().frames_read, 7);
    assert!(backend.journal.borrow().written.is_empty());
    assert_eq!(backend.events(), vec!["open reader", "close reader"]);
}

#[test]
fn test_array_sink_writes_one_file_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let template = PathTemplate::parse(&format!("{}/counts/%03d.npy", dir.path().display())).unwrap();
    let backend = MemoryBackend::new(5);
    let mut algorithm = Counter::default();
    let outputs = CounterOutputs {
        array: Some(template.clone()),
        ..Default::default()
    };

    let summary = StreamingPipeline::new(&backend)
        .process(&mut algorithm, Path::new("in.mp4"), &outputs)
        .unwrap();

    assert_eq!(summary.arrays_written, 5);
    let mut names: Vec<_> = std::fs::read_dir(dir.path().join("counts"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["001.npy", "002.npy", "003.npy", "004.npy", "005.npy"]);
    for index in 1..=5u64 {
        assert_eq!(read_count(&template.render(index)), index as f32);
    }
}

#[test]
fn test_video_sink_takes_input_rate_and_size() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryBackend::new(4);
    let mut algorithm = Counter::default();
    let video = dir.path().join("viz").join("out.mp4");
    let outputs = CounterOutputs {
        video: Some(video.clone()),
        ..Default::default()
    };

    let summary = StreamingPipeline::new(&backend)
        .process(&mut algorithm, Path::new("in.mp4"), &outputs)
        .unwrap();

    assert_eq!(summary.video_frames_written, 4);
    let journal = backend.journal.borrow();
    assert_eq!(journal.written[&video], 4);
    assert_eq!(journal.writer_infos, vec![backend.info]);
    assert!(dir.path().join("viz").is_dir());
}

#[test]
fn test_directories_exist_before_first_frame() {
    let dir = tempfile::tempdir().unwrap();
    let arrays = dir.path().join("a").join("b");
    let backend = MemoryBackend::new(3);
    let mut algorithm = Counter {
        require_dir: Some(arrays.clone()),
        ..Default::default()
    };
    let outputs = CounterOutputs {
        array: Some(PathTemplate::parse(&format!("{}/%d.npy", arrays.display())).unwrap()),
        video: Some(dir.path().join("c").join("viz.mp4")),
        ..Default::default()
    };

    StreamingPipeline::new(&backend)
        .process(&mut algorithm, Path::new("in.mp4"), &outputs)
        .unwrap();

    assert!(dir.path().join("c").is_dir());
}

#[test]
fn test_directories_created_even_if_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let arrays = dir.path().join("never");
    let backend = MemoryBackend::new(3);
    let outputs = CounterOutputs {
        array: Some(PathTemplate::parse(&format!("{}/%d.npy", arrays.display())).unwrap()),
        ..Default::default()
    };

    let err = StreamingPipeline::new(&backend)
        .process(&mut Counter::default(), Path::new("in.txt"), &outputs)
        .unwrap_err();

    assert!(matches!(err, Error::Video { .. }));
    assert!(arrays.is_dir());
}

#[test]
fn test_error_on_frame_k_closes_everything_and_keeps_prior_arrays() {
    let dir = tempfile::tempdir().unwrap();
    let template = PathTemplate::parse(&format!("{}/%d.npy", dir.path().display())).unwrap();
    let backend = MemoryBackend::new(6);
    let mut algorithm = Counter {
        fail_at: Some(3),
        ..Default::default()
    };
    let outputs = CounterOutputs {
        array: Some(template.clone()),
        video: Some(dir.path().join("first.mp4")),
        second_video: Some(dir.path().join("second.mp4")),
    };

    let err = StreamingPipeline::new(&backend)
        .process(&mut algorithm, Path::new("in.mp4"), &outputs)
        .unwrap_err();

    assert!(err.to_string().contains("boom on frame 3"));
    assert!(template.render(1).is_file());
    assert!(template.render(2).is_file());
    assert!(!template.render(3).exists());
    assert_eq!(
        backend.events(),
        vec![
            "open reader",
            "open writer first.mp4",
            "open writer second.mp4",
            "close writer second.mp4",
            "close writer first.mp4",
            "close reader",
        ]
    );
    assert_eq!(backend.journal.borrow().written[&dir.path().join("first.mp4")], 2);
}

#[test]
fn test_read_error_mid_stream_releases_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryBackend::new(5).with_faults(Faults {
        read_at: Some(4),
        ..Default::default()
    });
    let outputs = CounterOutputs {
        video: Some(dir.path().join("out.mp4")),
        ..Default::default()
    };

    let err = StreamingPipeline::new(&backend)
        .process(&mut Counter::default(), Path::new("in.mp4"), &outputs)
        .unwrap_err();

    assert!(err.to_string().contains("corrupt packet"));
    assert_eq!(backend.count("close writer out.mp4"), 1);
    assert_eq!(backend.count("close reader"), 1);
    assert_eq!(backend.journal.borrow().written[&dir.path().join("out.mp4")], 3);
}

#[test]
fn test_writer_open_failure_still_closes_reader() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryBackend::new(5).with_faults(Faults {
        open_writer: true,
        ..Default::default()
    });
    let mut algorithm = Counter::default();
    let outputs = CounterOutputs {
        video: Some(dir.path().join("out.mp4")),
        ..Default::default()
    };

    let err = StreamingPipeline::new(&backend)
        .process(&mut algorithm, Path::new("in.mp4"), &outputs)
        .unwrap_err();

    assert!(err.to_string().contains("no encoder"));
    assert_eq!(algorithm.seen, 0);
    assert_eq!(backend.events(), vec!["open reader", "close reader"]);
}

#[test]
fn test_close_failure_surfaces_unless_already_failing() {
    let dir = tempfile::tempdir().unwrap();
    let faults = Faults {
        close_writer: true,
        ..Default::default()
    };
    let outputs = CounterOutputs {
        video: Some(dir.path().join("out.mp4")),
        ..Default::default()
    };

    let backend = MemoryBackend::new(2).with_faults(faults);
    let err = StreamingPipeline::new(&backend)
        .process(&mut Counter::default(), Path::new("in.mp4"), &outputs)
        .unwrap_err();
    assert!(err.to_string().contains("disk full"));
    assert_eq!(backend.count("close reader"), 1);

    let backend = MemoryBackend::new(2).with_faults(faults);
    let mut failing = Counter {
        fail_at: Some(1),
        ..Default::default()
    };
    let err = StreamingPipeline::new(&backend)
        .process(&mut failing, Path::new("in.mp4"), &outputs)
        .unwrap_err();
    assert!(err.to_string().contains("boom on frame 1"));
}

#[test]
fn test_visualization_size_mismatch_is_an_error() {
    struct Thumbnails(PathBuf);
    impl Outputs<u64> for Thumbnails {
        fn sinks(&self) -> Vec<Sink<u64>> {
            vec![Sink::video("thumb", &self.0, encode_thumbnail)]
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryBackend::new(2);
    let err = StreamingPipeline::new(&backend)
        .process(
            &mut Counter::default(),
            Path::new("in.mp4"),
            &Thumbnails(dir.path().join("t.mp4")),
        )
        .unwrap_err();

    assert!(err.to_string().contains("thumb sink, frame 1"));
    assert_eq!(backend.count("close writer t.mp4"), 1);
}

#[test]
fn test_algorithm_reused_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let template = PathTemplate::parse(&format!("{}/%d.npy", dir.path().display())).unwrap();
    let outputs = CounterOutputs {
        array: Some(template.clone()),
        ..Default::default()
    };
    let mut algorithm = Counter::default();

    let long = MemoryBackend::new(4);
    StreamingPipeline::new(&long)
        .process(&mut algorithm, Path::new("a.mp4"), &outputs)
        .unwrap();
    let short = MemoryBackend::new(2);
    let summary = StreamingPipeline::new(&short)
        .process(&mut algorithm, Path::new("b.mp4"), &outputs)
        .unwrap();

    assert_eq!(algorithm.resets, 2);
    assert_eq!(summary.frames, 2);
    assert_eq!(read_count(&template.render(1)), 1.0);
    assert_eq!(read_count(&template.render(2)), 2.0);
}

#[test]
fn test_boxed_algorithm_runs() {
    let backend = MemoryBackend::new(3);
    let mut boxed: Box<dyn FrameAlgorithm<Output = u64>> = Box::new(Counter::default());

    let summary = StreamingPipeline::new(&backend)
        .process(&mut boxed, Path::new("in.mp4"), &NoOutputs)
        .unwrap();

    assert_eq!(summary.frames, 3);
}
