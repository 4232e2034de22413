//! JSON job description: one input, one algorithm, its outputs.
//!
//! ```json
//! {
//!     "input": "clip.mp4",
//!     "algorithm": { "type": "mog2", "detect_shadows": true },
//!     "outputs": { "mask": "out/mask/%05d.npy", "foreground_video": "out/fg.mp4" }
//! }
//! ```
//!
//! `outputs` is read with the output fields of the chosen algorithm's
//! family; unknown fields are rejected. [`JobConfig::load`] resolves a
//! relative `input` and relative output paths against the job file's
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::{Outputs, RunSummary, StreamingPipeline, VideoBackend};
use crate::primitives::{
    BackgroundOutputs, BackgroundSeparator, CannyEdgeDetector, CannyParams, EdgeOutputs,
    FarnebackParams, FastKeypointDetector, FastParams, FlowOutputs, FrameAlgorithm,
    HarrisKeypointDetector, HarrisParams, KeypointOutputs, KnnParams, Mog2Params,
    OpticalFlowFarneback, OrbKeypointDetector, OrbParams,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AlgorithmConfig {
    Farneback(FarnebackParams),
    Mog2(Mog2Params),
    Knn(KnnParams),
    Canny(CannyParams),
    Harris(HarrisParams),
    Fast(FastParams),
    Orb(OrbParams),
}

impl AlgorithmConfig {
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmConfig::Farneback(_) => "farneback",
            AlgorithmConfig::Mog2(_) => "mog2",
            AlgorithmConfig::Knn(_) => "knn",
            AlgorithmConfig::Canny(_) => "canny",
            AlgorithmConfig::Harris(_) => "harris",
            AlgorithmConfig::Fast(_) => "fast",
            AlgorithmConfig::Orb(_) => "orb",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub input: PathBuf,
    pub algorithm: AlgorithmConfig,
    #[serde(default)]
    pub outputs: serde_json::Value,
}

impl JobConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut config: JobConfig = serde_json::from_str(&text)?;
        if let Some(dir) = path.parent() {
            config.resolve_against(dir);
        }
        Ok(config)
    }

    /// Joins `dir` onto the input and onto every relative output path.
    pub fn resolve_against(&mut self, dir: &Path) {
        if self.input.is_relative() {
            self.input = dir.join(&self.input);
        }
        if let serde_json::Value::Object(outputs) = &mut self.outputs {
            for value in outputs.values_mut() {
                if let serde_json::Value::String(p) = value {
                    if Path::new(p.as_str()).is_relative() {
                        *p = dir.join(p.as_str()).to_string_lossy().into_owned();
                    }
                }
            }
        }
    }

    /// Builds the algorithm and its outputs, then streams the input through it.
    ///
    /// Parameter and output errors surface before the input is opened.
    pub fn run(&self, backend: &dyn VideoBackend) -> Result<RunSummary> {
        let pipeline = StreamingPipeline::new(backend);
        match self.algorithm {
            AlgorithmConfig::Farneback(p) => {
                self.run_with::<_, FlowOutputs>(&pipeline, OpticalFlowFarneback::new(p)?)
            }
            AlgorithmConfig::Mog2(p) => {
                self.run_with::<_, BackgroundOutputs>(&pipeline, BackgroundSeparator::new(p)?)
            }
            AlgorithmConfig::Knn(p) => {
                self.run_with::<_, BackgroundOutputs>(&pipeline, BackgroundSeparator::new(p)?)
            }
            AlgorithmConfig::Canny(p) => {
                self.run_with::<_, EdgeOutputs>(&pipeline, CannyEdgeDetector::new(p)?)
            }
            AlgorithmConfig::Harris(p) => {
                self.run_with::<_, KeypointOutputs>(&pipeline, HarrisKeypointDetector::new(p)?)
            }
            AlgorithmConfig::Fast(p) => {
                self.run_with::<_, KeypointOutputs>(&pipeline, FastKeypointDetector::new(p)?)
            }
            AlgorithmConfig::Orb(p) => {
                self.run_with::<_, KeypointOutputs>(&pipeline, OrbKeypointDetector::new(p)?)
            }
        }
    }

    fn run_with<A, O>(&self, pipeline: &StreamingPipeline<'_>, mut algorithm: A) -> Result<RunSummary>
    where
        A: FrameAlgorithm,
        O: Outputs<A::Output> + DeserializeOwned + Default,
    {
        let outputs: O = if self.outputs.is_null() {
            O::default()
        } else {
            O::deserialize(&self.outputs)?
        };
        log::info!(
            "Job: {} on {}",
            self.algorithm.name(),
            self.input.display()
        );
        pipeline.process(&mut algorithm, &self.input, &outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Frame, FrameRate, FrameSink, FrameSource, StreamInfo};

    /// Serves `frames` grey frames from any path; refuses output videos.
    struct Synthetic {
        frames: usize,
    }

    struct SyntheticSource {
        left: usize,
    }

    impl FrameSource for SyntheticSource {
        fn info(&self) -> StreamInfo {
            StreamInfo {
                frame_rate: FrameRate::new(25, 1),
                width: 48,
                height: 32,
            }
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.left == 0 {
                return Ok(None);
            }
            self.left -= 1;
            Ok(Some(Frame::from_fn(48, 32, |x, _| {
                image::Rgb([if x < 24 { 40 } else { 200 }; 3])
            })))
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    impl VideoBackend for Synthetic {
        fn name(&self) -> &str {
            "synthetic"
        }

        fn open_reader(&self, _path: &Path) -> Result<Box<dyn FrameSource>> {
            Ok(Box::new(SyntheticSource { left: self.frames }))
        }

        fn open_writer(&self, path: &Path, _info: StreamInfo) -> Result<Box<dyn FrameSink>> {
            Err(Error::video(
                format!("creating {}", path.display()),
                "synthetic backend cannot write video",
            ))
        }
    }

    #[test]
    fn test_parameters_default() {
        let config: JobConfig =
            serde_json::from_str(r#"{"input": "a.mp4", "algorithm": {"type": "canny"}}"#).unwrap();
        assert_eq!(config.algorithm, AlgorithmConfig::Canny(CannyParams::default()));
        assert!(config.outputs.is_null());

        let config: JobConfig = serde_json::from_str(
            r#"{"input": "a.mp4", "algorithm": {"type": "orb", "max_features": 50}}"#,
        )
        .unwrap();
        assert_eq!(
            config.algorithm,
            AlgorithmConfig::Orb(OrbParams {
                max_features: 50,
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_unknown_algorithm() {
        let result =
            serde_json::from_str::<JobConfig>(r#"{"input": "a.mp4", "algorithm": {"type": "sift"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_resolves_input_next_to_job() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        fs::write(
            &path,
            r#"{"input": "clip.mp4", "algorithm": {"type": "fast", "threshold": 12}}"#,
        )
        .unwrap();
        let config = JobConfig::load(&path).unwrap();
        assert_eq!(config.input, dir.path().join("clip.mp4"));
        assert_eq!(
            config.algorithm,
            AlgorithmConfig::Fast(FastParams {
                threshold: 12,
                non_max_suppression: true,
            })
        );
        assert!(matches!(
            JobConfig::load(dir.path().join("missing.json")),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_load_resolves_outputs_next_to_job() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        fs::write(
            &path,
            r#"{
                "input": "/videos/clip.mp4",
                "algorithm": {"type": "fast"},
                "outputs": {"coords": "kp/%05d.npy", "video": "/tmp/kp.mp4"}
            }"#,
        )
        .unwrap();
        let config = JobConfig::load(&path).unwrap();
        assert_eq!(config.input, PathBuf::from("/videos/clip.mp4"));
        let outputs = KeypointOutputs::deserialize(&config.outputs).unwrap();
        let coords = outputs.coords.unwrap();
        assert_eq!(
            coords.render(3),
            dir.path().join("kp/00003.npy")
        );
        assert_eq!(outputs.video, Some(PathBuf::from("/tmp/kp.mp4")));
    }

    #[test]
    fn test_run_writes_family_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("edges/%03d.npy");
        let config = JobConfig {
            input: PathBuf::from("clip.mp4"),
            algorithm: AlgorithmConfig::Canny(CannyParams::default()),
            outputs: serde_json::json!({ "mask": template.to_str().unwrap() }),
        };
        let summary = config.run(&Synthetic { frames: 3 }).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.arrays_written, 3);
        for i in 1..=3 {
            let path = dir.path().join(format!("edges/{:03}.npy", i));
            let mask: ndarray::Array2<bool> = ndarray_npy::read_npy(&path).unwrap();
            assert_eq!(mask.dim(), (32, 48));
        }
    }

    #[test]
    fn test_bad_outputs_fail_before_reading() {
        let config = JobConfig {
            input: PathBuf::from("clip.mp4"),
            algorithm: AlgorithmConfig::Fast(FastParams::default()),
            outputs: serde_json::json!({ "mask": "out/%d.npy" }),
        };
        assert!(matches!(
            config.run(&Synthetic { frames: 2 }),
            Err(Error::Json(_))
        ));

        let config = JobConfig {
            input: PathBuf::from("clip.mp4"),
            algorithm: AlgorithmConfig::Canny(CannyParams {
                aperture_size: 2,
                ..Default::default()
            }),
            outputs: serde_json::Value::Null,
        };
        assert!(matches!(
            config.run(&Synthetic { frames: 2 }),
            Err(Error::Configuration(_))
        ));
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_missing_provider_fails_before_reading() {
        let config = JobConfig {
            input: PathBuf::from("clip.mp4"),
            algorithm: AlgorithmConfig::Mog2(Mog2Params::default()),
            outputs: serde_json::Value::Null,
        };
        assert!(matches!(
            config.run(&Synthetic { frames: 2 }),
            Err(Error::UnsupportedBackend { .. })
        ));
    }

    #[test]
    fn test_no_outputs_only_decodes() {
        let config = JobConfig {
            input: PathBuf::from("clip.mp4"),
            algorithm: AlgorithmConfig::Fast(FastParams::default()),
            outputs: serde_json::Value::Null,
        };
        let summary = config.run(&Synthetic { frames: 4 }).unwrap();
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.writes(), 0);
    }
}
