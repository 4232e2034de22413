use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, Dimension};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::stream::Frame;

// ============================================================================
// Path templates
// ============================================================================

/// Output path containing one printf-style frame index placeholder.
///
/// Accepts `%d` and zero/space padded `%05d` / `%5d`; `%%` is a literal
/// percent sign. The placeholder must sit in the file name so that every
/// frame of a sink lands in the same directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathTemplate {
    raw: String,
    prefix: String,
    suffix: String,
    width: usize,
    zero_pad: bool,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut spec: Option<(usize, bool)> = None;
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            let out = if spec.is_some() {
                &mut suffix
            } else {
                &mut prefix
            };
            if c != '%' {
                out.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                out.push('%');
                continue;
            }

            let zero_pad = chars.peek() == Some(&'0');
            if zero_pad {
                chars.next();
            }
            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }
            if chars.next() != Some('d') {
                return Err(Error::config(format!(
                    "unsupported placeholder in path template {:?}; use %d or %0Nd",
                    template
                )));
            }
            if spec.is_some() {
                return Err(Error::config(format!(
                    "path template {:?} has more than one frame index placeholder",
                    template
                )));
            }
            let width = if digits.is_empty() {
                0
            } else {
                digits
                    .parse()
                    .map_err(|_| Error::config(format!("bad field width in {:?}", template)))?
            };
            spec = Some((width, zero_pad));
        }

        let (width, zero_pad) = spec.ok_or_else(|| {
            Error::config(format!(
                "path template {:?} has no frame index placeholder",
                template
            ))
        })?;
        if suffix.contains(std::path::MAIN_SEPARATOR) || suffix.contains('/') {
            return Err(Error::config(format!(
                "frame index placeholder must be in the file name of {:?}",
                template
            )));
        }

        Ok(Self {
            raw: template.to_string(),
            prefix,
            suffix,
            width,
            zero_pad,
        })
    }

    /// Path for the given 1-based frame index.
    pub fn render(&self, index: u64) -> PathBuf {
        let number = if self.zero_pad {
            format!("{:0width$}", index, width = self.width)
        } else {
            format!("{:>width$}", index, width = self.width)
        };
        PathBuf::from(format!("{}{}{}", self.prefix, number, self.suffix))
    }

    /// Directory every rendered path lives in, if the template names one.
    pub fn parent(&self) -> Option<PathBuf> {
        self.render(1)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Display for PathTemplate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for PathTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PathTemplate {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<PathTemplate> for String {
    fn from(t: PathTemplate) -> Self {
        t.raw
    }
}

// ============================================================================
// Arrays
// ============================================================================

/// Dense array persisted as one `.npy` file.
#[derive(Debug, Clone, PartialEq)]
pub enum NpyArray {
    F32(ArrayD<f32>),
    U8(ArrayD<u8>),
    Bool(ArrayD<bool>),
}

impl NpyArray {
    pub fn shape(&self) -> &[usize] {
        match self {
            NpyArray::F32(a) => a.shape(),
            NpyArray::U8(a) => a.shape(),
            NpyArray::Bool(a) => a.shape(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let written = match self {
            NpyArray::F32(a) => ndarray_npy::write_npy(path, a),
            NpyArray::U8(a) => ndarray_npy::write_npy(path, a),
            NpyArray::Bool(a) => ndarray_npy::write_npy(path, a),
        };
        written.map_err(|source| Error::Npy {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl<D: Dimension> From<ndarray::Array<f32, D>> for NpyArray {
    fn from(a: ndarray::Array<f32, D>) -> Self {
        NpyArray::F32(a.into_dyn())
    }
}

impl<D: Dimension> From<ndarray::Array<u8, D>> for NpyArray {
    fn from(a: ndarray::Array<u8, D>) -> Self {
        NpyArray::U8(a.into_dyn())
    }
}

impl<D: Dimension> From<ndarray::Array<bool, D>> for NpyArray {
    fn from(a: ndarray::Array<bool, D>) -> Self {
        NpyArray::Bool(a.into_dyn())
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Turns an algorithm result into one array.
pub type ArrayEncoder<R> = fn(&R) -> NpyArray;

/// Turns an algorithm result (and the frame it came from) into one picture.
pub type FrameEncoder<R> = fn(&R, &Frame) -> Frame;

/// One requested output of a run.
pub enum Sink<R> {
    /// One `.npy` file per frame, named by the template.
    Array {
        name: &'static str,
        template: PathTemplate,
        encode: ArrayEncoder<R>,
    },
    /// One output video, same rate and size as the input.
    Video {
        name: &'static str,
        path: PathBuf,
        encode: FrameEncoder<R>,
    },
}

impl<R> Sink<R> {
    pub fn array(name: &'static str, template: &PathTemplate, encode: ArrayEncoder<R>) -> Self {
        Sink::Array {
            name,
            template: template.clone(),
            encode,
        }
    }

    pub fn video(name: &'static str, path: &Path, encode: FrameEncoder<R>) -> Self {
        Sink::Video {
            name,
            path: path.to_path_buf(),
            encode,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Sink::Array { name, .. } | Sink::Video { name, .. } => name,
        }
    }

    /// Directory that must exist before the run starts.
    pub fn output_dir(&self) -> Option<PathBuf> {
        match self {
            Sink::Array { template, .. } => template.parent(),
            Sink::Video { path, .. } => path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf),
        }
    }
}

/// A family's output configuration: which sinks a run should feed.
pub trait Outputs<R> {
    fn sinks(&self) -> Vec<Sink<R>>;
}

/// Requests nothing; a run only decodes and processes every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOutputs;

impl<R> Outputs<R> for NoOutputs {
    fn sinks(&self) -> Vec<Sink<R>> {
        Vec::new()
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub arrays_written: u64,
    pub video_frames_written: u64,
}

impl RunSummary {
    pub fn writes(&self) -> u64 {
        self.arrays_written + self.video_frames_written
    }
}
