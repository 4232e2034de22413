//! Typed record containers with predicate filtering.
//!
//! A container holds records of exactly one type and serializes as
//! `{"data": [record, ...]}`.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// A record type a [`DataContainer`] can hold.
pub trait DataRecord: Clone + Serialize + DeserializeOwned {}

/// How per-predicate verdicts combine into a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Match {
    /// At least one predicate passes. No predicates never match.
    #[default]
    Any,
    /// Every predicate passes. No predicates always match.
    All,
}

impl Match {
    fn test<T>(self, record: &T, filters: &[&dyn Fn(&T) -> bool]) -> bool {
        match self {
            Match::Any => filters.iter().any(|f| f(record)),
            Match::All => filters.iter().all(|f| f(record)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: DataRecord")]
pub struct DataContainer<T> {
    #[serde(default, deserialize_with = "null_as_empty")]
    data: Vec<T>,
}

fn null_as_empty<'de, D, T>(d: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}

impl<T: DataRecord> Default for DataContainer<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<T: DataRecord> DataContainer<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }

    pub fn add(&mut self, record: T) {
        self.data.push(record);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// A new container with the records accepted by `filters` under `how`,
    /// in their original order.
    pub fn get_matches(&self, filters: &[&dyn Fn(&T) -> bool], how: Match) -> Self {
        Self {
            data: self
                .data
                .iter()
                .filter(|r| how.test(*r, filters))
                .cloned()
                .collect(),
        }
    }

    pub fn count_matches(&self, filters: &[&dyn Fn(&T) -> bool], how: Match) -> usize {
        self.data.iter().filter(|r| how.test(*r, filters)).count()
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json_str(&text)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        fs::write(path, self.to_json_string()?).map_err(|e| Error::io(path, e))
    }
}

impl<T: DataRecord> FromIterator<T> for DataContainer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a DataContainer<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

/// A point in image coordinates normalised to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativePoint {
    pub x: f64,
    pub y: f64,
}

impl RelativePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Pixel coordinates in an image of the given size.
    pub fn to_absolute(&self, width: u32, height: u32) -> (u32, u32) {
        let clamp = |v: f64, size: u32| (v * size as f64).round().clamp(0.0, size as f64) as u32;
        (clamp(self.x, width), clamp(self.y, height))
    }

    pub fn from_absolute(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x: x as f64 / width.max(1) as f64,
            y: y as f64 / height.max(1) as f64,
        }
    }
}

/// A labelled relative point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRelativePoint {
    pub label: String,
    pub relative_point: RelativePoint,
}

impl NamedRelativePoint {
    pub fn new(label: impl Into<String>, relative_point: RelativePoint) -> Self {
        Self {
            label: label.into(),
            relative_point,
        }
    }
}

impl DataRecord for NamedRelativePoint {}

/// Labelled points in one image or frame.
pub type LocalizedTags = DataContainer<NamedRelativePoint>;

impl LocalizedTags {
    pub fn label_set(&self) -> BTreeSet<&str> {
        self.iter().map(|p| p.label.as_str()).collect()
    }
}
